pub mod gateway;
pub mod telemetry;

pub use gateway::{
    ConfigLoader, ConfigStore, GatewayError, GatewaySnapshot, GuardedStream, ModelDescriptor,
    ModelList, StreamFragment, guard_stream, guard_stream_default, list_all_models,
    resolve_models,
};
