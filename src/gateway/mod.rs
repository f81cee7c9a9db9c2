//! Gateway access control and upstream stream integrity.

pub mod access;
pub mod catalog;
pub mod config;
#[cfg(feature = "gateway-http")]
pub mod http;
pub mod loader;
pub mod store;
pub mod stream_guard;

use thiserror::Error;

pub use access::{is_model_allowed, resolve_models};
pub use catalog::{CATALOG_CREATED, GATEWAY_OWNER, ModelDescriptor, ModelList, list_all_models};
pub use config::{
    ApiKeyEntry, GatewaySnapshot, ModelPattern, Provider, RawApiKey, RawConfig, RawModelEntry,
    RawProvider,
};
pub use loader::{CONFIG_URL_ENV, ConfigLoadError, ConfigLoader, ConfigSource, DEFAULT_CONFIG_PATH};
pub use store::ConfigStore;
pub use stream_guard::{
    DEFAULT_STREAM_STATUS, GuardedStream, NO_DATA_RETURNED, StreamFragment, fragments_from_iter,
    guard_stream, guard_stream_default,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
    #[error("Invalid or missing API Key")]
    Unauthorized,
    #[error("{detail}")]
    StreamIntegrity { status: u16, detail: String },
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config { .. } => 500,
            Self::Unauthorized => 403,
            Self::StreamIntegrity { status, .. } => *status,
        }
    }
}
