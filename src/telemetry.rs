use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[cfg(feature = "gateway-otel")]
use opentelemetry::trace::TracerProvider as _;

/// Keeps exporters alive; flushes pending spans on drop.
#[derive(Debug, Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "gateway-otel")]
    provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

#[cfg(feature = "gateway-otel")]
impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Installs the global subscriber: `RUST_LOG` filtering (default `info`), text or JSON
/// output on stderr, and OTLP span export when `otlp_endpoint` is set.
#[cfg_attr(not(feature = "gateway-otel"), allow(unused_variables))]
pub fn init_tracing(
    service_name: &str,
    json_logs: bool,
    otlp_endpoint: Option<&str>,
) -> Result<TelemetryGuard, Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    #[cfg(feature = "gateway-otel")]
    if let Some(endpoint) = otlp_endpoint {
        let provider = otlp_tracer_provider(service_name, endpoint)?;
        let tracer = provider.tracer(service_name.to_string());
        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
        return Ok(TelemetryGuard {
            provider: Some(provider),
        });
    }

    #[cfg(not(feature = "gateway-otel"))]
    if otlp_endpoint.is_some() {
        return Err("otlp export requires `--features gateway-otel`".into());
    }

    registry.try_init()?;
    Ok(TelemetryGuard::default())
}

#[cfg(feature = "gateway-otel")]
fn otlp_tracer_provider(
    service_name: &str,
    endpoint: &str,
) -> Result<opentelemetry_sdk::trace::SdkTracerProvider, Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig as _;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint.to_string())
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder_empty()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(provider)
}
