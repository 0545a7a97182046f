//! Tracing subscriber initialization, with optional OTLP export.

use crate::config::{SamplingStrategy, TracingConfig};
use crate::error::{Error, Result};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the process-wide `tracing` subscriber. Always wires an `EnvFilter` (`RUST_LOG`,
/// default `info`) and a formatting layer; when built with the `otlp` feature and
/// `config.otlp_endpoint` is set, also registers an OTLP span exporter.
///
/// Fire this once at process start, before any stage service is constructed. Not called
/// automatically by any crate in this workspace: the core is a library, not a binary, so
/// initialization is left to whatever process embeds it (the `demos` binary does call it).
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(feature = "otlp")]
    {
        if let Some(endpoint) = config.otlp_endpoint.clone() {
            init_otlp_provider(&config, &endpoint)?;
            let tracer = opentelemetry::global::tracer(config.service_name.clone());
            let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            return tracing_subscriber::registry()
                .with(env_filter)
                .with(telemetry_layer)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .map_err(|e| Error::Initialization(e.to_string()));
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Initialization(e.to_string()))
}

#[cfg(feature = "otlp")]
fn init_otlp_provider(config: &TracingConfig, endpoint: &str) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
    use opentelemetry_sdk::Resource;

    let sampler = match config.sampling {
        SamplingStrategy::Always => Sampler::AlwaysOn,
        SamplingStrategy::Never => Sampler::AlwaysOff,
        SamplingStrategy::Probabilistic(rate) => Sampler::TraceIdRatioBased(rate),
    };

    let mut resource_kvs = vec![KeyValue::new("service.name", config.service_name.clone())];
    for (key, value) in &config.resource_attributes {
        resource_kvs.push(KeyValue::new(key.clone(), value.clone()));
    }
    let resource = Resource::builder_empty().with_attributes(resource_kvs).build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::ExporterConnection(e.to_string()))?;

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler)
        .with_batch_exporter(exporter)
        .build();

    opentelemetry::global::set_tracer_provider(provider);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_without_otlp_endpoint_does_not_error() {
        // try_init() only succeeds once per process, so this asserts non-panicking
        // construction rather than asserting Ok — a prior test in this binary may
        // already hold the global subscriber.
        let _ = init_tracing(TracingConfig::new().with_service_name("test"));
    }
}
