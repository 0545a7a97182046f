//! Tracing configuration, builder-style like the rest of the ambient stack.

/// Sampling strategy for span collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SamplingStrategy {
    /// Sample every span.
    #[default]
    Always,
    /// Sample nothing; tracing is compiled in but inert.
    Never,
    /// Sample at a fixed rate in `[0.0, 1.0]`.
    Probabilistic(f64),
}

/// Configuration for the process-wide tracing subscriber and, when the `otlp` feature
/// is enabled, its OTLP export.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to every span/metric as a resource attribute.
    pub service_name: String,
    /// OTLP collector endpoint (gRPC). `None` disables remote export; spans still
    /// flow through `tracing`'s local subscriber.
    pub otlp_endpoint: Option<String>,
    pub sampling: SamplingStrategy,
    /// Extra `(key, value)` resource attributes, e.g. instance id or region.
    pub resource_attributes: Vec<(String, String)>,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self {
            service_name: "alert-proxy".to_string(),
            otlp_endpoint: None,
            sampling: SamplingStrategy::Always,
            resource_attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use]
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling = if rate >= 1.0 {
            SamplingStrategy::Always
        } else if rate <= 0.0 {
            SamplingStrategy::Never
        } else {
            SamplingStrategy::Probabilistic(rate)
        };
        self
    }

    #[must_use]
    pub fn with_resource_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attributes.push((key.into(), value.into()));
        self
    }

    /// Reads `ALERT_PROXY_OTEL_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(name) = std::env::var("ALERT_PROXY_OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(endpoint) = std::env::var("ALERT_PROXY_OTEL_ENDPOINT") {
            config.otlp_endpoint = Some(endpoint);
        }
        if let Ok(rate) = std::env::var("ALERT_PROXY_OTEL_SAMPLING_RATE") {
            if let Ok(rate) = rate.parse::<f64>() {
                config = config.with_sampling_rate(rate);
            }
        }
        config
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new()
    }
}
