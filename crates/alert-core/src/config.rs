//! Typed configuration surface, one struct per configuration group in the design
//! notes, with `Default` impls matching the documented defaults and `from_env()`
//! constructors reading `ALERT_PROXY_*` variables.

use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_bool(name: &str, default: bool) -> bool {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationConfig {
    pub enabled: bool,
    pub timeout: Duration,
    pub fallback_enabled: bool,
    pub min_confidence: f64,
    pub max_retries: u32,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(5),
            fallback_enabled: true,
            min_confidence: 0.3,
            max_retries: 2,
        }
    }
}

impl ClassificationConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: env_bool("ALERT_PROXY_CLASSIFICATION_ENABLED", default.enabled),
            timeout: env_duration_ms("ALERT_PROXY_CLASSIFICATION_TIMEOUT_MS", default.timeout),
            fallback_enabled: env_bool(
                "ALERT_PROXY_CLASSIFICATION_FALLBACK_ENABLED",
                default.fallback_enabled,
            ),
            min_confidence: env_f64(
                "ALERT_PROXY_CLASSIFICATION_MIN_CONFIDENCE",
                default.min_confidence,
            ),
            max_retries: env_u64("ALERT_PROXY_CLASSIFICATION_MAX_RETRIES", default.max_retries as u64)
                as u32,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub l1_capacity: usize,
    pub l2_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 10_000,
            l2_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            l1_capacity: env_u64("ALERT_PROXY_CACHE_L1_CAPACITY", default.l1_capacity as u64) as usize,
            l2_ttl: env_duration_ms("ALERT_PROXY_CACHE_L2_TTL_MS", default.l2_ttl),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishingConfig {
    pub enabled: bool,
    pub parallel: bool,
    pub per_target_timeout: Duration,
    pub retry: RetryPolicy,
    pub target_refresh_interval: Duration,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parallel: true,
            per_target_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            target_refresh_interval: Duration::from_secs(300),
        }
    }
}

impl PublishingConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: env_bool("ALERT_PROXY_PUBLISHING_ENABLED", default.enabled),
            parallel: env_bool("ALERT_PROXY_PUBLISHING_PARALLEL", default.parallel),
            per_target_timeout: env_duration_ms(
                "ALERT_PROXY_PUBLISHING_PER_TARGET_TIMEOUT_MS",
                default.per_target_timeout,
            ),
            retry: RetryPolicy {
                max_attempts: env_u64("ALERT_PROXY_PUBLISHING_RETRY_MAX_ATTEMPTS", 3) as u32,
                base_delay: env_duration_ms(
                    "ALERT_PROXY_PUBLISHING_RETRY_BASE_DELAY_MS",
                    default.retry.base_delay,
                ),
                max_delay: env_duration_ms(
                    "ALERT_PROXY_PUBLISHING_RETRY_MAX_DELAY_MS",
                    default.retry.max_delay,
                ),
                ..default.retry
            },
            target_refresh_interval: env_duration_ms(
                "ALERT_PROXY_PUBLISHING_TARGET_REFRESH_INTERVAL_MS",
                default.target_refresh_interval,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub job_timeout: Duration,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: 1000,
            max_attempts: 3,
            job_timeout: Duration::from_secs(30),
        }
    }
}

impl AsyncConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            workers: env_u64("ALERT_PROXY_ASYNC_WORKERS", default.workers as u64) as usize,
            queue_capacity: env_u64(
                "ALERT_PROXY_ASYNC_QUEUE_CAPACITY",
                default.queue_capacity as u64,
            ) as usize,
            max_attempts: env_u64("ALERT_PROXY_ASYNC_MAX_ATTEMPTS", default.max_attempts as u64)
                as u32,
            job_timeout: env_duration_ms("ALERT_PROXY_ASYNC_JOB_TIMEOUT_MS", default.job_timeout),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub disabled_namespaces: Vec<String>,
    pub test_environment_blocklist: Vec<String>,
    pub stale_resolved_ttl: Duration,
    pub min_confidence: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            disabled_namespaces: Vec::new(),
            test_environment_blocklist: vec!["test".to_string(), "sandbox".to_string()],
            stale_resolved_ttl: Duration::from_secs(24 * 3600),
            min_confidence: 0.3,
        }
    }
}

impl FilterConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            disabled_namespaces: env_var("ALERT_PROXY_FILTER_DISABLED_NAMESPACES")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or(default.disabled_namespaces),
            test_environment_blocklist: default.test_environment_blocklist,
            stale_resolved_ttl: env_duration_ms(
                "ALERT_PROXY_FILTER_STALE_RESOLVED_TTL_MS",
                default.stale_resolved_ttl,
            ),
            min_confidence: env_f64("ALERT_PROXY_FILTER_MIN_CONFIDENCE", default.min_confidence),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SilenceConfig {
    pub gc_interval: Duration,
    pub sync_interval: Duration,
    pub retention: Duration,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            gc_interval: Duration::from_secs(300),
            sync_interval: Duration::from_secs(60),
            retention: Duration::from_secs(24 * 3600),
        }
    }
}

impl SilenceConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            gc_interval: env_duration_ms("ALERT_PROXY_SILENCE_GC_INTERVAL_MS", default.gc_interval),
            sync_interval: env_duration_ms(
                "ALERT_PROXY_SILENCE_SYNC_INTERVAL_MS",
                default.sync_interval,
            ),
            retention: env_duration_ms("ALERT_PROXY_SILENCE_RETENTION_MS", default.retention),
        }
    }
}

/// Ingress processing mode. Resolves Open Question 1: whether the async queue is
/// a shadow path or an explicit opt-in is a per-request/per-processor configuration
/// choice, not an architectural given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// `AlertProcessor::process` is the synchronous call path; the caller awaits the
    /// full result.
    Sync,
    /// `AlertProcessor::process` is additionally mirrored onto the async processor's
    /// queue for out-of-band replay/shadow evaluation; the synchronous result is
    /// still returned unchanged.
    AsyncShadow,
}

impl Default for IngestMode {
    fn default() -> Self {
        IngestMode::Sync
    }
}

/// Whether outgoing records carry the classification the processor produced.
/// Request-scoped per §4.1; the config value is the processor-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationMode {
    /// Strips classification from the outcome when it was produced by the
    /// fallback classifier or disabled outright, so downstream consumers never
    /// see a degraded result presented as a real one.
    Transparent,
    /// Always attaches whatever classification was produced, disabled/fallback
    /// included.
    Enriched,
}

impl Default for DegradationMode {
    fn default() -> Self {
        DegradationMode::Enriched
    }
}

/// Top-level configuration tree for the alert proxy core.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub classification: ClassificationConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub publishing: PublishingConfig,
    pub async_processor: AsyncConfig,
    pub filter: FilterConfig,
    pub silence: SilenceConfig,
    pub ingest_mode: IngestMode,
    pub degradation_mode: DegradationMode,
    pub continue_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classification: ClassificationConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            publishing: PublishingConfig::default(),
            async_processor: AsyncConfig::default(),
            filter: FilterConfig::default(),
            silence: SilenceConfig::default(),
            ingest_mode: IngestMode::default(),
            degradation_mode: DegradationMode::default(),
            continue_on_error: true,
        }
    }
}

impl Config {
    /// Loads the full config tree from `ALERT_PROXY_*` environment variables,
    /// falling back to documented defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let ingest_mode = match env_var("ALERT_PROXY_INGEST_MODE").as_deref() {
            Some("async_shadow") | Some("ASYNC_SHADOW") => IngestMode::AsyncShadow,
            _ => IngestMode::Sync,
        };
        let degradation_mode = match env_var("ALERT_PROXY_DEGRADATION_MODE").as_deref() {
            Some("transparent") | Some("TRANSPARENT") => DegradationMode::Transparent,
            _ => DegradationMode::Enriched,
        };
        Self {
            classification: ClassificationConfig::from_env(),
            cache: CacheConfig::from_env(),
            circuit_breaker: CircuitBreakerConfig::default(),
            publishing: PublishingConfig::from_env(),
            async_processor: AsyncConfig::from_env(),
            filter: FilterConfig::from_env(),
            silence: SilenceConfig::from_env(),
            ingest_mode,
            degradation_mode,
            continue_on_error: env_bool("ALERT_PROXY_CONTINUE_ON_ERROR", true),
        }
    }
}
