//! Error types for observability setup. Distinct from [`alert_core::error::StageError`]:
//! these are init-time failures (bad config, exporter unreachable), never returned from
//! the request path.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to initialize tracing: {0}")]
    Initialization(String),

    #[error("invalid tracing configuration: {0}")]
    Configuration(String),

    #[error("failed to connect to exporter endpoint: {0}")]
    ExporterConnection(String),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
