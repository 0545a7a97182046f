//! Tracing and metrics wiring shared by every crate in the alert proxy workspace.
//!
//! `alert-core`'s stage services depend on this crate only for the [`AlertMetrics`]
//! type itself: each stage emits `tracing` spans/events unconditionally and accepts
//! an optional `Arc<AlertMetrics>` handle to record against, so the core stays
//! instrumentable without being coupled to a specific exporter or scrape endpoint.
//! This crate owns process-wide initialization (`init_tracing`) and the concrete
//! metric definitions.

pub mod config;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod tracer;

pub use config::{SamplingStrategy, TracingConfig};
pub use error::{Error, Result};
pub use exporter::init_tracing;
pub use metrics::AlertMetrics;
pub use tracer::Traceable;
