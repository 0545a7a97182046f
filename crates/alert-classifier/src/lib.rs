//! HTTP-backed adapter for the classifier (LLM RPC) contract in `alert_core::ports`.
//!
//! This crate owns the transport (endpoint, headers, timeouts, status-code mapping)
//! for the classifier's request/response wire format from spec §6. The circuit
//! breaker, retry loop, and caching that wrap this client all live in
//! `alert_core::classification::ClassificationService`; this adapter only ever makes
//! one best-effort HTTP call per invocation.

mod client;
mod wire;

pub use client::HttpClassifierClient;
pub use wire::{ClassifierRequest, ClassifierResponse};
