//! Telemetry backends.
//!
//! # Data Flow
//! ```text
//! buffer flush ──────┐
//! aggregator emit ───┤
//! anomaly detector ──┼──▶ Sink (record_metric / record_metrics)
//! load shedder ──────┤           (record_health_check)
//! correlator ────────┤           (record_error)
//! tracer ────────────┘           (start_span / end_span)
//! ```
//!
//! # Design Decisions
//! - Every component exports through the same `Sink` trait object
//! - Backends are interchangeable; the pipeline has no backend-specific logic
//! - Callers wrap sink calls in the retry handler; sinks never retry themselves

pub mod log;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ErrorReport, HealthCheck, Metric, SpanHandle};

pub use log::LogSink;
pub use memory::MemorySink;

/// Errors returned by a backend.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The backend could not be reached or timed out.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the payload; retrying will not help.
    #[error("sink rejected payload: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

pub type SinkResult<T> = Result<T, SinkError>;

/// A pluggable telemetry backend.
#[async_trait]
pub trait Sink: Send + Sync + std::fmt::Debug {
    async fn initialize(&self) -> SinkResult<()> {
        Ok(())
    }

    async fn record_metric(&self, metric: &Metric) -> SinkResult<()>;

    /// Batched export. Backends with a native batch API should override this.
    async fn record_metrics(&self, metrics: &[Metric]) -> SinkResult<()> {
        for metric in metrics {
            self.record_metric(metric).await?;
        }
        Ok(())
    }

    async fn record_health_check(&self, check: &HealthCheck) -> SinkResult<()>;

    async fn record_error(&self, error: &ErrorReport) -> SinkResult<()>;

    async fn start_span(&self, name: &str) -> SinkResult<SpanHandle>;

    async fn end_span(&self, handle: &SpanHandle) -> SinkResult<()>;

    async fn shutdown(&self) -> SinkResult<()> {
        Ok(())
    }
}
