//! Pipeline error taxonomy.
//!
//! # Propagation
//! - `Validation`: malformed input, rejected before it is buffered
//! - `Sink`: a backend call failed; retried, then dropped and logged
//! - `Compression`: batch compression failed; the batch is sent uncompressed
//! - `RetryExhausted`: the retry budget of one operation is spent
//! - `SpanNotFound`: ending or annotating a span the tracer does not own
//!
//! Capacity pressure is resolved by eviction and never surfaces as an error.
//! Producer-facing facade calls absorb every variant.

use thiserror::Error;

use crate::model::SpanId;
use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("{context}: gave up after {attempts} attempts")]
    RetryExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("span {0} is not active")]
    SpanNotFound(SpanId),
}

impl PipelineError {
    /// Whether retrying the failed call can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Sink(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
