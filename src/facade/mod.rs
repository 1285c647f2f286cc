//! Producer-facing entry point.
//!
//! # Data Flow
//! ```text
//! record_metric(metric)
//!     → validate (Rejected)
//!     → LoadShedder::should_process_request (Shed)
//!     → AnomalyDetector::analyze ─▶ anomaly? → AlertCorrelator
//!     → MetricAggregator::process
//!     → MetricBuffer::add
//!     → Accepted
//!
//! start_operation → Tracer::start_span
//! end_operation   → Tracer::end_span → latency metric → same path, ungated
//!
//! record_error    → Sink::record_error + AlertCorrelator::process_error
//! record_resource_usage → LoadShedder + cpu/memory/request-rate metrics
//! ```
//!
//! # Design Decisions
//! - Producer calls never return errors; failures are logged and counted
//! - One composition root builds every component and owns the scheduler
//! - Internally generated metrics (latency, resource usage) bypass the shedding gate

pub mod monitoring;

pub use monitoring::{MonitoringFacade, PipelineStats};

/// What happened to a submitted metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Passed to the pipeline (it may still be sampled out by the buffer).
    Accepted,
    /// Dropped by load shedding.
    Shed,
    /// Failed validation.
    Rejected,
}
