//! Statistical anomaly detection.
//!
//! # Data Flow
//! ```text
//! AnomalyDetector::analyze(metric)
//!     → config: exact metric name → family (name contains key) → default
//!     → push value into the series history (FIFO, bounded by window_size)
//!     → len >= min_data_points ─▶ population mean / std dev → z-score
//!     → z > deviation_threshold ─▶ `{name}_anomaly` metric + degraded health → Sink
//!                               ─▶ Anomaly returned to the caller
//! ```
//!
//! # Design Decisions
//! - Observational only: never fails, never blocks ingestion
//! - Zero variance flags only a value that differs from the mean
//! - Histories are keyed by metric name, shared across label sets

pub mod detector;

pub use crate::config::AnomalyConfig;
pub use detector::{Anomaly, AnomalyDetector};
