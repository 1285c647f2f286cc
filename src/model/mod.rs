//! Telemetry data model.
//!
//! # Ownership
//! ```text
//! Metric       producer → facade → buffer / aggregator / detector → sink
//! Alert        producer or correlator → alert log (bounded, time-ordered)
//! Span         tracer-owned while active; caller only holds a SpanRef
//! HealthCheck  any component → sink
//! ErrorReport  producer → sink + correlator
//! ```
//!
//! # Design Decisions
//! - Labels are a `BTreeMap` so the serialized form is canonical
//! - Timestamps are epoch milliseconds (`u64`)
//! - Metrics and alerts are never mutated after construction

pub mod alert;
pub mod health;
pub mod metric;
pub mod span;

pub use alert::{Alert, AlertSeverity, CORRELATION_ALERT, ERROR_ALERT};
pub use health::{ErrorReport, HealthCheck, HealthStatus};
pub use metric::{Labels, Metric};
pub use span::{AttributeValue, Span, SpanContext, SpanHandle, SpanId, SpanRef};
