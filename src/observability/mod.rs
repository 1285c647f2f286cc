//! Observability subsystem.
//!
//! Observes the pipeline itself, as opposed to the telemetry it carries.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (self-metrics: counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every log event for machine parsing
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed
//! - `RUST_LOG` always wins over the configured level

pub mod logging;
pub mod metrics;
