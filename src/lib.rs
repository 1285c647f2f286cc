//! Telemetry Pipeline Library
//!
//! In-process observability pipeline: sampled buffering, windowed
//! aggregation, z-score anomaly detection, alert correlation, adaptive load
//! shedding and sampled tracing, exported through a pluggable `Sink`.

// Data model
pub mod error;
pub mod model;
pub mod sink;

// Pipeline stages
pub mod aggregation;
pub mod anomaly;
pub mod buffer;
pub mod correlation;
pub mod load_shedding;
pub mod tracer;

// Composition root
pub mod facade;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use facade::{Ingest, MonitoringFacade};
pub use lifecycle::Shutdown;
pub use sink::{LogSink, MemorySink, Sink};
