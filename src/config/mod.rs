//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → each component receives its own section at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime knobs go through facade setters
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::PipelineConfig;
pub use schema::{
    AggregationRule, AggregationSettings, AnomalyConfig, AnomalySettings, BufferConfig,
    CorrelationConfig, LoadSheddingConfig, LogFormat, ObservabilityConfig, RetryConfig,
    TracingConfig,
};
