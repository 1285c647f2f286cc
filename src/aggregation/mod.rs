//! Time-windowed aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! MetricAggregator::process(metric)
//!     → config lookup by metric name (absent: bypass)
//!     → window key = name + ":" + selected label values
//!     → append to window [start, start + window_ms)
//!     → now >= end ─▶ reduce (window.rs) → `{name}_{type}` metric → Sink
//!                     → fresh window starting at now
//!
//! cleanup() (periodic):
//!     idle past end + cleanup_interval → emit if non-empty → purge
//! ```
//!
//! # Design Decisions
//! - Windows are sharded by key; the read-modify-write of one key is serialized
//! - A window's end is fixed at creation and never extended
//! - Values never carry over between consecutive windows

pub mod aggregator;
pub mod window;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use aggregator::MetricAggregator;
pub use window::AggregationWindow;

/// Reduction applied to a window's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Sum,
    Avg,
    Min,
    Max,
    Percentile,
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Percentile => "percentile",
        };
        f.write_str(s)
    }
}

/// Optional settings for a registered aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOptions {
    /// Percentile in (0, 100]; defaults to the median.
    pub percentile: Option<f64>,
    /// Labels that split a metric into separate windows. All labels when unset.
    pub label_keys: Option<Vec<String>>,
}

/// How one metric name is aggregated.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    pub kind: AggregationType,
    pub window_ms: u64,
    pub percentile: Option<f64>,
    pub label_keys: Option<Vec<String>>,
}

impl AggregationConfig {
    pub fn new(kind: AggregationType, window_ms: u64, options: AggregationOptions) -> Self {
        Self {
            kind,
            window_ms,
            percentile: options.percentile,
            label_keys: options.label_keys,
        }
    }
}
