//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationType;
use crate::correlation::CorrelationRule;
use crate::load_shedding::LoadThresholds;

/// Root configuration for the telemetry pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Logging and self-metrics settings.
    pub observability: ObservabilityConfig,

    /// Retry policy for every sink hand-off.
    pub retry: RetryConfig,

    /// Sampling, buffering and compression.
    pub buffer: BufferConfig,

    /// Windowed aggregation.
    pub aggregation: AggregationSettings,

    /// Z-score anomaly detection.
    pub anomaly: AnomalySettings,

    /// Alert correlation.
    pub correlation: CorrelationConfig,

    /// Admission control.
    pub load_shedding: LoadSheddingConfig,

    /// Span sampling.
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Expose pipeline self-metrics on a Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, the first one included.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Metric buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Fraction of metrics retained (0.0 - 1.0).
    pub sampling_rate: f64,

    /// Per-key entry count that triggers a flush.
    pub max_size: usize,

    /// Periodic sweep interval in milliseconds.
    pub flush_interval_ms: u64,

    /// Flushes larger than this are compressed and held back.
    pub compression_threshold: usize,

    /// Metrics per sink batch.
    pub batch_size: usize,

    /// Compressed bytes per key that force an immediate send.
    pub max_compressed_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 1.0,
            max_size: 1000,
            flush_interval_ms: 10_000,
            compression_threshold: 100,
            batch_size: 100,
            max_compressed_bytes: 1024 * 1024,
        }
    }
}

/// One pre-registered aggregation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregationRule {
    pub metric: String,

    #[serde(rename = "type")]
    pub kind: AggregationType,

    pub window_ms: u64,

    #[serde(default)]
    pub percentile: Option<f64>,

    #[serde(default)]
    pub label_keys: Option<Vec<String>>,
}

/// Aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Stale window sweep interval; also the idle grace after a window ends.
    pub cleanup_interval_ms: u64,

    /// Aggregations registered at startup.
    pub rules: Vec<AggregationRule>,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: 5 * 60 * 1000,
            rules: Vec::new(),
        }
    }
}

/// Detection parameters for one metric series.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Maximum history length (oldest evicted first).
    pub window_size: usize,

    /// Z-score above which a value is anomalous.
    pub deviation_threshold: f64,

    /// History length required before detection starts.
    pub min_data_points: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            deviation_threshold: 3.0,
            min_data_points: 30,
        }
    }
}

/// Anomaly detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalySettings {
    /// Used when neither a metric nor a family entry matches.
    pub default: AnomalyConfig,

    /// Keyed by a substring of the metric name (e.g. `latency`).
    pub families: BTreeMap<String, AnomalyConfig>,

    /// Keyed by exact metric name.
    pub metrics: BTreeMap<String, AnomalyConfig>,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        let mut families = BTreeMap::new();
        families.insert(
            "latency".to_string(),
            AnomalyConfig {
                window_size: 200,
                deviation_threshold: 3.5,
                min_data_points: 50,
            },
        );
        families.insert(
            "error_rate".to_string(),
            AnomalyConfig {
                window_size: 100,
                deviation_threshold: 2.5,
                min_data_points: 20,
            },
        );
        families.insert(
            "memory_usage".to_string(),
            AnomalyConfig {
                window_size: 60,
                deviation_threshold: 3.0,
                min_data_points: 20,
            },
        );

        Self {
            default: AnomalyConfig::default(),
            families,
            metrics: BTreeMap::new(),
        }
    }
}

/// Alert correlation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Alerts older than this are pruned from the log.
    pub max_alert_age_ms: u64,

    /// Prune sweep interval.
    pub cleanup_interval_ms: u64,

    /// Hard cap on the alert log; oldest alerts are evicted first.
    pub max_alerts: usize,

    /// Replaces the built-in rules when non-empty.
    pub rules: Vec<CorrelationRule>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_alert_age_ms: 60 * 60 * 1000,
            cleanup_interval_ms: 5 * 60 * 1000,
            max_alerts: 10_000,
            rules: Vec::new(),
        }
    }
}

/// Load shedding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadSheddingConfig {
    /// Gate admissions while resources are over threshold.
    pub enabled: bool,

    /// Resource polling interval in milliseconds.
    pub poll_interval_ms: u64,

    pub thresholds: LoadThresholds,
}

impl Default for LoadSheddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 5000,
            thresholds: LoadThresholds::default(),
        }
    }
}

/// Span sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Fraction of spans recorded (0.0 - 1.0).
    pub sampling_rate: f64,

    /// Active span cap; the oldest spans are evicted beyond it.
    pub max_spans: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 0.1,
            max_spans: 10_000,
        }
    }
}
