//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates in [0, 1], sizes and intervals > 0)
//! - Check rule definitions (percentiles, thresholds, non-empty names)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::aggregation::AggregationType;
use crate::config::schema::{AnomalyConfig, PipelineConfig};

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check every section of `config`, collecting all errors.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_rate(&mut errors, "buffer.sampling_rate", config.buffer.sampling_rate);
    check_rate(&mut errors, "tracing.sampling_rate", config.tracing.sampling_rate);

    let retry = &config.retry;
    check_positive(&mut errors, "retry.max_retries", retry.max_retries as u64);
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!(
                "must not exceed max_delay_ms ({} > {})",
                retry.base_delay_ms, retry.max_delay_ms
            ),
        ));
    }

    let buffer = &config.buffer;
    check_positive(&mut errors, "buffer.max_size", buffer.max_size as u64);
    check_positive(&mut errors, "buffer.flush_interval_ms", buffer.flush_interval_ms);
    check_positive(&mut errors, "buffer.batch_size", buffer.batch_size as u64);
    check_positive(
        &mut errors,
        "buffer.max_compressed_bytes",
        buffer.max_compressed_bytes as u64,
    );

    check_positive(
        &mut errors,
        "aggregation.cleanup_interval_ms",
        config.aggregation.cleanup_interval_ms,
    );
    for (i, rule) in config.aggregation.rules.iter().enumerate() {
        let field = format!("aggregation.rules[{}]", i);
        if rule.metric.is_empty() {
            errors.push(ValidationError::new(&field, "metric name must not be empty"));
        }
        check_positive(&mut errors, &format!("{}.window_ms", field), rule.window_ms);
        if rule.kind == AggregationType::Percentile {
            match rule.percentile {
                Some(p) if p > 0.0 && p <= 100.0 => {}
                Some(p) => errors.push(ValidationError::new(
                    format!("{}.percentile", field),
                    format!("must be in (0, 100], got {}", p),
                )),
                None => errors.push(ValidationError::new(
                    format!("{}.percentile", field),
                    "required for percentile aggregation",
                )),
            }
        }
    }

    check_anomaly(&mut errors, "anomaly.default", &config.anomaly.default);
    for (family, cfg) in &config.anomaly.families {
        check_anomaly(&mut errors, &format!("anomaly.families.{}", family), cfg);
    }
    for (metric, cfg) in &config.anomaly.metrics {
        check_anomaly(&mut errors, &format!("anomaly.metrics.{}", metric), cfg);
    }

    let correlation = &config.correlation;
    check_positive(&mut errors, "correlation.max_alert_age_ms", correlation.max_alert_age_ms);
    check_positive(
        &mut errors,
        "correlation.cleanup_interval_ms",
        correlation.cleanup_interval_ms,
    );
    check_positive(&mut errors, "correlation.max_alerts", correlation.max_alerts as u64);
    for (i, rule) in correlation.rules.iter().enumerate() {
        let field = format!("correlation.rules[{}]", i);
        if rule.name.is_empty() {
            errors.push(ValidationError::new(&field, "rule name must not be empty"));
        }
        check_positive(&mut errors, &format!("{}.time_window_ms", field), rule.time_window_ms);
        if rule.conditions.is_empty() {
            errors.push(ValidationError::new(&field, "at least one condition is required"));
        }
        for (j, condition) in rule.conditions.iter().enumerate() {
            check_positive(
                &mut errors,
                &format!("{}.conditions[{}].threshold", field, j),
                condition.threshold as u64,
            );
        }
    }

    let shedding = &config.load_shedding;
    check_positive(&mut errors, "load_shedding.poll_interval_ms", shedding.poll_interval_ms);
    let thresholds = &shedding.thresholds;
    for (field, value) in [
        ("load_shedding.thresholds.cpu", thresholds.cpu),
        ("load_shedding.thresholds.memory", thresholds.memory),
    ] {
        if !(0.0..=100.0).contains(&value) {
            errors.push(ValidationError::new(
                field,
                format!("must be a percentage in [0, 100], got {}", value),
            ));
        }
    }
    if !(thresholds.request_rate > 0.0) {
        errors.push(ValidationError::new(
            "load_shedding.thresholds.request_rate",
            "must be greater than 0",
        ));
    }

    check_positive(&mut errors, "tracing.max_spans", config.tracing.max_spans as u64);

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rate(errors: &mut Vec<ValidationError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::new(
            field,
            format!("must be in [0, 1], got {}", value),
        ));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}

fn check_anomaly(errors: &mut Vec<ValidationError>, field: &str, config: &AnomalyConfig) {
    check_positive(errors, &format!("{}.window_size", field), config.window_size as u64);
    check_positive(
        errors,
        &format!("{}.min_data_points", field),
        config.min_data_points as u64,
    );
    if config.min_data_points > config.window_size {
        errors.push(ValidationError::new(
            format!("{}.min_data_points", field),
            "must not exceed window_size",
        ));
    }
    if !(config.deviation_threshold > 0.0) {
        errors.push(ValidationError::new(
            format!("{}.deviation_threshold", field),
            "must be greater than 0",
        ));
    }
}
