//! Pipeline self-metrics.
//!
//! # Metrics
//! - `pipeline_metrics_sampled_out_total` (counter): metrics dropped by sampling
//! - `pipeline_requests_shed_total` (counter): metrics rejected by load shedding
//! - `pipeline_retries_total` (counter): retry attempts by operation context
//! - `pipeline_dropped_total` (counter): records lost after retries, by stage
//! - `pipeline_compression_fallbacks_total` (counter): batches sent uncompressed after a failure
//! - `pipeline_evictions_total` (counter): spans/alerts evicted under capacity pressure
//! - `pipeline_anomalies_total` (counter): anomalies detected, by metric
//! - `pipeline_correlations_total` (counter): correlation rule firings, by rule
//! - `pipeline_active_spans` (gauge): spans currently tracked
//! - `pipeline_load_shedding` (gauge): 1=shedding, 0=admitting
//! - `pipeline_reject_probability` (gauge): current shedding probability
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording is a no-op until `init_metrics` installs an exporter

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_sampled_out() {
    metrics::counter!("pipeline_metrics_sampled_out_total").increment(1);
}

pub fn record_shed() {
    metrics::counter!("pipeline_requests_shed_total").increment(1);
}

pub fn record_retry(context: &str) {
    metrics::counter!("pipeline_retries_total", "context" => context.to_string()).increment(1);
}

pub fn record_dropped(stage: &'static str, count: usize) {
    metrics::counter!("pipeline_dropped_total", "stage" => stage).increment(count as u64);
}

pub fn record_compression_fallback() {
    metrics::counter!("pipeline_compression_fallbacks_total").increment(1);
}

pub fn record_evicted(kind: &'static str, count: usize) {
    metrics::counter!("pipeline_evictions_total", "kind" => kind).increment(count as u64);
}

pub fn record_anomaly(metric: &str) {
    metrics::counter!("pipeline_anomalies_total", "metric" => metric.to_string()).increment(1);
}

pub fn record_correlation(rule: &str) {
    metrics::counter!("pipeline_correlations_total", "rule" => rule.to_string()).increment(1);
}

pub fn set_active_spans(count: usize) {
    metrics::gauge!("pipeline_active_spans").set(count as f64);
}

pub fn set_shedding(active: bool, reject_probability: f64) {
    metrics::gauge!("pipeline_load_shedding").set(if active { 1.0 } else { 0.0 });
    metrics::gauge!("pipeline_reject_probability").set(reject_probability);
}
