//! Rolling z-score detector.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{AnomalyConfig, AnomalySettings};
use crate::lifecycle::Clock;
use crate::model::{HealthCheck, HealthStatus, Metric};
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;

const COMPONENT: &str = "anomaly_detector";

/// An observation that deviated from its series baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
    pub threshold: f64,
    pub timestamp: u64,
}

#[derive(Debug)]
pub struct AnomalyDetector {
    settings: AnomalySettings,
    histories: DashMap<String, VecDeque<f64>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn Sink>,
    retry: RetryHandler,
}

impl AnomalyDetector {
    pub fn new(
        settings: AnomalySettings,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn Sink>,
        retry: RetryHandler,
    ) -> Self {
        Self {
            settings,
            histories: DashMap::new(),
            clock,
            sink,
            retry,
        }
    }

    /// Detection parameters for `name`.
    pub fn config_for(&self, name: &str) -> AnomalyConfig {
        if let Some(config) = self.settings.metrics.get(name) {
            return *config;
        }
        self.settings
            .families
            .iter()
            .find(|(family, _)| name.contains(family.as_str()))
            .map(|(_, config)| *config)
            .unwrap_or(self.settings.default)
    }

    /// Record `metric` and report it when it deviates from the series baseline.
    pub fn observe(&self, metric: &Metric) -> Option<Anomaly> {
        // A single NaN would poison the series statistics for a whole window
        if !metric.value.is_finite() {
            return None;
        }
        let config = self.config_for(&metric.name);

        let (mean, std_dev) = {
            let mut history = self.histories.entry(metric.name.clone()).or_default();
            history.push_back(metric.value);
            while history.len() > config.window_size {
                history.pop_front();
            }
            if history.len() < config.min_data_points {
                return None;
            }
            population_stats(history.iter().copied())
        };

        let z_score = if std_dev > 0.0 {
            (metric.value - mean).abs() / std_dev
        } else if metric.value != mean {
            f64::INFINITY
        } else {
            0.0
        };

        if z_score <= config.deviation_threshold {
            return None;
        }

        Some(Anomaly {
            metric: metric.name.clone(),
            value: metric.value,
            mean,
            std_dev,
            z_score,
            threshold: config.deviation_threshold,
            timestamp: self.clock.now_ms(),
        })
    }

    /// `observe`, then export the anomaly metric and a degraded health signal.
    pub async fn analyze(&self, metric: &Metric) -> Option<Anomaly> {
        let anomaly = self.observe(metric)?;

        tracing::warn!(
            metric = %anomaly.metric,
            value = anomaly.value,
            mean = anomaly.mean,
            std_dev = anomaly.std_dev,
            z_score = anomaly.z_score,
            "Anomaly detected"
        );
        metrics::record_anomaly(&anomaly.metric);

        let derived = Metric::new(
            format!("{}_anomaly", anomaly.metric),
            anomaly.value,
            anomaly.timestamp,
        )
        .with_labels(metric.labels.clone())
        .with_label("z_score", format!("{:.3}", anomaly.z_score))
        .with_label("mean", format!("{:.3}", anomaly.mean))
        .with_label("std_dev", format!("{:.3}", anomaly.std_dev));

        let health = HealthCheck::new(
            COMPONENT,
            HealthStatus::Degraded,
            format!("Anomaly detected in {}", anomaly.metric),
            anomaly.timestamp,
        )
        .with_detail("metric", &anomaly.metric)
        .with_detail("value", anomaly.value)
        .with_detail("z_score", format!("{:.3}", anomaly.z_score))
        .with_detail("threshold", anomaly.threshold);

        let sink = &self.sink;
        let derived = &derived;
        if let Err(e) = self
            .retry
            .with_retry("anomaly metric", move || sink.record_metric(derived))
            .await
        {
            tracing::error!(metric = %anomaly.metric, error = %e, "Dropping anomaly metric");
            metrics::record_dropped("anomaly", 1);
        }
        let health = &health;
        if let Err(e) = self
            .retry
            .with_retry("anomaly health", move || sink.record_health_check(health))
            .await
        {
            tracing::error!(metric = %anomaly.metric, error = %e, "Dropping anomaly health signal");
            metrics::record_dropped("health", 1);
        }

        Some(anomaly)
    }

    /// Values currently held for `name`.
    pub fn history_len(&self, name: &str) -> usize {
        self.histories.get(name).map(|h| h.len()).unwrap_or(0)
    }

    /// Forget the baseline of `name`.
    pub fn reset(&self, name: &str) {
        self.histories.remove(name);
    }
}

/// Population mean and standard deviation.
fn population_stats(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ManualClock;
    use crate::sink::MemorySink;

    fn detector(settings: AnomalySettings) -> (AnomalyDetector, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let detector = AnomalyDetector::new(
            settings,
            Arc::new(ManualClock::new(5_000)),
            sink.clone(),
            RetryHandler::default(),
        );
        (detector, sink)
    }

    fn plain() -> AnomalySettings {
        AnomalySettings {
            families: Default::default(),
            ..Default::default()
        }
    }

    fn feed(detector: &AnomalyDetector, name: &str, values: impl IntoIterator<Item = f64>) {
        for v in values {
            assert!(detector.observe(&Metric::new(name, v, 0)).is_none());
        }
    }

    #[test]
    fn test_zero_variance_same_value_is_normal() {
        let (detector, _) = detector(plain());
        feed(&detector, "queue_depth", std::iter::repeat(10.0).take(40));
        assert!(detector.observe(&Metric::new("queue_depth", 10.0, 0)).is_none());
    }

    #[test]
    fn test_zero_variance_baseline_flags_deviation() {
        let (detector, _) = detector(plain());
        feed(&detector, "queue_depth", std::iter::repeat(10.0).take(30));

        let anomaly = detector.observe(&Metric::new("queue_depth", 11.0, 0)).unwrap();
        assert!(anomaly.z_score.is_finite());
        assert!(anomaly.z_score > 3.0);
        assert_eq!(anomaly.value, 11.0);
    }

    #[test]
    fn test_non_finite_values_stay_out_of_history() {
        let (detector, _) = detector(plain());
        feed(&detector, "cpu", std::iter::repeat(50.0).take(40));

        assert!(detector.observe(&Metric::new("cpu", f64::NAN, 0)).is_none());
        assert!(detector.observe(&Metric::new("cpu", f64::INFINITY, 0)).is_none());
        assert_eq!(detector.history_len("cpu"), 40);

        feed(&detector, "cpu", std::iter::repeat(50.0).take(10));
    }

    #[test]
    fn test_nothing_flagged_before_min_data_points() {
        let (detector, _) = detector(plain());
        feed(&detector, "cpu", std::iter::repeat(1.0).take(28));
        assert!(detector.observe(&Metric::new("cpu", 1_000.0, 0)).is_none());
        assert_eq!(detector.history_len("cpu"), 29);
    }

    #[test]
    fn test_normal_variation_is_not_flagged() {
        let (detector, _) = detector(plain());
        feed(&detector, "rps", (0..60).map(|i| if i % 2 == 0 { 10.0 } else { 12.0 }));
        assert!(detector.observe(&Metric::new("rps", 11.0, 0)).is_none());
        assert!(detector.observe(&Metric::new("rps", 13.0, 0)).is_none());
        assert!(detector.observe(&Metric::new("rps", 40.0, 0)).is_some());
    }

    #[test]
    fn test_history_is_bounded() {
        let (detector, _) = detector(plain());
        for i in 0..250 {
            detector.observe(&Metric::new("bookings", (i % 7) as f64, 0));
        }
        assert_eq!(detector.history_len("bookings"), 100);
    }

    #[test]
    fn test_config_resolution() {
        let mut settings = AnomalySettings::default();
        let exact = AnomalyConfig {
            window_size: 10,
            deviation_threshold: 1.5,
            min_data_points: 5,
        };
        settings.metrics.insert("db_latency".into(), exact);
        let (detector, _) = detector(settings);

        assert_eq!(detector.config_for("db_latency"), exact);
        assert_eq!(detector.config_for("api_latency_ms").window_size, 200);
        assert_eq!(detector.config_for("checkout_error_rate").deviation_threshold, 2.5);
        assert_eq!(detector.config_for("bookings"), AnomalyConfig::default());
    }

    #[tokio::test]
    async fn test_analyze_exports_metric_and_health() {
        let (detector, sink) = detector(plain());
        feed(&detector, "queue_depth", std::iter::repeat(10.0).take(30));

        let metric = Metric::new("queue_depth", 50.0, 0).with_label("queue", "payments");
        let anomaly = detector.analyze(&metric).await.unwrap();
        assert_eq!(anomaly.timestamp, 5_000);

        let exported = sink.metrics_named("queue_depth_anomaly");
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].value, 50.0);
        assert_eq!(exported[0].labels["queue"], "payments");
        assert!(exported[0].labels.contains_key("z_score"));

        let health = sink.health_checks();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].status, HealthStatus::Degraded);
        assert_eq!(health[0].details["value"], "50");
    }
}
