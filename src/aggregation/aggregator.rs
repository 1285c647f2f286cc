//! Windowed metric aggregator.

use std::sync::Arc;

use dashmap::DashMap;

use crate::aggregation::window::{reduce, AggregationWindow};
use crate::aggregation::{AggregationConfig, AggregationType};
use crate::lifecycle::Clock;
use crate::model::{Labels, Metric};
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;

/// Reduces registered metrics over fixed time windows.
#[derive(Debug)]
pub struct MetricAggregator {
    configs: DashMap<String, AggregationConfig>,
    windows: DashMap<String, AggregationWindow>,
    cleanup_interval_ms: u64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn Sink>,
    retry: RetryHandler,
}

impl MetricAggregator {
    pub fn new(
        cleanup_interval_ms: u64,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn Sink>,
        retry: RetryHandler,
    ) -> Self {
        Self {
            configs: DashMap::new(),
            windows: DashMap::new(),
            cleanup_interval_ms,
            clock,
            sink,
            retry,
        }
    }

    /// Register (or replace) the aggregation for `name`.
    ///
    /// Open windows keep their bounds; the new settings apply from their next roll.
    pub fn register(&self, name: &str, config: AggregationConfig) {
        tracing::info!(
            metric = %name,
            aggregation = %config.kind,
            window_ms = config.window_ms,
            "Aggregation registered"
        );
        self.configs.insert(name.to_string(), config);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    /// Fold `metric` into its window. Returns the aggregate when the window closed.
    pub async fn process(&self, metric: &Metric) -> Option<Metric> {
        let config = self.configs.get(&metric.name)?.clone();
        let labels = select_labels(&metric.labels, config.label_keys.as_deref());
        let key = window_key(&metric.name, &labels);
        let now = self.clock.now_ms();

        let closed = {
            let mut window = self.windows.entry(key).or_insert_with(|| {
                AggregationWindow::new(
                    metric.name.clone(),
                    now,
                    config.window_ms,
                    labels,
                    metric.unit.clone(),
                )
            });
            window.values.push(metric.value);

            if window.is_expired(now) {
                Some(window.roll(now, config.window_ms))
            } else {
                None
            }
        };

        let aggregate = build_aggregate(&config, &closed?, now)?;
        self.emit(&aggregate).await;
        Some(aggregate)
    }

    /// Emit and purge windows idle past `end_time + cleanup_interval`.
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let grace = self.cleanup_interval_ms;

        let stale: Vec<String> = self
            .windows
            .iter()
            .filter(|e| now > e.value().end_time.saturating_add(grace))
            .map(|e| e.key().clone())
            .collect();

        let mut purged = 0;
        for key in stale {
            let removed = self
                .windows
                .remove_if(&key, |_, w| now > w.end_time.saturating_add(grace));
            if let Some((_, window)) = removed {
                purged += 1;
                self.flush_window(window, now).await;
            }
        }

        if purged > 0 {
            tracing::debug!(purged = purged, remaining = self.windows.len(), "Stale aggregation windows purged");
        }
        purged
    }

    /// Emit every non-empty window and clear all state. Used at shutdown.
    pub async fn flush_all(&self) {
        let now = self.clock.now_ms();
        let keys: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, window)) = self.windows.remove(&key) {
                self.flush_window(window, now).await;
            }
        }
    }

    /// Open windows across all keys.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    async fn flush_window(&self, window: AggregationWindow, now: u64) {
        let Some(config) = self.configs.get(&window.metric).map(|c| c.clone()) else {
            return;
        };
        if let Some(aggregate) = build_aggregate(&config, &window, now) {
            self.emit(&aggregate).await;
        }
    }

    async fn emit(&self, aggregate: &Metric) {
        let sink = &self.sink;
        let result = self
            .retry
            .with_retry("aggregation emit", move || sink.record_metric(aggregate))
            .await;

        match result {
            Ok(()) => tracing::debug!(
                metric = %aggregate.name,
                value = aggregate.value,
                "Aggregate emitted"
            ),
            Err(e) => {
                tracing::error!(metric = %aggregate.name, error = %e, "Dropping aggregate");
                metrics::record_dropped("aggregation", 1);
            }
        }
    }
}

/// Labels that identify a window: the configured keys (missing ones empty) or all of them.
fn select_labels(labels: &Labels, keys: Option<&[String]>) -> Labels {
    match keys {
        Some(keys) => keys
            .iter()
            .map(|k| (k.clone(), labels.get(k).cloned().unwrap_or_default()))
            .collect(),
        None => labels.clone(),
    }
}

fn window_key(name: &str, labels: &Labels) -> String {
    let values: Vec<&str> = labels.values().map(String::as_str).collect();
    format!("{}:{}", name, values.join(","))
}

fn build_aggregate(
    config: &AggregationConfig,
    window: &AggregationWindow,
    now: u64,
) -> Option<Metric> {
    let value = reduce(config.kind, &window.values, config.percentile)?;

    let mut aggregate = Metric::new(format!("{}_{}", window.metric, config.kind), value, now)
        .with_labels(window.labels.clone())
        .with_label("aggregation", config.kind.to_string())
        .with_label("window", format!("{}ms", window.end_time - window.start_time));
    if config.kind == AggregationType::Percentile {
        aggregate = aggregate.with_label(
            "percentile",
            config.percentile.unwrap_or(50.0).to_string(),
        );
    }
    aggregate.unit = window.unit.clone();
    Some(aggregate)
}
