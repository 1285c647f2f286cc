//! Sink that writes every record as a structured log event.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::model::{ErrorReport, HealthCheck, HealthStatus, Metric, SpanHandle};
use crate::sink::{Sink, SinkResult};

/// Writes telemetry through `tracing` under the `telemetry` target.
#[derive(Debug, Default)]
pub struct LogSink {
    next_span: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn initialize(&self) -> SinkResult<()> {
        tracing::info!(target: "telemetry", "Log sink initialized");
        Ok(())
    }

    async fn record_metric(&self, metric: &Metric) -> SinkResult<()> {
        tracing::info!(
            target: "telemetry",
            metric = %metric.name,
            value = metric.value,
            timestamp = metric.timestamp,
            labels = ?metric.labels,
            unit = metric.unit.as_deref().unwrap_or(""),
            "metric"
        );
        Ok(())
    }

    async fn record_metrics(&self, metrics: &[Metric]) -> SinkResult<()> {
        tracing::debug!(target: "telemetry", count = metrics.len(), "metric batch");
        for metric in metrics {
            self.record_metric(metric).await?;
        }
        Ok(())
    }

    async fn record_health_check(&self, check: &HealthCheck) -> SinkResult<()> {
        match check.status {
            HealthStatus::Healthy => tracing::info!(
                target: "telemetry",
                component = %check.component,
                status = %check.status,
                details = ?check.details,
                "{}", check.message
            ),
            _ => tracing::warn!(
                target: "telemetry",
                component = %check.component,
                status = %check.status,
                details = ?check.details,
                "{}", check.message
            ),
        }
        Ok(())
    }

    async fn record_error(&self, error: &ErrorReport) -> SinkResult<()> {
        tracing::error!(
            target: "telemetry",
            source = %error.source(),
            context = ?error.context,
            "{}", error.message
        );
        Ok(())
    }

    async fn start_span(&self, name: &str) -> SinkResult<SpanHandle> {
        let id = self.next_span.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: "telemetry", span = name, handle = id, "span started");
        Ok(SpanHandle(id.to_string()))
    }

    async fn end_span(&self, handle: &SpanHandle) -> SinkResult<()> {
        tracing::trace!(target: "telemetry", handle = %handle.0, "span ended");
        Ok(())
    }

    async fn shutdown(&self) -> SinkResult<()> {
        tracing::info!(target: "telemetry", "Log sink shut down");
        Ok(())
    }
}
