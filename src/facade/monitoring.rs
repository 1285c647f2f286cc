//! Monitoring facade.
//!
//! # Responsibilities
//! - Build every pipeline component from one `PipelineConfig`
//! - Route producer calls through admission, detection, aggregation and buffering
//! - Own the periodic sweeps and drain everything on shutdown

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::aggregation::{AggregationConfig, AggregationOptions, AggregationType, MetricAggregator};
use crate::anomaly::{Anomaly, AnomalyDetector};
use crate::buffer::MetricBuffer;
use crate::config::PipelineConfig;
use crate::correlation::AlertCorrelator;
use crate::facade::Ingest;
use crate::lifecycle::{Clock, Scheduler};
use crate::load_shedding::{LoadShedder, ResourceProbe, ResourceUpdate};
use crate::model::{
    Alert, AlertSeverity, AttributeValue, ErrorReport, HealthCheck, HealthStatus, Labels, Metric,
    SpanContext, SpanRef,
};
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;
use crate::tracer::Tracer;

/// Point-in-time view of pipeline state.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    pub buffered_metrics: usize,
    pub compressed_segments: usize,
    pub aggregation_windows: usize,
    pub logged_alerts: usize,
    pub active_spans: usize,
    pub shedding: bool,
    pub reject_probability: f64,
}

/// Components shared between the facade and its periodic jobs.
#[derive(Debug)]
struct Pipeline {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    retry: RetryHandler,
    buffer: MetricBuffer,
    aggregator: MetricAggregator,
    detector: AnomalyDetector,
    correlator: AlertCorrelator,
    shedder: LoadShedder,
    tracer: Tracer,
}

impl Pipeline {
    /// Everything after admission: detection, aggregation, buffering.
    ///
    /// Producer metrics are validated before admission; derived ones are checked here.
    async fn process(&self, metric: Metric) {
        if let Err(e) = metric.validate() {
            tracing::warn!(metric = %metric.name, error = %e, "Dropping invalid derived metric");
            metrics::record_dropped("validation", 1);
            return;
        }
        if let Some(anomaly) = self.detector.analyze(&metric).await {
            let alert = anomaly_alert(&anomaly, &metric.labels);
            self.correlator.process_alert(alert).await;
        }
        self.aggregator.process(&metric).await;
        self.buffer.add(metric).await;
    }

    async fn record_resource_usage(&self, update: ResourceUpdate) {
        let sanitized = update.finite();
        if sanitized != update {
            tracing::warn!(?update, "Ignoring non-finite resource readings");
            metrics::record_dropped("resource_usage", 1);
        }
        if sanitized.is_empty() {
            return;
        }
        let update = sanitized;
        self.shedder.update_resource_usage(update).await;

        let now = self.clock.now_ms();
        let samples = [
            ("cpu_usage", update.cpu, "percent"),
            ("memory_usage", update.memory, "percent"),
            ("request_rate", update.request_rate, "requests_per_second"),
        ];
        for (name, value, unit) in samples {
            if let Some(value) = value {
                let metric = Metric::new(name, value, now)
                    .with_unit(unit)
                    .with_label("source", "load_shedder");
                self.process(metric).await;
            }
        }
    }

    async fn flush(&self) {
        self.aggregator.flush_all().await;
        self.buffer.flush_all().await;
    }
}

/// Single entry point for producers of metrics, spans, errors and health.
#[derive(Debug)]
pub struct MonitoringFacade {
    pipeline: Arc<Pipeline>,
    scheduler: Scheduler,
    probe: Option<Arc<dyn ResourceProbe>>,
    config: PipelineConfig,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl MonitoringFacade {
    pub fn new(config: PipelineConfig, sink: Arc<dyn Sink>, clock: Arc<dyn Clock>) -> Self {
        let retry = RetryHandler::new(&config.retry);

        let aggregator = MetricAggregator::new(
            config.aggregation.cleanup_interval_ms,
            clock.clone(),
            sink.clone(),
            retry.clone(),
        );
        for rule in &config.aggregation.rules {
            aggregator.register(
                &rule.metric,
                AggregationConfig::new(
                    rule.kind,
                    rule.window_ms,
                    AggregationOptions {
                        percentile: rule.percentile,
                        label_keys: rule.label_keys.clone(),
                    },
                ),
            );
        }

        let pipeline = Pipeline {
            buffer: MetricBuffer::new(config.buffer.clone(), sink.clone(), retry.clone()),
            aggregator,
            detector: AnomalyDetector::new(
                config.anomaly.clone(),
                clock.clone(),
                sink.clone(),
                retry.clone(),
            ),
            correlator: AlertCorrelator::new(
                &config.correlation,
                clock.clone(),
                sink.clone(),
                retry.clone(),
            ),
            shedder: LoadShedder::new(
                &config.load_shedding,
                clock.clone(),
                sink.clone(),
                retry.clone(),
            ),
            tracer: Tracer::new(&config.tracing, clock.clone(), sink.clone()),
            sink,
            clock,
            retry,
        };

        Self {
            pipeline: Arc::new(pipeline),
            scheduler: Scheduler::new(),
            probe: None,
            config,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Poll `probe` for resource usage every `load_shedding.poll_interval_ms`.
    pub fn with_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Initialize the sink and start the periodic sweeps.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let sink = &self.pipeline.sink;
        if let Err(e) = self
            .pipeline
            .retry
            .with_retry("sink initialize", move || sink.initialize())
            .await
        {
            tracing::error!(error = %e, "Sink failed to initialize, continuing without it");
        }

        let pipeline = self.pipeline.clone();
        self.scheduler.every(
            "buffer flush",
            Duration::from_millis(self.config.buffer.flush_interval_ms),
            move || {
                let pipeline = pipeline.clone();
                async move { pipeline.buffer.flush_all().await }
            },
        );

        let pipeline = self.pipeline.clone();
        self.scheduler.every(
            "aggregation cleanup",
            Duration::from_millis(self.config.aggregation.cleanup_interval_ms),
            move || {
                let pipeline = pipeline.clone();
                async move {
                    pipeline.aggregator.cleanup().await;
                }
            },
        );

        let pipeline = self.pipeline.clone();
        self.scheduler.every(
            "alert pruning",
            Duration::from_millis(self.config.correlation.cleanup_interval_ms),
            move || {
                let pipeline = pipeline.clone();
                async move {
                    pipeline.correlator.prune();
                }
            },
        );

        if let Some(probe) = &self.probe {
            let pipeline = self.pipeline.clone();
            let probe = probe.clone();
            self.scheduler.every(
                "resource poll",
                Duration::from_millis(self.config.load_shedding.poll_interval_ms),
                move || {
                    let pipeline = pipeline.clone();
                    let probe = probe.clone();
                    async move {
                        let update = pipeline.shedder.sample(probe.as_ref());
                        pipeline.record_resource_usage(update).await;
                    }
                },
            );
        }

        tracing::info!(jobs = self.scheduler.job_count(), "Monitoring pipeline started");
    }

    /// Submit one metric.
    pub async fn record_metric(&self, metric: Metric) -> Ingest {
        if let Err(e) = metric.validate() {
            tracing::warn!(metric = %metric.name, error = %e, "Rejecting invalid metric");
            return Ingest::Rejected;
        }

        if !self.pipeline.shedder.should_process_request() {
            tracing::debug!(metric = %metric.name, "Metric shed");
            return Ingest::Shed;
        }

        self.pipeline.process(metric).await;
        Ingest::Accepted
    }

    /// Report an application error with optional context.
    pub async fn record_error(
        &self,
        error: &(dyn std::error::Error + Send + Sync + 'static),
        context: Option<BTreeMap<String, String>>,
    ) {
        let report = ErrorReport::from_error(error, self.pipeline.clock.now_ms())
            .with_context(context.unwrap_or_default());
        self.record_error_report(report).await;
    }

    pub async fn record_error_report(&self, report: ErrorReport) {
        let sink = &self.pipeline.sink;
        let report_ref = &report;
        if let Err(e) = self
            .pipeline
            .retry
            .with_retry("error export", move || sink.record_error(report_ref))
            .await
        {
            tracing::error!(error = %e, message = %report.message, "Dropping error report");
            metrics::record_dropped("error", 1);
        }

        self.pipeline.correlator.process_error(&report).await;
    }

    /// Report a component's health.
    pub async fn record_health(&self, component: &str, status: HealthStatus, message: &str) {
        let check = HealthCheck::new(component, status, message, self.pipeline.clock.now_ms());
        let sink = &self.pipeline.sink;
        let check = &check;
        if let Err(e) = self
            .pipeline
            .retry
            .with_retry("health export", move || sink.record_health_check(check))
            .await
        {
            tracing::error!(component = %component, error = %e, "Dropping health check");
            metrics::record_dropped("health", 1);
        }
    }

    /// Submit a raw alert for correlation. Returns the correlations it triggered.
    pub async fn record_alert(&self, alert: Alert) -> Vec<Alert> {
        if let Err(e) = alert.validate() {
            tracing::warn!(error = %e, "Rejecting invalid alert");
            return Vec::new();
        }
        self.pipeline.correlator.process_alert(alert).await
    }

    pub fn configure_aggregation(
        &self,
        metric_name: &str,
        kind: AggregationType,
        window_ms: u64,
        options: Option<AggregationOptions>,
    ) {
        if window_ms == 0 {
            tracing::warn!(metric = %metric_name, "Ignoring aggregation with empty window");
            return;
        }
        self.pipeline.aggregator.register(
            metric_name,
            AggregationConfig::new(kind, window_ms, options.unwrap_or_default()),
        );
    }

    pub fn set_tracing_sampling_rate(&self, rate: f64) {
        self.pipeline.tracer.set_sampling_rate(rate);
    }

    pub fn enable_load_shedding(&self) {
        self.pipeline.shedder.enable();
    }

    pub fn disable_load_shedding(&self) {
        self.pipeline.shedder.disable();
    }

    /// Update load shedding and emit the usage as metrics.
    pub async fn record_resource_usage(&self, update: ResourceUpdate) {
        self.pipeline.record_resource_usage(update).await;
    }

    pub async fn start_operation(&self, name: &str) -> SpanRef {
        self.pipeline.tracer.start_span(name, None).await
    }

    pub async fn start_child_operation(&self, name: &str, parent: &SpanRef) -> SpanRef {
        self.pipeline
            .tracer
            .start_span(name, Some(SpanContext::child_of(parent)))
            .await
    }

    pub fn annotate_operation(&self, span: &SpanRef, key: &str, value: impl Into<AttributeValue>) {
        if let Err(e) = self.pipeline.tracer.add_attribute(span, key, value) {
            tracing::warn!(span = %span.name(), error = %e, "Cannot annotate span");
        }
    }

    pub fn fail_operation(&self, span: &SpanRef, message: &str) {
        if let Err(e) = self.pipeline.tracer.record_error(span, message) {
            tracing::warn!(span = %span.name(), error = %e, "Cannot record span error");
        }
    }

    /// End the operation and feed its latency into aggregation and detection.
    pub async fn end_operation(&self, span: &SpanRef) {
        match self.pipeline.tracer.end_span(span).await {
            Ok(Some(latency)) => self.pipeline.process(latency).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(span = %span.name(), error = %e, "Cannot end span"),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let p = &self.pipeline;
        PipelineStats {
            buffered_metrics: p.buffer.buffered_count(),
            compressed_segments: p.buffer.compressed_segments(),
            aggregation_windows: p.aggregator.window_count(),
            logged_alerts: p.correlator.alert_count(),
            active_spans: p.tracer.active_span_count(),
            shedding: p.shedder.is_shedding(),
            reject_probability: p.shedder.reject_probability(),
        }
    }

    /// Flush buffers and open windows now, without stopping.
    pub async fn flush(&self) {
        self.pipeline.flush().await;
    }

    /// Stop the sweeps, drain everything buffered, and shut the sink down.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Monitoring pipeline shutting down");

        self.scheduler.shutdown().await;
        self.pipeline.flush().await;

        if let Err(e) = self.pipeline.sink.shutdown().await {
            tracing::error!(error = %e, "Sink shutdown failed");
        }
        tracing::info!("Monitoring pipeline stopped");
    }
}

/// Correlation input for an anomaly, typed by metric family.
fn anomaly_alert(anomaly: &Anomaly, labels: &Labels) -> Alert {
    let alert_type = if anomaly.metric.contains("latency") {
        "latency"
    } else if anomaly.metric.contains("error_rate") {
        "error_rate"
    } else if anomaly.metric.contains("cpu") {
        "cpu_usage"
    } else if anomaly.metric.contains("memory") {
        "memory_usage"
    } else {
        "anomaly"
    };

    let source = labels
        .get("source")
        .or_else(|| labels.get("service"))
        .map(String::as_str)
        .unwrap_or("anomaly_detector");

    let severity = if anomaly.z_score > anomaly.threshold * 2.0 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    };

    let mut context = BTreeMap::new();
    context.insert("metric".to_string(), anomaly.metric.clone());
    context.insert("value".to_string(), anomaly.value.to_string());
    context.insert("z_score".to_string(), format!("{:.3}", anomaly.z_score));

    Alert::new(
        source,
        alert_type,
        severity,
        anomaly.timestamp,
        format!(
            "{} = {} deviates from mean {:.3}",
            anomaly.metric, anomaly.value, anomaly.mean
        ),
    )
    .with_context(context)
}
