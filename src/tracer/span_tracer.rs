//! Span lifecycle and latency capture.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::TracingConfig;
use crate::error::{PipelineError, Result};
use crate::lifecycle::Clock;
use crate::model::{AttributeValue, Metric, Span, SpanContext, SpanId, SpanRef};
use crate::observability::metrics;
use crate::sink::Sink;
use crate::tracer::active::ActiveSpans;

#[derive(Debug)]
pub struct Tracer {
    /// `f64` bits.
    sampling_rate: AtomicU64,
    spans: Mutex<ActiveSpans>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn Sink>,
}

impl Tracer {
    pub fn new(config: &TracingConfig, clock: Arc<dyn Clock>, sink: Arc<dyn Sink>) -> Self {
        Self {
            sampling_rate: AtomicU64::new(config.sampling_rate.clamp(0.0, 1.0).to_bits()),
            spans: Mutex::new(ActiveSpans::new(config.max_spans)),
            clock,
            sink,
        }
    }

    pub fn sampling_rate(&self) -> f64 {
        f64::from_bits(self.sampling_rate.load(Ordering::Relaxed))
    }

    /// Set the fraction of spans recorded. Clamped to `[0, 1]`.
    pub fn set_sampling_rate(&self, rate: f64) {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self.sampling_rate.store(rate.to_bits(), Ordering::Relaxed);
        tracing::info!(sampling_rate = rate, "Tracing sampling rate updated");
    }

    pub async fn start_span(&self, name: &str, context: Option<SpanContext>) -> SpanRef {
        let context = context.unwrap_or_default();
        let sampled = context
            .sampled
            .unwrap_or_else(|| fastrand::f64() < self.sampling_rate());
        if !sampled {
            return SpanRef::unsampled(name);
        }

        let handle = match self.sink.start_span(name).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(span = %name, error = %e, "Sink failed to start span, tracking locally");
                None
            }
        };

        let span = Span {
            id: SpanId::generate(),
            name: name.to_string(),
            start_time: self.clock.now_ms(),
            end_time: None,
            parent_id: context.parent_id,
            attributes: BTreeMap::new(),
            handle,
        };
        let span_ref = SpanRef::sampled(span.id.clone(), name);

        let (evicted, active) = {
            let mut spans = self.spans.lock();
            let evicted = spans.insert(span);
            (evicted, spans.len())
        };
        metrics::set_active_spans(active);

        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "Active span table full, evicting oldest");
            metrics::record_evicted("span", evicted.len());
            for span in evicted {
                if let Some(handle) = &span.handle {
                    if let Err(e) = self.sink.end_span(handle).await {
                        tracing::debug!(span = %span.name, error = %e, "Sink failed to close evicted span");
                    }
                }
            }
        }

        span_ref
    }

    pub fn add_attribute(
        &self,
        span: &SpanRef,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        let Some(id) = span.id() else {
            return Ok(());
        };
        let mut spans = self.spans.lock();
        let active = spans
            .get_mut(id)
            .ok_or_else(|| PipelineError::SpanNotFound(id.clone()))?;
        active.attributes.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Mark the span failed.
    pub fn record_error(&self, span: &SpanRef, message: &str) -> Result<()> {
        self.add_attribute(span, "error", true)?;
        self.add_attribute(span, "error.message", message)
    }

    /// End the span and return its latency metric. `None` for unsampled spans.
    pub async fn end_span(&self, span: &SpanRef) -> Result<Option<Metric>> {
        let Some(id) = span.id() else {
            return Ok(None);
        };

        let (mut ended, active) = {
            let mut spans = self.spans.lock();
            let ended = spans
                .remove(id)
                .ok_or_else(|| PipelineError::SpanNotFound(id.clone()))?;
            (ended, spans.len())
        };
        metrics::set_active_spans(active);

        let now = self.clock.now_ms();
        ended.end_time = Some(now);

        if let Some(handle) = &ended.handle {
            if let Err(e) = self.sink.end_span(handle).await {
                tracing::warn!(span = %ended.name, error = %e, "Sink failed to end span");
            }
        }

        let duration = ended.duration_ms().unwrap_or(0);
        let mut latency = Metric::new(format!("{}_latency", ended.name), duration as f64, now)
            .with_unit("ms")
            .with_label("span", ended.name.clone());
        if matches!(ended.attributes.get("error"), Some(AttributeValue::Bool(true))) {
            latency = latency.with_label("error", "true");
        }

        tracing::trace!(span = %ended.name, id = %id, duration_ms = duration, "Span ended");
        Ok(Some(latency))
    }

    pub fn active_span_count(&self) -> usize {
        self.spans.lock().len()
    }

    /// Snapshot of an active span.
    pub fn span(&self, id: &SpanId) -> Option<Span> {
        self.spans.lock().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ManualClock;
    use crate::sink::MemorySink;

    fn tracer(sampling_rate: f64, max_spans: usize) -> (Tracer, Arc<ManualClock>, Arc<MemorySink>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(
            &TracingConfig {
                sampling_rate,
                max_spans,
            },
            clock.clone(),
            sink.clone(),
        );
        (tracer, clock, sink)
    }

    fn forced() -> Option<SpanContext> {
        Some(SpanContext {
            sampled: Some(true),
            parent_id: None,
        })
    }

    #[tokio::test]
    async fn test_sampled_span_lifecycle() {
        let (tracer, clock, sink) = tracer(1.0, 100);

        let span = tracer.start_span("checkout", None).await;
        assert!(span.is_sampled());
        assert_eq!(tracer.active_span_count(), 1);
        assert_eq!(sink.open_spans(), 1);

        tracer.add_attribute(&span, "items", 3i64).unwrap();
        clock.advance(250);

        let latency = tracer.end_span(&span).await.unwrap().unwrap();
        assert_eq!(latency.name, "checkout_latency");
        assert_eq!(latency.value, 250.0);
        assert_eq!(latency.unit.as_deref(), Some("ms"));
        assert_eq!(latency.labels["span"], "checkout");

        assert_eq!(tracer.active_span_count(), 0);
        assert_eq!(sink.ended_spans(), 1);
    }

    #[tokio::test]
    async fn test_unsampled_span_is_noop() {
        let (tracer, _, sink) = tracer(0.0, 100);

        let span = tracer.start_span("search", None).await;
        assert!(!span.is_sampled());
        assert!(tracer.add_attribute(&span, "k", "v").is_ok());
        assert!(tracer.record_error(&span, "boom").is_ok());
        assert_eq!(tracer.end_span(&span).await.unwrap(), None);

        assert_eq!(tracer.active_span_count(), 0);
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn test_context_overrides_sampling() {
        let (tracer, _, _) = tracer(0.0, 100);
        let parent = tracer.start_span("parent", forced()).await;
        assert!(parent.is_sampled());

        let child = tracer
            .start_span("child", Some(SpanContext::child_of(&parent)))
            .await;
        let stored = tracer.span(child.id().unwrap()).unwrap();
        assert_eq!(stored.parent_id.as_ref(), parent.id());
    }

    #[tokio::test]
    async fn test_overflow_evicts_oldest() {
        let (tracer, _, sink) = tracer(1.0, 3);

        let mut spans = Vec::new();
        for i in 0..5 {
            spans.push(tracer.start_span(&format!("op{}", i), None).await);
        }

        assert_eq!(tracer.active_span_count(), 3);
        assert_eq!(sink.open_spans(), 3);
        assert!(matches!(
            tracer.end_span(&spans[0]).await,
            Err(PipelineError::SpanNotFound(_))
        ));
        assert!(tracer.end_span(&spans[4]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_error_marks_latency() {
        let (tracer, _, _) = tracer(1.0, 10);
        let span = tracer.start_span("payment", None).await;
        tracer.record_error(&span, "card declined").unwrap();

        let stored = tracer.span(span.id().unwrap()).unwrap();
        assert_eq!(
            stored.attributes.get("error.message"),
            Some(&AttributeValue::from("card declined"))
        );

        let latency = tracer.end_span(&span).await.unwrap().unwrap();
        assert_eq!(latency.labels["error"], "true");
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_span() {
        let (tracer, _, sink) = tracer(1.0, 10);
        sink.set_failing(true);

        let span = tracer.start_span("export", None).await;
        assert!(span.is_sampled());
        assert_eq!(tracer.active_span_count(), 1);
        assert!(tracer.end_span(&span).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ending_twice_is_an_error() {
        let (tracer, _, _) = tracer(1.0, 10);
        let span = tracer.start_span("op", None).await;
        tracer.end_span(&span).await.unwrap();
        assert!(tracer.end_span(&span).await.is_err());
    }

    #[test]
    fn test_sampling_rate_is_clamped() {
        let (tracer, _, _) = tracer(0.5, 10);
        tracer.set_sampling_rate(2.0);
        assert_eq!(tracer.sampling_rate(), 1.0);
        tracer.set_sampling_rate(-1.0);
        assert_eq!(tracer.sampling_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_sampling_fraction() {
        let (tracer, _, _) = tracer(0.25, 100_000);
        let mut sampled = 0;
        for _ in 0..20_000 {
            let span = tracer.start_span("op", None).await;
            if span.is_sampled() {
                sampled += 1;
                tracer.end_span(&span).await.unwrap();
            }
        }
        assert!((sampled as f64 - 5_000.0).abs() < 500.0, "sampled {}", sampled);
    }
}
