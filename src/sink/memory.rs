//! In-memory sink with programmable failures.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{ErrorReport, HealthCheck, Metric, SpanHandle};
use crate::sink::{Sink, SinkError, SinkResult};

/// Captures everything it receives.
///
/// Used by tests and by embedders that want to inspect the exported stream.
#[derive(Debug, Default)]
pub struct MemorySink {
    metrics: Mutex<Vec<Metric>>,
    health_checks: Mutex<Vec<HealthCheck>>,
    errors: Mutex<Vec<ErrorReport>>,
    open_spans: Mutex<Vec<SpanHandle>>,
    ended_spans: Mutex<Vec<SpanHandle>>,
    batches: AtomicU64,
    next_span: AtomicU64,
    calls: AtomicU64,
    fail_next: AtomicU32,
    fail_always: AtomicBool,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls with `SinkError::Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every call until reset.
    pub fn set_failing(&self, failing: bool) {
        self.fail_always.store(failing, Ordering::SeqCst);
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    pub fn metrics_named(&self, name: &str) -> Vec<Metric> {
        self.metrics
            .lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn health_checks(&self) -> Vec<HealthCheck> {
        self.health_checks.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().clone()
    }

    pub fn open_spans(&self) -> usize {
        self.open_spans.lock().len()
    }

    pub fn ended_spans(&self) -> usize {
        self.ended_spans.lock().len()
    }

    /// Number of `record_metrics` batches received.
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Total calls made, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn check(&self) -> SinkResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("injected failure".into()));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(SinkError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn initialize(&self) -> SinkResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn record_metric(&self, metric: &Metric) -> SinkResult<()> {
        self.check()?;
        self.metrics.lock().push(metric.clone());
        Ok(())
    }

    async fn record_metrics(&self, metrics: &[Metric]) -> SinkResult<()> {
        self.check()?;
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.metrics.lock().extend_from_slice(metrics);
        Ok(())
    }

    async fn record_health_check(&self, check: &HealthCheck) -> SinkResult<()> {
        self.check()?;
        self.health_checks.lock().push(check.clone());
        Ok(())
    }

    async fn record_error(&self, error: &ErrorReport) -> SinkResult<()> {
        self.check()?;
        self.errors.lock().push(error.clone());
        Ok(())
    }

    async fn start_span(&self, _name: &str) -> SinkResult<SpanHandle> {
        self.check()?;
        let handle = SpanHandle(self.next_span.fetch_add(1, Ordering::SeqCst).to_string());
        self.open_spans.lock().push(handle.clone());
        Ok(handle)
    }

    async fn end_span(&self, handle: &SpanHandle) -> SinkResult<()> {
        self.check()?;
        self.open_spans.lock().retain(|h| h != handle);
        self.ended_spans.lock().push(handle.clone());
        Ok(())
    }

    async fn shutdown(&self) -> SinkResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let sink = MemorySink::new();
        sink.fail_next(2);

        let m = Metric::new("x", 1.0, 0);
        assert!(sink.record_metric(&m).await.is_err());
        assert!(sink.record_metric(&m).await.is_err());
        assert!(sink.record_metric(&m).await.is_ok());

        assert_eq!(sink.metrics().len(), 1);
        assert_eq!(sink.call_count(), 3);
    }

    #[tokio::test]
    async fn test_span_bookkeeping() {
        let sink = MemorySink::new();
        let handle = sink.start_span("op").await.unwrap();
        assert_eq!(sink.open_spans(), 1);

        sink.end_span(&handle).await.unwrap();
        assert_eq!(sink.open_spans(), 0);
        assert_eq!(sink.ended_spans(), 1);
    }
}
