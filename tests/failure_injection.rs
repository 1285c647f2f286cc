//! Sink failure handling across the pipeline.

use telemetry_pipeline::model::HealthStatus;
use telemetry_pipeline::Ingest;

mod common;
use common::{harness, harness_with, metric};

#[tokio::test]
async fn test_transient_sink_failures_are_retried() {
    let h = harness();
    for i in 0..3 {
        h.facade.record_metric(metric("payments", i as f64)).await;
    }

    h.sink.fail_next(2);
    h.facade.flush().await;

    assert_eq!(h.sink.metrics_named("payments").len(), 3);
    assert_eq!(h.sink.batch_count(), 1);
    assert_eq!(h.sink.call_count(), 3);
}

#[tokio::test]
async fn test_exhausted_batch_is_dropped_and_pipeline_recovers() {
    let h = harness();
    h.facade.record_metric(metric("searches", 1.0)).await;

    h.sink.set_failing(true);
    h.facade.flush().await;
    assert!(h.sink.metrics().is_empty());
    assert_eq!(h.facade.stats().buffered_metrics, 0);

    h.sink.set_failing(false);
    assert_eq!(h.facade.record_metric(metric("searches", 2.0)).await, Ingest::Accepted);
    h.facade.flush().await;

    let delivered = h.sink.metrics_named("searches");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].value, 2.0);
}

#[tokio::test]
async fn test_errors_correlate_while_sink_is_down() {
    let h = harness();
    h.sink.set_failing(true);

    for _ in 0..5 {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write failed");
        h.facade.record_error(&err, None).await;
    }

    assert!(h.sink.errors().is_empty());
    assert!(h.sink.health_checks().is_empty());
    assert_eq!(h.facade.stats().logged_alerts, 6);
}

#[tokio::test]
async fn test_tracing_survives_sink_span_failures() {
    let h = harness();
    h.sink.set_failing(true);

    let span = h.facade.start_operation("render").await;
    assert!(span.is_sampled());
    assert_eq!(h.facade.stats().active_spans, 1);
    h.clock.advance(40);
    h.facade.end_operation(&span).await;
    assert_eq!(h.facade.stats().active_spans, 0);

    h.sink.set_failing(false);
    h.facade.flush().await;
    assert_eq!(h.sink.metrics_named("render_latency")[0].value, 40.0);
    assert_eq!(h.sink.open_spans(), 0);
}

#[tokio::test]
async fn test_health_export_retries() {
    let h = harness();
    h.sink.fail_next(1);
    h.facade
        .record_health("checkout", HealthStatus::Unhealthy, "database unreachable")
        .await;

    let checks = h.sink.health_checks();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].component, "checkout");
    assert_eq!(checks[0].timestamp, common::START_MS);
}

#[tokio::test]
async fn test_shutdown_with_failing_sink_completes() {
    let mut config = common::config();
    config.retry.max_retries = 2;
    let h = harness_with(config);
    h.facade.start().await;
    h.facade.record_metric(metric("bookings", 1.0)).await;

    h.sink.set_failing(true);
    h.facade.shutdown().await;

    assert!(h.sink.metrics().is_empty());
    assert!(h.sink.is_shut_down());
}
