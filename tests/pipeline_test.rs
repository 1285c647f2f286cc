//! End-to-end behaviour of the monitoring facade.

use std::time::Duration;

use futures_util::future::join_all;

use telemetry_pipeline::aggregation::AggregationType;
use telemetry_pipeline::load_shedding::ResourceUpdate;
use telemetry_pipeline::model::{Alert, AlertSeverity, HealthStatus, Metric};
use telemetry_pipeline::Ingest;

mod common;
use common::{harness, harness_with, metric};

#[tokio::test]
async fn test_shutdown_delivers_unflushed_metrics() {
    let h = harness();
    h.facade.start().await;
    assert!(h.sink.is_initialized());

    for i in 0..5 {
        let ingest = h
            .facade
            .record_metric(metric("bookings", i as f64).with_label("route", "/book"))
            .await;
        assert_eq!(ingest, Ingest::Accepted);
    }
    assert_eq!(h.facade.stats().buffered_metrics, 5);
    assert!(h.sink.metrics_named("bookings").is_empty());

    h.facade.shutdown().await;
    assert_eq!(h.sink.metrics_named("bookings").len(), 5);
    assert!(h.sink.is_shut_down());

    // Second shutdown is a no-op
    h.facade.shutdown().await;
    assert_eq!(h.sink.metrics_named("bookings").len(), 5);
}

#[tokio::test]
async fn test_invalid_metrics_are_rejected() {
    let h = harness();
    assert_eq!(h.facade.record_metric(metric("", 1.0)).await, Ingest::Rejected);
    assert_eq!(
        h.facade.record_metric(metric("latency", f64::NAN)).await,
        Ingest::Rejected
    );
    assert_eq!(h.facade.stats().buffered_metrics, 0);
}

#[tokio::test]
async fn test_overload_sheds_most_metrics() {
    let h = harness();
    h.facade
        .record_resource_usage(ResourceUpdate {
            cpu: Some(100.0),
            memory: Some(100.0),
            request_rate: Some(100_000.0),
        })
        .await;

    let stats = h.facade.stats();
    assert!(stats.shedding);
    assert_eq!(stats.reject_probability, 0.9);

    let mut shed = 0;
    for i in 0..2_000 {
        if h.facade.record_metric(metric("requests", i as f64)).await == Ingest::Shed {
            shed += 1;
        }
    }
    assert!((shed as f64 - 1_800.0).abs() < 150.0, "shed {}", shed);

    let checks = h.sink.health_checks();
    assert!(checks
        .iter()
        .any(|c| c.component == "load_shedder" && c.status == HealthStatus::Degraded));
}

#[tokio::test]
async fn test_disabled_shedding_accepts_under_load() {
    let h = harness();
    h.facade.disable_load_shedding();
    h.facade
        .record_resource_usage(ResourceUpdate {
            cpu: Some(100.0),
            ..Default::default()
        })
        .await;

    for i in 0..200 {
        assert_eq!(
            h.facade.record_metric(metric("requests", i as f64)).await,
            Ingest::Accepted
        );
    }
}

#[tokio::test]
async fn test_resource_usage_is_exported_as_metrics() {
    let h = harness();
    h.facade
        .record_resource_usage(ResourceUpdate {
            cpu: Some(42.0),
            memory: Some(61.5),
            request_rate: None,
        })
        .await;
    h.facade.flush().await;

    let cpu = h.sink.metrics_named("cpu_usage");
    assert_eq!(cpu.len(), 1);
    assert_eq!(cpu[0].value, 42.0);
    assert_eq!(cpu[0].labels["source"], "load_shedder");
    assert_eq!(cpu[0].unit.as_deref(), Some("percent"));
    assert_eq!(h.sink.metrics_named("memory_usage")[0].value, 61.5);
    assert!(h.sink.metrics_named("request_rate").is_empty());
}

#[tokio::test]
async fn test_non_finite_resource_usage_is_ignored() {
    let h = harness();
    let cpu = |value| ResourceUpdate {
        cpu: Some(value),
        ..Default::default()
    };

    for _ in 0..40 {
        h.facade.record_resource_usage(cpu(50.0)).await;
    }
    h.facade.record_resource_usage(cpu(f64::NAN)).await;
    h.facade
        .record_resource_usage(ResourceUpdate {
            cpu: Some(f64::INFINITY),
            memory: Some(30.0),
            request_rate: None,
        })
        .await;
    for _ in 0..10 {
        h.facade.record_resource_usage(cpu(50.0)).await;
    }
    h.facade.flush().await;

    assert!(h.sink.metrics_named("cpu_usage_anomaly").is_empty());
    assert!(!h
        .sink
        .health_checks()
        .iter()
        .any(|c| c.component == "anomaly_detector"));

    let cpu_metrics = h.sink.metrics_named("cpu_usage");
    assert_eq!(cpu_metrics.len(), 50);
    assert!(cpu_metrics.iter().all(|m| m.value == 50.0));
    assert_eq!(h.sink.metrics_named("memory_usage")[0].value, 30.0);
    assert!(!h.facade.stats().shedding);
}

#[tokio::test]
async fn test_operation_latency_is_aggregated() {
    let h = harness();
    h.facade
        .configure_aggregation("checkout_latency", AggregationType::Max, 60_000, None);

    for duration in [120, 80, 300] {
        let span = h.facade.start_operation("checkout").await;
        h.facade.annotate_operation(&span, "items", 2i64);
        h.clock.advance(duration);
        h.facade.end_operation(&span).await;
    }
    assert_eq!(h.facade.stats().active_spans, 0);
    assert_eq!(h.sink.ended_spans(), 3);

    h.facade.flush().await;
    let aggregate = h.sink.metrics_named("checkout_latency_max");
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate[0].value, 300.0);
    assert_eq!(aggregate[0].labels["window"], "60000ms");
    assert_eq!(h.sink.metrics_named("checkout_latency").len(), 3);
}

#[tokio::test]
async fn test_child_operation_records_parent() {
    let h = harness();
    let parent = h.facade.start_operation("request").await;
    let child = h.facade.start_child_operation("db_query", &parent).await;
    h.facade.fail_operation(&child, "deadlock");
    h.facade.end_operation(&child).await;
    h.facade.end_operation(&parent).await;
    h.facade.flush().await;

    let db = h.sink.metrics_named("db_query_latency");
    assert_eq!(db.len(), 1);
    assert_eq!(db[0].labels["error"], "true");
    assert!(!h.sink.metrics_named("request_latency")[0]
        .labels
        .contains_key("error"));
}

#[tokio::test]
async fn test_repeated_errors_trigger_correlation() {
    let h = harness();
    for i in 0..5 {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, format!("refused {}", i));
        h.facade.record_error(&err, None).await;
    }

    assert_eq!(h.sink.errors().len(), 5);
    assert_eq!(h.sink.errors()[0].message, "refused 0");

    let fired: Vec<_> = h
        .sink
        .health_checks()
        .into_iter()
        .filter(|c| c.component == "alert_correlator")
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].details["rule"], "High Error Rate");

    // Five errors plus the synthetic correlation alert fed back in
    assert_eq!(h.facade.stats().logged_alerts, 6);
}

#[tokio::test]
async fn test_latency_anomalies_and_errors_correlate() {
    let h = harness();
    let latency = |v| metric("api_latency", v).with_label("service", "api_gateway");

    for _ in 0..60 {
        h.facade.record_metric(latency(10.0)).await;
    }
    assert!(h.sink.metrics_named("api_latency_anomaly").is_empty());

    for _ in 0..3 {
        h.facade.record_metric(latency(500.0)).await;
    }
    let anomalies = h.sink.metrics_named("api_latency_anomaly");
    assert_eq!(anomalies.len(), 3);
    assert_eq!(anomalies[0].labels["service"], "api_gateway");

    for _ in 0..2 {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "gateway timeout");
        h.facade.record_error(&err, None).await;
    }

    assert!(h
        .sink
        .health_checks()
        .iter()
        .any(|c| c.component == "alert_correlator" && c.details["rule"] == "Service Degradation"));
}

#[tokio::test]
async fn test_raw_alerts_are_correlated() {
    let h = harness();
    let mut correlations = Vec::new();
    for kind in ["cpu_usage", "memory_usage"] {
        for _ in 0..3 {
            let alert = Alert::new("node-1", kind, AlertSeverity::Medium, common::START_MS, "hot");
            correlations.extend(h.facade.record_alert(alert).await);
        }
    }
    assert_eq!(correlations.len(), 1);
    let context = correlations[0].context.as_ref().unwrap();
    assert_eq!(context["rule"], "System Overload");
    assert_eq!(context["alert_count"], "6");

    let invalid = Alert::new("", "cpu_usage", AlertSeverity::Low, 0, "no source");
    assert!(h.facade.record_alert(invalid).await.is_empty());
}

#[tokio::test]
async fn test_concurrent_producers() {
    let h = harness();
    let submissions = (0..50).map(|i| {
        let facade = h.facade.clone();
        async move {
            facade
                .record_metric(Metric::new("orders", i as f64, common::START_MS).with_label("shard", (i % 5).to_string()))
                .await
        }
    });

    let results = join_all(submissions).await;
    assert!(results.iter().all(|r| *r == Ingest::Accepted));

    h.facade.flush().await;
    assert_eq!(h.sink.metrics_named("orders").len(), 50);
    assert_eq!(h.facade.stats().buffered_metrics, 0);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_flush_drains_buffer() {
    let mut config = common::config();
    config.buffer.flush_interval_ms = 1_000;
    let h = harness_with(config);
    h.facade.start().await;

    h.facade.record_metric(metric("heartbeat", 1.0)).await;
    assert!(h.sink.metrics_named("heartbeat").is_empty());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.sink.metrics_named("heartbeat").len(), 1);

    h.facade.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_cleanup_emits_stale_windows() {
    let mut config = common::config();
    config.aggregation.cleanup_interval_ms = 1_000;
    let h = harness_with(config);
    h.facade
        .configure_aggregation("queue_depth", AggregationType::Avg, 500, None);
    h.facade.start().await;

    h.facade.record_metric(metric("queue_depth", 4.0)).await;
    h.facade.record_metric(metric("queue_depth", 8.0)).await;
    assert_eq!(h.facade.stats().aggregation_windows, 1);

    h.clock.advance(10_000);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(h.facade.stats().aggregation_windows, 0);
    assert_eq!(h.sink.metrics_named("queue_depth_avg")[0].value, 6.0);
    h.facade.shutdown().await;
}
