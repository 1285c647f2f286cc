//! Shared harness for pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use telemetry_pipeline::config::{PipelineConfig, RetryConfig};
use telemetry_pipeline::lifecycle::ManualClock;
use telemetry_pipeline::model::Metric;
use telemetry_pipeline::{MemorySink, MonitoringFacade};

pub const START_MS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub facade: Arc<MonitoringFacade>,
    pub sink: Arc<MemorySink>,
    pub clock: Arc<ManualClock>,
}

/// Deterministic defaults: keep every metric, trace every span, retry fast.
pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.buffer.sampling_rate = 1.0;
    config.tracing.sampling_rate = 1.0;
    config.retry = RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: PipelineConfig) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(ManualClock::new(START_MS));
    let facade = Arc::new(MonitoringFacade::new(config, sink.clone(), clock.clone()));
    Harness {
        facade,
        sink,
        clock,
    }
}

pub fn metric(name: &str, value: f64) -> Metric {
    Metric::new(name, value, START_MS)
}
