//! Probabilistic admission control.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LoadSheddingConfig;
use crate::lifecycle::Clock;
use crate::load_shedding::probe::ResourceProbe;
use crate::load_shedding::{LoadThresholds, ResourceUpdate, ResourceUsage};
use crate::model::{HealthCheck, HealthStatus};
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;

const COMPONENT: &str = "load_shedder";
const MAX_REJECT_PROBABILITY: f64 = 0.9;

#[derive(Debug, Default)]
struct ShedState {
    usage: ResourceUsage,
    shedding: bool,
    reject_probability: f64,
}

/// Admission request counter used to derive a request rate between polls.
#[derive(Debug)]
struct RequestCounter {
    count: AtomicU64,
    since_ms: AtomicU64,
}

#[derive(Debug)]
pub struct LoadShedder {
    thresholds: LoadThresholds,
    enabled: AtomicBool,
    state: Mutex<ShedState>,
    requests: RequestCounter,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn Sink>,
    retry: RetryHandler,
}

impl LoadShedder {
    pub fn new(
        config: &LoadSheddingConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn Sink>,
        retry: RetryHandler,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            thresholds: config.thresholds,
            enabled: AtomicBool::new(config.enabled),
            state: Mutex::new(ShedState::default()),
            requests: RequestCounter {
                count: AtomicU64::new(0),
                since_ms: AtomicU64::new(now),
            },
            clock,
            sink,
            retry,
        }
    }

    /// Admission decision for one request. Never blocks.
    pub fn should_process_request(&self) -> bool {
        self.requests.count.fetch_add(1, Ordering::Relaxed);

        if !self.enabled.load(Ordering::Relaxed) {
            return true;
        }

        let reject_probability = {
            let state = self.state.lock();
            if !state.shedding {
                return true;
            }
            state.reject_probability
        };

        let admitted = fastrand::f64() >= reject_probability;
        if !admitted {
            metrics::record_shed();
        }
        admitted
    }

    /// Merge `update` into the current usage and re-evaluate shedding.
    ///
    /// Returns whether shedding is active afterwards.
    pub async fn update_resource_usage(&self, update: ResourceUpdate) -> bool {
        let transition = {
            let mut state = self.state.lock();
            state.usage.apply(update);

            let should_shed = self.should_activate(&state.usage);
            state.reject_probability = if should_shed {
                reject_probability(&state.usage, &self.thresholds)
            } else {
                0.0
            };

            let changed = should_shed != state.shedding;
            state.shedding = should_shed;
            metrics::set_shedding(state.shedding, state.reject_probability);

            changed.then_some((should_shed, state.usage, state.reject_probability))
        };

        let Some((shedding, usage, probability)) = transition else {
            return self.is_shedding();
        };

        if shedding {
            tracing::warn!(
                cpu = usage.cpu,
                memory = usage.memory,
                request_rate = usage.request_rate,
                reject_probability = probability,
                "Load shedding activated"
            );
        } else {
            tracing::info!(
                cpu = usage.cpu,
                memory = usage.memory,
                request_rate = usage.request_rate,
                "Load shedding deactivated"
            );
        }
        self.emit_transition(shedding, usage, probability).await;
        shedding
    }

    /// Sample `probe`, filling in the request rate from admissions since the last sample.
    pub fn sample(&self, probe: &dyn ResourceProbe) -> ResourceUpdate {
        let mut update = probe.sample();
        let measured = self.take_request_rate();
        if update.request_rate.is_none() {
            update.request_rate = Some(measured);
        }
        tracing::trace!(?update, "Resource usage sampled");
        update
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        tracing::info!("Load shedding enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        tracing::info!("Load shedding disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn is_shedding(&self) -> bool {
        self.state.lock().shedding
    }

    pub fn reject_probability(&self) -> f64 {
        self.state.lock().reject_probability
    }

    pub fn usage(&self) -> ResourceUsage {
        self.state.lock().usage
    }

    pub fn thresholds(&self) -> LoadThresholds {
        self.thresholds
    }

    fn should_activate(&self, usage: &ResourceUsage) -> bool {
        usage.cpu > self.thresholds.cpu
            || usage.memory > self.thresholds.memory
            || usage.request_rate > self.thresholds.request_rate
    }

    /// Requests per second since the previous call.
    fn take_request_rate(&self) -> f64 {
        let now = self.clock.now_ms();
        let since = self.requests.since_ms.swap(now, Ordering::Relaxed);
        let count = self.requests.count.swap(0, Ordering::Relaxed);

        let elapsed_ms = now.saturating_sub(since);
        if elapsed_ms == 0 {
            return 0.0;
        }
        count as f64 * 1000.0 / elapsed_ms as f64
    }

    async fn emit_transition(&self, shedding: bool, usage: ResourceUsage, probability: f64) {
        let (status, message) = if shedding {
            (HealthStatus::Degraded, "Load shedding activated")
        } else {
            (HealthStatus::Healthy, "Load shedding deactivated")
        };

        let check = HealthCheck::new(COMPONENT, status, message, self.clock.now_ms())
            .with_detail("cpu", usage.cpu)
            .with_detail("memory", usage.memory)
            .with_detail("request_rate", usage.request_rate)
            .with_detail("reject_probability", probability);

        let sink = &self.sink;
        let check = &check;
        if let Err(e) = self
            .retry
            .with_retry("load shedding health", move || sink.record_health_check(check))
            .await
        {
            tracing::error!(error = %e, "Dropping load shedding health signal");
            metrics::record_dropped("health", 1);
        }
    }
}

/// Weighted excess over each threshold, capped at 0.9.
pub fn reject_probability(usage: &ResourceUsage, thresholds: &LoadThresholds) -> f64 {
    let cpu_excess = ((usage.cpu - thresholds.cpu) / 100.0).max(0.0);
    let memory_excess = ((usage.memory - thresholds.memory) / 100.0).max(0.0);
    let rate_excess = if thresholds.request_rate > 0.0 {
        ((usage.request_rate - thresholds.request_rate) / thresholds.request_rate).max(0.0)
    } else {
        0.0
    };

    (0.4 * cpu_excess + 0.3 * memory_excess + 0.3 * rate_excess).min(MAX_REJECT_PROBABILITY)
}
