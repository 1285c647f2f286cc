//! Periodic job scheduler.
//!
//! # Responsibilities
//! - Run each background sweep (flush, cleanup, polling) on its own interval
//! - Stop every job on shutdown and wait for it to finish
//!
//! # Design Decisions
//! - The first tick fires one full period after registration, not immediately
//! - Missed ticks are delayed rather than bursted
//! - A job in progress is allowed to complete before its loop exits

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::shutdown::Shutdown;

/// `tokio::time::interval` rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owns every periodic background task.
#[derive(Debug, Default)]
pub struct Scheduler {
    shutdown: Shutdown,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period` until shutdown.
    pub fn every<F, Fut>(&self, name: &str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let shutdown = self.shutdown.clone();
        let job_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(job = %job_name, period_ms = period.as_millis() as u64, "Periodic job started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        job().await;
                    }
                    _ = shutdown.wait() => {
                        tracing::debug!(job = %job_name, "Periodic job received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });

        self.tasks.lock().push((name.to_string(), handle));
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Signal every job to stop and wait for all of them.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for (name, handle) in tasks {
            if let Err(e) = handle.await {
                tracing::error!(job = %name, error = %e, "Periodic job terminated abnormally");
            }
        }
    }
}
