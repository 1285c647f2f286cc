//! Retry logic.
//!
//! # Responsibilities
//! - Execute an async operation, retrying failures with exponential backoff + jitter
//! - Bound the number of attempts and the per-attempt delay
//! - Surface one `RetryExhausted` error carrying the last failure

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Retry-with-backoff wrapper shared by every component that talks to the sink.
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryHandler {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Total attempts an always-failing operation receives.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    pub async fn with_retry<T, E, F, Fut>(&self, context: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<PipelineError>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err: PipelineError = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };

            if attempt >= self.max_retries || !err.is_transient() {
                return Err(PipelineError::RetryExhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms);
            tracing::warn!(
                context = context,
                attempt = attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Operation failed, retrying"
            );
            metrics::record_retry(context);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn handler(max_retries: u32) -> RetryHandler {
        RetryHandler::new(&RetryConfig {
            max_retries,
            base_delay_ms: 10,
            max_delay_ms: 50,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_operation_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = handler(3)
            .with_retry("flush", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SinkError::Unavailable("down".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(PipelineError::RetryExhausted { context, attempts, source }) => {
                assert_eq!(context, "flush");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, PipelineError::Sink(SinkError::Unavailable(_))));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = handler(3)
            .with_retry("export", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SinkError::Unavailable("flaky".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_payload_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = handler(5)
            .with_retry("export", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SinkError::Rejected("schema".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PipelineError::RetryExhausted { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_are_capped() {
        let start = tokio::time::Instant::now();
        let _: Result<()> = handler(4)
            .with_retry("slow", || async { Err(SinkError::Unavailable("down".into())) })
            .await;

        // 3 sleeps, each capped at 50ms
        assert!(start.elapsed() <= Duration::from_millis(150));
    }
}
