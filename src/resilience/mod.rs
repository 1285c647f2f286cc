//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Component hands data to the sink:
//!     → retries.rs (RetryHandler::with_retry wraps the sink call)
//!     → On transient failure: backoff.rs (exponential delay + jitter, capped)
//!     → On exhaustion: RetryExhausted carrying the last failure
//! ```
//!
//! # Design Decisions
//! - Only the sink hand-off is retried, never the state mutation before it
//! - Attempts never exceed `max_retries`; delays never exceed `max_delay`
//! - Non-transient failures (rejected payloads) stop retrying immediately
//! - The final failure is always returned to the caller, which logs it

pub mod backoff;
pub mod retries;

pub use retries::RetryHandler;
