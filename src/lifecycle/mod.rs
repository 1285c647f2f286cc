//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduling (scheduler.rs):
//!     every(name, period, job) → tokio interval loop per job
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every job loop exits → Scheduler::shutdown() joins them
//!     → facade drains buffers and windows → sink shutdown
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Time (clock.rs):
//!     Clock::now_ms() → window boundaries, alert ages, span durations
//! ```
//!
//! # Design Decisions
//! - One scheduler owned by the composition root; components never spawn timers
//! - Wall-clock time is injected so tests can move it by hand
//! - Periodic jobs run on tokio time, so paused-clock tests drive them too

pub mod clock;
pub mod scheduler;
pub mod shutdown;
pub mod signals;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::Scheduler;
pub use shutdown::Shutdown;
