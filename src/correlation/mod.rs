//! Alert correlation subsystem.
//!
//! # Data Flow
//! ```text
//! raw alert / error report / anomaly
//!     → AlertCorrelator::process_alert
//!     → bounded, time-ordered alert log (FIFO beyond max_alerts)
//!     → every rule: all conditions met within its window?
//!         yes ─▶ contributing alerts marked consumed for that rule
//!             ─▶ synthetic `correlation` alert (severity high)
//!             ─▶ degraded health → Sink
//!             ─▶ fed back into process_alert
//!
//! prune() (periodic): drop alerts older than max_alert_age
//! ```
//!
//! # Design Decisions
//! - Conditions are conjunctive; each needs `threshold` matching alerts
//! - An alert is counted at most once per rule, so a burst fires a rule once
//! - Feedback is an explicit work queue with a depth limit, not recursion

pub mod correlator;
pub mod rules;

pub use correlator::AlertCorrelator;
pub use rules::{default_rules, CorrelationRule, RuleCondition};
