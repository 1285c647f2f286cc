//! Adaptive load shedding subsystem.
//!
//! # Data Flow
//! ```text
//! ResourceProbe → LoadShedder::sample (periodic poll) ──┐
//!                                                       ▼
//! Facade::record_resource_usage ─▶ LoadShedder::update_resource_usage
//!     → any threshold breached? → shedding on/off
//!     → transition ─▶ one health event → Sink
//!     → reject probability (capped at 0.9)
//!
//! Facade::record_metric → LoadShedder::should_process_request
//!     → not shedding or disabled: admit
//!     → shedding: admit with probability 1 - reject_probability
//! ```
//!
//! # Design Decisions
//! - Admission never blocks; it drops probabilistically
//! - Activation is disjunctive; probability grows with how far each signal is over
//! - Request rate comes from the shedder's own admission counter when the probe has none

pub mod probe;
pub mod shedder;

use serde::{Deserialize, Serialize};

pub use probe::{ResourceProbe, SystemProbe};
pub use shedder::LoadShedder;

/// A complete resource snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU utilisation percentage.
    pub cpu: f64,
    /// Memory utilisation percentage.
    pub memory: f64,
    /// Requests per second.
    pub request_rate: f64,
}

/// A partial snapshot; absent fields keep their last known value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub request_rate: Option<f64>,
}

impl ResourceUpdate {
    /// Drop fields that are NaN or infinite.
    pub fn finite(self) -> Self {
        let keep = |v: Option<f64>| v.filter(|v| v.is_finite());
        Self {
            cpu: keep(self.cpu),
            memory: keep(self.memory),
            request_rate: keep(self.request_rate),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none() && self.request_rate.is_none()
    }
}

impl ResourceUsage {
    /// Merge the finite fields of `update`.
    pub fn apply(&mut self, update: ResourceUpdate) {
        let update = update.finite();
        if let Some(cpu) = update.cpu {
            self.cpu = cpu;
        }
        if let Some(memory) = update.memory {
            self.memory = memory;
        }
        if let Some(rate) = update.request_rate {
            self.request_rate = rate;
        }
    }
}

/// Ceilings above which shedding starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadThresholds {
    pub cpu: f64,
    pub memory: f64,
    pub request_rate: f64,
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 85.0,
            request_rate: 1000.0,
        }
    }
}
