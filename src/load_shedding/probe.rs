//! Resource usage sources.

use std::fmt::Debug;

use parking_lot::Mutex;
use sysinfo::System;

use crate::load_shedding::ResourceUpdate;

/// Samples current resource usage.
pub trait ResourceProbe: Send + Sync + Debug {
    fn sample(&self) -> ResourceUpdate;
}

/// Host CPU and memory via `sysinfo`. Leaves request rate to the shedder.
#[derive(Debug)]
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    fn sample(&self) -> ResourceUpdate {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        let cpu = system.global_cpu_info().cpu_usage() as f64;
        let cpu = cpu.is_finite().then_some(cpu);
        let total = system.total_memory();
        let memory = if total > 0 {
            Some(system.used_memory() as f64 / total as f64 * 100.0)
        } else {
            None
        };

        ResourceUpdate {
            cpu,
            memory,
            request_rate: None,
        }
    }
}
