//! Process resource sampling for progress reports.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Samples the resident memory of the current process.
pub struct ResourceSampler {
    system: System,
    pid: Pid,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    /// Resident memory in bytes, or 0 if the process could not be read.
    pub fn resident_bytes(&mut self) -> u64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or(0)
    }

    /// Resident memory in MiB, rounded to one decimal.
    pub fn resident_mb(&mut self) -> f64 {
        let mb = self.resident_bytes() as f64 / 1_048_576.0;
        (mb * 10.0).round() / 10.0
    }
}
