//! Process resource usage
//!
//! CPU is sampled once per reload, so the reported percentage covers the
//! interval between the two most recent reloads. Memory is read on demand.
//!
//! sysinfo reads `/proc` synchronously; async callers go through the
//! `*_blocking` wrappers, which hop onto the blocking pool.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, System};

/// Memory held by this process, in bytes
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryUsage {
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_memory: u64,
}

/// CPU accounting for this process
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CpuUsage {
    pub cpu_percent: f32,
    pub run_time_secs: u64,
}

/// Samples this process's usage through sysinfo
pub struct UsageSampler {
    pid: Option<Pid>,
    /// Refreshed only by `sample`, so CPU deltas span reload to reload
    cpu_system: Mutex<System>,
    /// Refreshed on every status read
    memory_system: Mutex<System>,
    last_cpu_percent: Mutex<f32>,
}

impl UsageSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Process usage unavailable on this platform");
                None
            }
        };

        Self {
            pid,
            cpu_system: Mutex::new(System::new()),
            memory_system: Mutex::new(System::new()),
            last_cpu_percent: Mutex::new(0.0),
        }
    }

    /// Refresh process counters and record the CPU percentage since the
    /// previous sample
    pub fn sample(&self) {
        let Some(pid) = self.pid else { return };
        let Ok(mut system) = self.cpu_system.lock() else { return };

        if !system.refresh_process(pid) {
            return;
        }
        if let Some(process) = system.process(pid) {
            if let Ok(mut last) = self.last_cpu_percent.lock() {
                *last = process.cpu_usage();
            }
        }
    }

    /// CPU percentage recorded at the last sample
    pub fn cpu_percent(&self) -> f32 {
        self.last_cpu_percent.lock().map(|v| *v).unwrap_or(0.0)
    }

    /// Current memory plus CPU accounting
    pub fn current(&self) -> (MemoryUsage, CpuUsage) {
        let cpu_percent = self.cpu_percent();
        let Some(pid) = self.pid else {
            return (MemoryUsage::default(), CpuUsage::default());
        };
        let Ok(mut system) = self.memory_system.lock() else {
            return (MemoryUsage::default(), CpuUsage::default());
        };

        system.refresh_process(pid);
        match system.process(pid) {
            Some(process) => (
                MemoryUsage {
                    rss: process.memory(),
                    virtual_memory: process.virtual_memory(),
                },
                CpuUsage {
                    cpu_percent,
                    run_time_secs: process.run_time(),
                },
            ),
            None => (MemoryUsage::default(), CpuUsage::default()),
        }
    }

    /// `sample` on the blocking pool
    pub async fn sample_blocking(self: Arc<Self>) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.sample()).await {
            tracing::warn!(error = %e, "Usage sample task failed");
        }
    }

    /// `current` on the blocking pool
    pub async fn current_blocking(self: Arc<Self>) -> (MemoryUsage, CpuUsage) {
        tokio::task::spawn_blocking(move || self.current())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Usage read task failed");
                (MemoryUsage::default(), CpuUsage::default())
            })
    }
}

impl Default for UsageSampler {
    fn default() -> Self {
        Self::new()
    }
}
