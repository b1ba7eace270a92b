//! Host CPU and memory snapshots
//!
//! CPU usage is derived from two `/proc/stat` tick snapshots taken a few seconds
//! apart; memory comes from `sysinfo` and is reported in kB.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sysinfo::System;

/// Aggregate CPU tick counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub idle: u64,
    pub total: u64,
}

impl CpuTicks {
    /// Parse the aggregate `cpu` line of `/proc/stat`
    ///
    /// Format: `cpu  user nice system idle iowait irq softirq steal ...`.
    /// Every column is summed into `total`; the fourth value is `idle`.
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))?;

        let mut ticks = CpuTicks::default();
        for (index, field) in line.split_whitespace().skip(1).enumerate() {
            let value = field.parse::<u64>().ok()?;
            ticks.total = ticks.total.saturating_add(value);
            if index == 3 {
                ticks.idle = value;
            }
        }

        Some(ticks)
    }
}

/// Memory counters in kB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemorySnapshot {
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }
}

/// Paired snapshots of one sampling cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSample {
    pub before: CpuTicks,
    pub after: CpuTicks,
    pub memory: MemorySnapshot,
}

impl SystemSample {
    pub fn cpu_usage_percent(&self) -> f64 {
        cpu_usage_percent(self.before, self.after)
    }

    pub fn used_memory_kb(&self) -> u64 {
        self.memory.used_kb()
    }
}

/// `100 * (totalDelta - idleDelta) / totalDelta`, or 0 when no ticks elapsed
pub fn cpu_usage_percent(before: CpuTicks, after: CpuTicks) -> f64 {
    let total_delta = after.total.saturating_sub(before.total);
    let idle_delta = after.idle.saturating_sub(before.idle).min(total_delta);

    if total_delta == 0 {
        return 0.0;
    }

    100.0 * (total_delta - idle_delta) as f64 / total_delta as f64
}

/// Source of host snapshots
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn cpu_ticks(&self) -> Result<CpuTicks>;

    async fn memory(&self) -> Result<MemorySnapshot>;
}

/// [`SystemProbe`] reading the local host
#[derive(Debug, Clone, Default)]
pub struct HostProbe;

#[async_trait]
impl SystemProbe for HostProbe {
    async fn cpu_ticks(&self) -> Result<CpuTicks> {
        let stat = tokio::fs::read_to_string("/proc/stat")
            .await
            .context("failed to read /proc/stat")?;
        CpuTicks::parse(&stat).context("no aggregate cpu line in /proc/stat")
    }

    async fn memory(&self) -> Result<MemorySnapshot> {
        let mut sys = System::new();
        sys.refresh_memory();

        Ok(MemorySnapshot {
            total_kb: sys.total_memory() / 1024,
            available_kb: sys.available_memory() / 1024,
        })
    }
}
