//! Process resource sampling
//!
//! Wraps OS queries into normalized CPU-percent, memory and thread-count
//! readings. CPU is computed as a delta between cumulative counters captured
//! on consecutive calls; the sampler retains the previous raw counters
//! internally. Sampling degrades silently: any probe failure falls back to
//! the last successfully observed value and is never surfaced to the caller.

use anyhow::{bail, Context, Result};
use sysinfo::{Pid, System};
use tracing::debug;

use crate::models::ResourceReading;

/// Cumulative CPU time counters, in kernel ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    /// Ticks spent idle (including iowait)
    pub idle: u64,
    /// Total ticks across all states
    pub total: u64,
}

#[cfg(target_os = "linux")]
impl CpuCounters {
    /// Parse the aggregate "cpu" line of /proc/stat.
    /// Format: "cpu  user nice system idle iowait irq softirq steal"
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        if parts.next()? != "cpu" {
            return None;
        }
        let fields: Vec<u64> = parts.take(8).filter_map(|p| p.parse().ok()).collect();
        if fields.len() < 4 {
            return None;
        }
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total: u64 = fields.iter().sum();
        Some(Self { idle, total })
    }
}

/// Trait for OS-level resource probes
pub trait ResourceProbe: Send {
    /// Cumulative CPU counters since boot
    fn cpu_counters(&mut self) -> Result<CpuCounters>;

    /// Resident set size of the current process, in bytes
    fn memory_bytes(&mut self) -> Result<u64>;

    /// Number of threads in the current process
    fn thread_count(&mut self) -> Result<usize>;
}

/// Default probe backed by sysinfo and the proc pseudo-filesystem
pub struct SystemProbe {
    system: System,
    pid: Option<Pid>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    #[cfg(target_os = "linux")]
    fn cpu_counters(&mut self) -> Result<CpuCounters> {
        let stat = std::fs::read_to_string("/proc/stat").context("failed to read /proc/stat")?;
        stat.lines()
            .next()
            .and_then(CpuCounters::parse)
            .context("no aggregate cpu line in /proc/stat")
    }

    #[cfg(not(target_os = "linux"))]
    fn cpu_counters(&mut self) -> Result<CpuCounters> {
        bail!("cumulative cpu counters unavailable on this platform")
    }

    fn memory_bytes(&mut self) -> Result<u64> {
        let pid = self.pid.context("current pid unavailable")?;
        if !self.system.refresh_process(pid) {
            bail!("process {pid} not found");
        }
        let process = self
            .system
            .process(pid)
            .context("process disappeared during refresh")?;
        Ok(process.memory())
    }

    #[cfg(target_os = "linux")]
    fn thread_count(&mut self) -> Result<usize> {
        let status =
            std::fs::read_to_string("/proc/self/status").context("failed to read proc status")?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("Threads:") {
                return rest
                    .trim()
                    .parse()
                    .context("unparseable Threads field in proc status");
            }
        }
        bail!("no Threads field in proc status")
    }

    #[cfg(not(target_os = "linux"))]
    fn thread_count(&mut self) -> Result<usize> {
        bail!("thread count unavailable on this platform")
    }
}

/// Stateful sampler that normalizes probe output into [`ResourceReading`]s
pub struct ResourceSampler {
    probe: Box<dyn ResourceProbe>,
    prev_counters: Option<CpuCounters>,
    last: ResourceReading,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::with_probe(Box::new(SystemProbe::new()))
    }

    pub fn with_probe(probe: Box<dyn ResourceProbe>) -> Self {
        Self {
            probe,
            prev_counters: None,
            last: ResourceReading::default(),
        }
    }

    /// Take a fresh reading.
    ///
    /// CPU percent is `100 * (1 - idle_delta / total_delta)` over the
    /// interval since the previous call. The first call has no prior
    /// counters and reports the last-known value (0 if none) instead of a
    /// meaningless spike. Any probe failure keeps the previous value.
    pub fn sample(&mut self) -> ResourceReading {
        match self.probe.cpu_counters() {
            Ok(current) => {
                if let Some(prev) = self.prev_counters {
                    let total_delta = current.total.saturating_sub(prev.total);
                    let idle_delta = current.idle.saturating_sub(prev.idle);
                    if total_delta > 0 {
                        let busy = 100.0 * (1.0 - idle_delta as f64 / total_delta as f64);
                        self.last.cpu_percent = busy.clamp(0.0, 100.0);
                    }
                }
                self.prev_counters = Some(current);
            }
            Err(e) => {
                debug!(error = %e, "cpu counters unavailable, keeping last reading");
            }
        }

        match self.probe.memory_bytes() {
            Ok(bytes) => self.last.memory_bytes = bytes,
            Err(e) => {
                debug!(error = %e, "memory query unavailable, keeping last reading");
            }
        }

        match self.probe.thread_count() {
            Ok(count) => self.last.thread_count = count,
            Err(e) => {
                debug!(error = %e, "thread count unavailable, keeping last reading");
            }
        }

        self.last
    }

    /// Last reading without touching the probe
    pub fn last_reading(&self) -> ResourceReading {
        self.last
    }

    /// Drop retained counters and the cached reading
    pub fn reset(&mut self) {
        self.prev_counters = None;
        self.last = ResourceReading::default();
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}
