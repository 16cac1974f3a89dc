//! Resource usage measurement.
//!
//! Memory is sampled process-wide (resident set size), so a sample is the
//! change in RSS across one invocation, not an exact attribution: the idle
//! server, concurrent connections and allocator behavior all share it.

/// Source of a process memory reading, in bytes.
pub trait MemoryProbe: Send + Sync + 'static {
    /// Current reading. Returns 0 when unavailable.
    fn sample(&self) -> u64;
}

/// Reads resident set size from `/proc/self/status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RssProbe;

impl MemoryProbe for RssProbe {
    fn sample(&self) -> u64 {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_vm_rss(&status))
            .unwrap_or(0)
    }
}

/// Extract `VmRSS` (reported in kB) as bytes.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb * 1024)
}

/// Memory baseline taken before an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageBaseline(u64);

impl UsageBaseline {
    /// Take a baseline reading.
    pub fn take(probe: &dyn MemoryProbe) -> Self {
        Self(probe.sample())
    }

    /// Non-negative growth since the baseline.
    pub fn finish(self, probe: &dyn MemoryProbe) -> u64 {
        usage_delta(self.0, probe.sample())
    }
}

/// `max(0, after - before)`.
#[inline]
pub fn usage_delta(before: u64, after: u64) -> u64 {
    after.saturating_sub(before)
}
