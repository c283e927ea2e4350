// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host load sampling for status updates.

use std::sync::Arc;

use parking_lot::Mutex;

/// CPU and memory utilisation, both as fractions in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadSample {
    pub cpu_load: f32,
    pub mem_use: f32,
}

/// Adapter for reading host load
pub trait LoadSampler: Clone + Send + Sync + 'static {
    fn sample(&self) -> LoadSample;
}

/// Aggregate CPU counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> =
        line.split_whitespace().skip(1).filter_map(|f| f.parse().ok()).collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes { total: fields.iter().sum(), idle })
}

/// Busy fraction between two samples.
pub fn cpu_busy(prev: CpuTimes, now: CpuTimes) -> f32 {
    let total = now.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = now.idle.saturating_sub(prev.idle);
    (total.saturating_sub(idle)) as f32 / total as f32
}

/// Used memory fraction from `/proc/meminfo`.
pub fn parse_mem_use(meminfo: &str) -> Option<f32> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    Some(1.0 - available.min(total) as f32 / total as f32)
}

/// Reads `/proc`. CPU load is measured since the previous sample.
#[derive(Debug, Clone, Default)]
pub struct ProcStatSampler {
    last: Arc<Mutex<CpuTimes>>,
}

impl ProcStatSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadSampler for ProcStatSampler {
    fn sample(&self) -> LoadSample {
        let cpu_load = std::fs::read_to_string("/proc/stat")
            .ok()
            .and_then(|s| parse_cpu_times(&s))
            .map(|now| {
                let mut last = self.last.lock();
                let busy = cpu_busy(*last, now);
                *last = now;
                busy
            })
            .unwrap_or(0.0);
        let mem_use = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|s| parse_mem_use(&s))
            .unwrap_or(0.0);
        LoadSample { cpu_load, mem_use }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{LoadSample, LoadSampler};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake sampler reporting a settable load
    #[derive(Clone, Default)]
    pub struct FakeSampler {
        inner: Arc<Mutex<LoadSample>>,
    }

    impl FakeSampler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, cpu_load: f32, mem_use: f32) {
            *self.inner.lock() = LoadSample { cpu_load, mem_use };
        }
    }

    impl LoadSampler for FakeSampler {
        fn sample(&self) -> LoadSample {
            *self.inner.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSampler;

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
