//! System utilization sampling for the dashboard gauges
//!
//! Readings come straight from kernel interfaces: `/proc/stat` for CPU time,
//! `/proc/meminfo` for memory and `statvfs(3)` for the root filesystem. A
//! source that cannot be read produces a zero reading rather than an error.

use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod cpu;
pub use cpu::{utilization, CpuCounterSnapshot};
mod disk;
pub use disk::FsStats;
mod memory;
pub use memory::{parse_meminfo, MemoryUsage};

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const ROOT_MOUNT: &str = "/";

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed counters: {0}")]
    Malformed(String),

    #[error("statvfs({}) failed: {source}", path.display())]
    Statvfs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A utilization fraction plus the absolute amounts behind it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSample {
    /// Used share of the total, 0.0 when the total is zero
    pub fraction: f64,
    /// Used amount in GiB
    pub used: f64,
    /// Total amount in GiB
    pub total: f64,
}

impl MetricSample {
    /// Build a sample from raw amounts; `per_gib` converts them to GiB
    pub fn from_used_total(used: u64, total: u64, per_gib: f64) -> Self {
        if total == 0 {
            return Self::default();
        }
        Self {
            fraction: used as f64 / total as f64,
            used: used as f64 / per_gib,
            total: total as f64 / per_gib,
        }
    }

    /// `used GiB / total GiB` with one decimal
    pub fn caption(&self) -> String {
        format!("{:.1} GiB / {:.1} GiB", self.used, self.total)
    }
}

/// Clamp a fraction into [0, 1] and express it as a percentage
pub fn fraction_to_percent(fraction: f64) -> f64 {
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0) * 100.0
}

/// One reading of all three gauges
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemReading {
    pub cpu: f64,
    pub memory: MetricSample,
    pub disk: MetricSample,
}

/// Reads CPU, memory and root filesystem utilization
///
/// CPU utilization is a rate, so the sampler keeps the previous counter
/// snapshot; the first CPU reading of a sampler is always zero.
#[derive(Debug)]
pub struct MetricsSampler {
    stat_path: PathBuf,
    meminfo_path: PathBuf,
    disk_root: PathBuf,
    prev_cpu: Option<CpuCounterSnapshot>,
    warned_mem_available: bool,
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self::with_sources(PROC_STAT, PROC_MEMINFO, ROOT_MOUNT)
    }

    /// Sampler reading from alternative files and mount point
    pub fn with_sources(
        stat_path: impl Into<PathBuf>,
        meminfo_path: impl Into<PathBuf>,
        disk_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stat_path: stat_path.into(),
            meminfo_path: meminfo_path.into(),
            disk_root: disk_root.into(),
            prev_cpu: None,
            warned_mem_available: false,
        }
    }

    /// Busy fraction of CPU time since the previous call
    pub fn cpu_fraction(&mut self) -> f64 {
        let now = match read_to_string(&self.stat_path).and_then(|s| CpuCounterSnapshot::parse_stat(&s)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("CPU sample failed: {e}");
                return 0.0;
            }
        };

        match self.prev_cpu.replace(now) {
            Some(prev) => utilization(&prev, &now),
            None => 0.0,
        }
    }

    pub fn memory(&mut self) -> MetricSample {
        let contents = match read_to_string(&self.meminfo_path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Memory sample failed: {e}");
                return MetricSample::default();
            }
        };

        let usage = MemoryUsage::from_table(&parse_meminfo(&contents));
        if usage.available_missing && !self.warned_mem_available {
            warn!(
                "MemAvailable missing from {}; memory usage will read as full",
                self.meminfo_path.display()
            );
            self.warned_mem_available = true;
        }
        usage.sample()
    }

    pub fn disk(&self) -> MetricSample {
        match FsStats::query(&self.disk_root) {
            Ok(stats) => stats.sample(),
            Err(e) => {
                debug!("Disk sample failed: {e}");
                MetricSample::default()
            }
        }
    }

    pub fn sample(&mut self) -> SystemReading {
        SystemReading {
            cpu: self.cpu_fraction(),
            memory: self.memory(),
            disk: self.disk(),
        }
    }
}

fn read_to_string(path: &Path) -> Result<String, SamplingError> {
    std::fs::read_to_string(path).map_err(|source| SamplingError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sampler_in(dir: &Path) -> MetricsSampler {
        MetricsSampler::with_sources(dir.join("stat"), dir.join("meminfo"), dir)
    }

    #[test]
    fn test_first_cpu_sample_is_zero() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stat"), "cpu 100 0 0 100 0 0 0 0 0 0\n").unwrap();
        let mut sampler = sampler_in(dir.path());
        assert_eq!(sampler.cpu_fraction(), 0.0);

        fs::write(dir.path().join("stat"), "cpu 150 0 0 150 0 0 0 0 0 0\n").unwrap();
        assert_eq!(sampler.cpu_fraction(), 0.5);
    }

    #[test]
    fn test_repeated_identical_counters_are_zero() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stat"), "cpu 100 0 0 100 0 0 0 0 0 0\n").unwrap();
        let mut sampler = sampler_in(dir.path());
        sampler.cpu_fraction();
        assert_eq!(sampler.cpu_fraction(), 0.0);
    }

    #[test]
    fn test_unreadable_sources_degrade_to_zero() {
        let dir = tempdir().unwrap();
        let mut sampler = MetricsSampler::with_sources(
            dir.path().join("missing-stat"),
            dir.path().join("missing-meminfo"),
            dir.path().join("missing-root"),
        );
        let reading = sampler.sample();
        assert_eq!(reading, SystemReading::default());
    }

    #[test]
    fn test_malformed_stat_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let stat = dir.path().join("stat");
        fs::write(&stat, "cpu 100 0 0 100 0 0 0 0 0 0\n").unwrap();
        let mut sampler = sampler_in(dir.path());
        sampler.cpu_fraction();

        fs::write(&stat, "intr 1 2 3\n").unwrap();
        assert_eq!(sampler.cpu_fraction(), 0.0);

        fs::write(&stat, "cpu 200 0 0 100 0 0 0 0 0 0\n").unwrap();
        assert_eq!(sampler.cpu_fraction(), 1.0);
    }

    #[test]
    fn test_memory_from_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("meminfo"),
            "MemTotal: 2097152 kB\nMemAvailable: 524288 kB\n",
        )
        .unwrap();
        let mut sampler = sampler_in(dir.path());
        let sample = sampler.memory();
        assert_eq!(sample.fraction, 0.75);
        assert_eq!(sample.total, 2.0);
        assert_eq!(sample.caption(), "1.5 GiB / 2.0 GiB");
    }

    #[test]
    fn test_live_readings_in_range() {
        let mut sampler = MetricsSampler::new();
        for _ in 0..2 {
            let reading = sampler.sample();
            for percent in [
                fraction_to_percent(reading.cpu),
                fraction_to_percent(reading.memory.fraction),
                fraction_to_percent(reading.disk.fraction),
            ] {
                assert!((0.0..=100.0).contains(&percent));
            }
        }
    }

    #[test]
    fn test_fraction_to_percent_clamps() {
        assert_eq!(fraction_to_percent(-0.5), 0.0);
        assert_eq!(fraction_to_percent(1.5), 100.0);
        assert_eq!(fraction_to_percent(0.25), 25.0);
        assert_eq!(fraction_to_percent(f64::NAN), 0.0);
    }
}
