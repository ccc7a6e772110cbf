use std::collections::HashMap;

use crate::metrics::MetricSample;

const KIB_PER_GIB: f64 = 1024.0 * 1024.0;

/// Parse `Key: value [unit]` lines from `/proc/meminfo` into kB values
///
/// Lines whose value is not an integer are skipped.
pub fn parse_meminfo(contents: &str) -> HashMap<String, u64> {
    contents
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let key = parts.next()?;
            let value = parts.next()?.parse().ok()?;
            Some((key.replace(':', ""), value))
        })
        .collect()
}

/// Used and total memory derived from a meminfo table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub total_kb: u64,
    pub available_kb: u64,
    /// `MemAvailable` was absent and counted as zero
    pub available_missing: bool,
}

impl MemoryUsage {
    pub fn from_table(table: &HashMap<String, u64>) -> Self {
        let available = table.get("MemAvailable").copied();
        Self {
            total_kb: table.get("MemTotal").copied().unwrap_or(0),
            available_kb: available.unwrap_or(0),
            available_missing: available.is_none(),
        }
    }

    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    /// Usage fraction with used/total in GiB
    pub fn sample(&self) -> MetricSample {
        MetricSample::from_used_total(self.used_kb(), self.total_kb, KIB_PER_GIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16384000 kB\n\
                           MemFree:         1024000 kB\n\
                           MemAvailable:    4096000 kB\n\
                           Buffers:          200000 kB\n\
                           HugePages_Total:       0\n\
                           garbage line\n";

    #[test]
    fn test_parse_meminfo() {
        let table = parse_meminfo(MEMINFO);
        assert_eq!(table.get("MemTotal"), Some(&16384000));
        assert_eq!(table.get("MemAvailable"), Some(&4096000));
        assert_eq!(table.get("HugePages_Total"), Some(&0));
        assert!(!table.contains_key("garbage"));
    }

    #[test]
    fn test_usage() {
        let usage = MemoryUsage::from_table(&parse_meminfo(MEMINFO));
        assert!(!usage.available_missing);
        assert_eq!(usage.used_kb(), 12288000);

        let sample = usage.sample();
        assert_eq!(sample.fraction, 0.75);
        assert!((sample.total - 15.625).abs() < 1e-9);
        assert!((sample.used - 11.71875).abs() < 1e-9);
    }

    #[test]
    fn test_missing_mem_available_counts_as_zero() {
        let usage = MemoryUsage::from_table(&parse_meminfo("MemTotal: 2048 kB\nMemFree: 1024 kB\n"));
        assert!(usage.available_missing);
        assert_eq!(usage.used_kb(), 2048);
        assert_eq!(usage.sample().fraction, 1.0);
    }

    #[test]
    fn test_zero_total() {
        let usage = MemoryUsage::from_table(&parse_meminfo(""));
        let sample = usage.sample();
        assert_eq!(sample.fraction, 0.0);
        assert_eq!(sample.total, 0.0);
    }
}
