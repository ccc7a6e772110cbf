use serde::{Deserialize, Serialize};

use crate::system_info;

/// Options for the CPU stressor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuOptions {
    /// Number of CPU workers
    pub workers: u32,
    /// Run time in seconds
    pub duration: u64,
}

impl Default for CpuOptions {
    fn default() -> Self {
        Self {
            workers: system_info::logical_cpu_count().max(1) as u32,
            duration: default_duration(),
        }
    }
}

/// Options for the memory stressor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    /// Number of VM workers
    pub workers: u32,
    /// Bytes per VM worker, in stress-ng size notation (e.g. "512M")
    pub bytes: String,
    /// Run time in seconds
    pub duration: u64,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            bytes: "1G".to_string(),
            duration: default_duration(),
        }
    }
}

/// Options for the fio random read/write job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskOptions {
    /// Test file size in fio size notation
    pub size: String,
    /// Run time in seconds
    pub runtime: u64,
    /// Test file path; blank means a file in the working directory
    pub filename: String,
}

impl Default for DiskOptions {
    fn default() -> Self {
        Self {
            size: "1G".to_string(),
            runtime: 60,
            filename: String::new(),
        }
    }
}

/// Options for the iperf3 client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    /// iperf3 server address
    pub server: String,
    /// Extra arguments, split like a shell command line
    pub extra: String,
}

/// Per-kind configuration for every benchmark the tool can launch
///
/// Only the section matching the selected kind is consulted when a command
/// is built. GPU runs take no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkParameters {
    pub cpu: CpuOptions,
    pub memory: MemoryOptions,
    pub disk: DiskOptions,
    pub network: NetworkOptions,
}

fn default_duration() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = BenchmarkParameters::default();
        assert!(params.cpu.workers >= 1);
        assert_eq!(params.cpu.duration, 300);
        assert_eq!(params.memory.workers, 2);
        assert_eq!(params.memory.bytes, "1G");
        assert_eq!(params.disk.runtime, 60);
        assert!(params.disk.filename.is_empty());
        assert!(params.network.server.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "cpu:\n  workers: 8\nnetwork:\n  server: 10.0.0.2\n";
        let params: BenchmarkParameters = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.cpu.workers, 8);
        assert_eq!(params.cpu.duration, 300);
        assert_eq!(params.network.server, "10.0.0.2");
        assert_eq!(params.disk.size, "1G");
    }
}
