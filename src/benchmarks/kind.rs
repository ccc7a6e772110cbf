use serde::{Deserialize, Serialize};
use std::fmt;

/// The subsystem a run stresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    Cpu,
    #[value(alias = "ram")]
    Memory,
    Gpu,
    Disk,
    #[value(alias = "net")]
    Network,
}

/// Every external tool a run can need, in menu order
pub const KNOWN_TOOLS: [&str; 4] = ["stress-ng", "glmark2", "fio", "iperf3"];

impl BenchmarkKind {
    pub const ALL: [BenchmarkKind; 5] = [
        BenchmarkKind::Cpu,
        BenchmarkKind::Memory,
        BenchmarkKind::Gpu,
        BenchmarkKind::Disk,
        BenchmarkKind::Network,
    ];

    /// Executable that must be resolvable before a run of this kind starts
    pub fn required_tool(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu | BenchmarkKind::Memory => "stress-ng",
            BenchmarkKind::Gpu => "glmark2",
            BenchmarkKind::Disk => "fio",
            BenchmarkKind::Network => "iperf3",
        }
    }

    /// Short name used as the log file prefix
    pub fn log_name(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "cpu",
            BenchmarkKind::Memory => "ram",
            BenchmarkKind::Gpu => "gpu",
            BenchmarkKind::Disk => "disk",
            BenchmarkKind::Network => "net",
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BenchmarkKind::Cpu => "CPU",
            BenchmarkKind::Memory => "RAM",
            BenchmarkKind::Gpu => "GPU",
            BenchmarkKind::Disk => "Disk",
            BenchmarkKind::Network => "Network",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_tools_are_known() {
        for kind in BenchmarkKind::ALL {
            assert!(KNOWN_TOOLS.contains(&kind.required_tool()));
        }
    }

    #[test]
    fn test_log_names() {
        assert_eq!(BenchmarkKind::Memory.log_name(), "ram");
        assert_eq!(BenchmarkKind::Network.log_name(), "net");
    }
}
