use anyhow::Result;
use log::debug;
use std::io::Write;

use sysinfo::System;

const UNKNOWN: &str = "<unknown>";

/// Number of logical CPUs, at least one
pub fn logical_cpu_count() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    let count = sys.cpus().len();
    if count == 0 {
        debug!("sysinfo reported no CPUs, assuming one");
        return 1;
    }
    count
}

/// Short OS description used in install hints
pub fn os_description() -> String {
    System::long_os_version().unwrap_or_else(|| UNKNOWN.to_owned())
}

#[rustfmt::skip]
pub fn dump_sys_info<W: Write>(out: &mut W) -> Result<()> {
    let mut sys = System::new_all();
    sys.refresh_all();

    writeln!(out, "{:<25}{}", "System name:", System::name().unwrap_or_else(|| UNKNOWN.to_owned()))?;
    writeln!(out, "{:<25}{}", "System kernel version:", System::kernel_version().unwrap_or_else(|| UNKNOWN.to_owned()))?;
    writeln!(out, "{:<25}{}", "System OS version:", os_description())?;
    writeln!(out, "{:<25}{}", "Distribution ID:", System::distribution_id())?;
    writeln!(out, "{:<25}{}", "Host name:", System::host_name().unwrap_or_else(|| UNKNOWN.to_owned()))?;

    writeln!(out, "{:<25}{}", "CPU Arch:", System::cpu_arch())?;
    match sys.cpus().first() {
        Some(cpu) => writeln!(out, "{:<25}{} ({} logical) @ {:.2} GHz",
            "CPU:",
            cpu.brand(),
            sys.cpus().len(),
            cpu.frequency() as f64 / 1000.0)?,
        None => writeln!(out, "{:<25}Unknown", "CPU:")?,
    }

    writeln!(out, "{:<25}{:.1} GiB", "Total memory:", gib(sys.total_memory()))?;
    writeln!(out, "{:<25}{:.1} GiB", "Used memory:", gib(sys.used_memory()))?;
    writeln!(out, "{:<25}{:.1} GiB", "Total swap:", gib(sys.total_swap()))?;
    writeln!(out, "{:<25}{:.1} GiB", "Used swap:", gib(sys.used_swap()))?;

    let uptime = System::uptime();
    writeln!(out, "{:<25}{}", "Uptime (seconds):", uptime)?;
    writeln!(out, "{:<25}{}", "Uptime (days):", uptime / 86400)?;
    Ok(())
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_cpu_count() {
        assert!(logical_cpu_count() >= 1);
    }

    #[test]
    fn test_dump_sys_info() {
        let mut out = Vec::new();
        dump_sys_info(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("CPU Arch:"));
        assert!(text.contains("Total memory:"));
        assert!(text.lines().count() >= 10);
    }
}
