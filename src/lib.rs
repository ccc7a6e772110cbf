pub mod benchmarks;
pub mod command;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod metrics;
pub mod path_utils;
pub mod system_info;
pub mod timer;

/// Application name shown in log headers and `--version`
pub const APP_NAME: &str = "Hardware Stress Testing Tool";
macro_rules! revision {
    () => {
        "2025-09-06"
    };
}

/// Version with revision, as printed by `--version`
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", revision!(), ")");
