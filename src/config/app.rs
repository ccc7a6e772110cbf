use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::benchmarks::{BenchmarkParameters, SupervisorSettings};
use crate::config::traits::Configuration;
use crate::path_utils;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "stresskit.yml";
pub const DEFAULT_LOG_DIR: &str = "~/HardwareStressTest/logs";

/// Application configuration loaded from stresskit.yml
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory run logs are written to
    pub log_dir: PathBuf,
    /// Upper bound for each `command -v` lookup
    pub dependency_timeout_ms: u64,
    /// Time between SIGTERM and SIGKILL when stopping a run
    pub stop_grace_ms: u64,
    pub progress_interval_ms: u64,
    /// Dashboard sampling period
    pub sample_interval_ms: u64,
    /// Parameter defaults used when the command line leaves a value out
    pub defaults: BenchmarkParameters,
    /// Path to the config file (set during loading)
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            dependency_timeout_ms: 1500,
            stop_grace_ms: 3000,
            progress_interval_ms: 200,
            sample_interval_ms: 1000,
            defaults: BenchmarkParameters::default(),
            path: None,
        }
    }
}

impl Configuration for AppConfig {
    fn config_type(&self) -> &str {
        "application"
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("dependency_timeout_ms", self.dependency_timeout_ms),
            ("stop_grace_ms", self.stop_grace_ms),
            ("progress_interval_ms", self.progress_interval_ms),
            ("sample_interval_ms", self.sample_interval_ms),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }

        if self.log_dir.as_os_str().is_empty() {
            anyhow::bail!("log_dir must not be empty");
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Replace the log directory, expanding `~` and variables
    pub fn set_log_dir(&mut self, dir: &Path) {
        self.log_dir = path_utils::expand_path_buf(dir);
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            log_dir: self.log_dir.clone(),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
        }
    }
}

/// Load application configuration
///
/// With no explicit path, `stresskit.yml` in the working directory is used
/// when present and built-in defaults otherwise.
pub fn load_app_config(app_config_path: Option<&Path>) -> Result<AppConfig> {
    let path = match app_config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("App config file not found: {:?}", path);
            }
            path.to_path_buf()
        }
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                let mut config = AppConfig::default();
                config.log_dir = path_utils::expand_path_buf(&config.log_dir);
                debug!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");
                return Ok(config);
            }
            default
        }
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read app config file: {:?}", path))?;

    let mut config: AppConfig = if contents.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML from file: {:?}", path))?
    };

    let config_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.log_dir = path_utils::resolve_path(&config.log_dir, config_dir);
    config.path = Some(path);

    config.validate()?;

    debug!("Using {} configuration\n{:?}", config.config_type(), config);
    Ok(config)
}
