use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to whoever asked for a run
///
/// None of these are retried; every one of them leaves the supervisor Idle.
#[derive(Debug, Error)]
pub enum RunError {
    /// The stressor executable could not be resolved on this host
    #[error("'{tool}' not found.\nInstall with:\n  {install_hint}")]
    DependencyMissing { tool: String, install_hint: String },

    /// A required parameter was missing or unusable
    #[error("Input error: {0}")]
    InputInvalid(String),

    /// The per-run log file could not be created
    #[error("Cannot write log file {}: {source}", path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to execute the command
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("A test is already running.")]
    Busy,

    #[error("No test is running.")]
    NotRunning,
}

impl RunError {
    pub fn missing(tool: &str) -> Self {
        RunError::DependencyMissing {
            tool: tool.to_string(),
            install_hint: install_hint(tool),
        }
    }
}

/// Suggested install command for a missing tool
pub fn install_hint(tool: &str) -> String {
    format!("sudo apt install {tool}")
}
