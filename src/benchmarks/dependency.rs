use log::debug;
use std::path::PathBuf;
use std::time::Duration;

use crate::command::CommandExecutor;

/// Default bound for a single executable lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Resolves external executables before anything is spawned
pub trait DependencyChecker {
    /// Absolute path of `exe`, or `None` if it cannot be resolved
    fn locate(&self, exe: &str) -> Option<PathBuf>;

    fn is_available(&self, exe: &str) -> bool {
        self.locate(exe).is_some()
    }
}

/// Looks executables up through a login shell's `command -v`
pub struct ShellDependencyChecker {
    executor: CommandExecutor,
}

impl Default for ShellDependencyChecker {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_TIMEOUT)
    }
}

impl ShellDependencyChecker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            executor: CommandExecutor::builder()
                .name("dependency lookup")
                .capture_output(true)
                .timeout(timeout)
                .build(),
        }
    }
}

impl DependencyChecker for ShellDependencyChecker {
    fn locate(&self, exe: &str) -> Option<PathBuf> {
        let script = format!("command -v {exe}");
        let output = match self.executor.execute_with_timeout("bash", &["-lc", &script]) {
            Ok(Some(output)) => output,
            Ok(None) => {
                debug!("Lookup of {exe} timed out");
                return None;
            }
            Err(e) => {
                debug!("Lookup of {exe} failed: {e}");
                return None;
            }
        };

        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_shell() {
        let checker = ShellDependencyChecker::default();
        let path = checker.locate("sh").expect("sh should resolve");
        assert!(path.to_string_lossy().ends_with("sh"));
    }

    #[test]
    fn test_missing_tool() {
        let checker = ShellDependencyChecker::default();
        assert!(!checker.is_available("stresskit-definitely-not-installed"));
    }
}
