use log::{debug, warn};
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::benchmarks::RunError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Command execution context
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Name of the command for logging
    pub command_name: Option<String>,
    /// Whether to put the child in its own process group
    pub process_group: bool,
    /// Capture stdout/stderr through pipes
    pub capture_output: bool,
    /// Upper bound for blocking executions
    pub timeout: Option<Duration>,
}

/// Builder for CommandExecutor
pub struct CommandExecutorBuilder {
    context: CommandContext,
}

impl Default for CommandExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutorBuilder {
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Set whether to capture command output
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.context.capture_output = capture;
        self
    }

    /// Set whether to create a process group
    pub fn process_group(mut self, create_group: bool) -> Self {
        self.context.process_group = create_group;
        self
    }

    /// Bound blocking executions; the child is killed once this elapses
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.context.timeout = Some(timeout);
        self
    }

    /// Set a name for the command for logging purposes
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.context.command_name = Some(name.into());
        self
    }

    pub fn build(self) -> CommandExecutor {
        CommandExecutor {
            context: self.context,
        }
    }
}

/// Launches external programs for dependency lookups and benchmark runs
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    context: CommandContext,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Create a builder for CommandExecutor with fluent configuration
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    /// Run a command to completion, giving up once the configured timeout elapses
    ///
    /// Returns `Ok(None)` when the command had to be killed.
    pub fn execute_with_timeout(
        &self,
        cmd: &str,
        args: &[&str],
    ) -> Result<Option<Output>, RunError> {
        let mut child = self.launch_command(cmd, args)?;
        let started = Instant::now();

        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {}
                Err(source) => {
                    return Err(RunError::Spawn {
                        program: cmd.to_string(),
                        source,
                    })
                }
            }

            if let Some(limit) = self.context.timeout {
                if started.elapsed() >= limit {
                    debug!(
                        "{} did not finish within {:?}, killing it",
                        self.format_command(cmd, args),
                        limit
                    );
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill timed out command: {e}");
                    }
                    let _ = child.wait();
                    return Ok(None);
                }
            }

            thread::sleep(POLL_INTERVAL);
        }

        child
            .wait_with_output()
            .map(Some)
            .map_err(|source| RunError::Spawn {
                program: cmd.to_string(),
                source,
            })
    }

    /// Spawn a command and return the child process handle
    pub fn launch_command(&self, cmd: &str, args: &[&str]) -> Result<Child, RunError> {
        let command_str = self.format_command(cmd, args);
        debug!("Launching command: {}", command_str);

        let mut command = Command::new(cmd);
        command.args(args).stdin(Stdio::null());

        if self.context.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        if self.context.process_group {
            command.process_group(0);
        }

        command.spawn().map_err(|source| RunError::Spawn {
            program: cmd.to_string(),
            source,
        })
    }

    /// Format command and arguments for logging
    fn format_command(&self, cmd: &str, args: &[&str]) -> String {
        if let Some(name) = &self.context.command_name {
            return name.clone();
        }

        format!("{} {}", cmd, args.join(" "))
    }
}

/// Deliver `signal` to every process in the group led by `pid`
pub fn signal_process_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pgid = -(pid as libc::pid_t);
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group.
    let rc = unsafe { libc::kill(pgid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let executor = CommandExecutor::builder()
            .name("lookup")
            .capture_output(true)
            .process_group(true)
            .timeout(Duration::from_millis(1500))
            .build();

        assert_eq!(executor.context.command_name, Some("lookup".to_string()));
        assert!(executor.context.capture_output);
        assert!(executor.context.process_group);
        assert_eq!(executor.context.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_execute_with_timeout_collects_output() {
        let executor = CommandExecutor::builder()
            .capture_output(true)
            .timeout(Duration::from_secs(5))
            .build();

        let output = executor
            .execute_with_timeout("sh", &["-c", "echo test_value"])
            .unwrap()
            .unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("test_value"));
    }

    #[test]
    fn test_execute_with_timeout_kills_slow_command() {
        let executor = CommandExecutor::builder()
            .capture_output(true)
            .timeout(Duration::from_millis(100))
            .build();

        let started = Instant::now();
        let output = executor.execute_with_timeout("sleep", &["5"]).unwrap();
        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_launch_missing_program() {
        let executor = CommandExecutor::new();
        let err = executor
            .launch_command("stresskit-no-such-program", &[])
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn test_format_command() {
        let named = CommandExecutor::builder().name("test command").build();
        assert_eq!(named.format_command("echo", &["hello"]), "test command");

        let unnamed = CommandExecutor::new();
        assert_eq!(
            unnamed.format_command("echo", &["hello", "world"]),
            "echo hello world"
        );
    }
}
