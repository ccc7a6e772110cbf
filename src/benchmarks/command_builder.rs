use log::debug;
use std::path::PathBuf;

use crate::benchmarks::dependency::DependencyChecker;
use crate::benchmarks::kind::BenchmarkKind;
use crate::benchmarks::parameters::BenchmarkParameters;
use crate::benchmarks::utils::split_command;
use crate::benchmarks::RunError;

const MIN_WORKERS: u32 = 1;
const MIN_DURATION_SECS: u64 = 5;
const DEFAULT_VM_BYTES: &str = "512M";
const DEFAULT_DISK_SIZE: &str = "1G";
const DEFAULT_DISK_FILE: &str = "fio_testfile.bin";

#[cfg(target_os = "linux")]
const FIO_IOENGINE: &str = "libaio";
#[cfg(not(target_os = "linux"))]
const FIO_IOENGINE: &str = "psync";

/// A fully resolved invocation of a stressor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable followed by its arguments
    pub argv: Vec<String>,
    /// Advisory run time used for progress display; `None` means indeterminate
    pub expected_secs: Option<u64>,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, expected_secs: Option<u64>) -> Self {
        Self {
            argv,
            expected_secs,
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Space-joined command line as shown to the user and written to logs
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Turns a benchmark selection into a command, checking the tool is installed
pub struct CommandBuilder<'a> {
    checker: &'a dyn DependencyChecker,
    working_dir: PathBuf,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(checker: &'a dyn DependencyChecker, working_dir: PathBuf) -> Self {
        Self {
            checker,
            working_dir,
        }
    }

    /// Build the command for `kind`
    ///
    /// The dependency check runs first, so a missing tool is reported even
    /// when the parameters are also unusable.
    pub fn build(
        &self,
        kind: BenchmarkKind,
        params: &BenchmarkParameters,
    ) -> Result<CommandSpec, RunError> {
        let tool = kind.required_tool();
        if !self.checker.is_available(tool) {
            return Err(RunError::missing(tool));
        }

        let spec = match kind {
            BenchmarkKind::Cpu => {
                let workers = params.cpu.workers.max(MIN_WORKERS);
                let duration = params.cpu.duration.max(MIN_DURATION_SECS);
                CommandSpec::new(
                    vec![
                        tool.to_string(),
                        "--cpu".to_string(),
                        workers.to_string(),
                        "--timeout".to_string(),
                        format!("{duration}s"),
                    ],
                    Some(duration),
                )
            }
            BenchmarkKind::Memory => {
                let workers = params.memory.workers.max(MIN_WORKERS);
                let duration = params.memory.duration.max(MIN_DURATION_SECS);
                let bytes = or_default(&params.memory.bytes, DEFAULT_VM_BYTES);
                CommandSpec::new(
                    vec![
                        tool.to_string(),
                        "--vm".to_string(),
                        workers.to_string(),
                        "--vm-bytes".to_string(),
                        bytes,
                        "--timeout".to_string(),
                        format!("{duration}s"),
                    ],
                    Some(duration),
                )
            }
            BenchmarkKind::Gpu => CommandSpec::new(vec![tool.to_string()], None),
            BenchmarkKind::Disk => {
                let size = or_default(&params.disk.size, DEFAULT_DISK_SIZE);
                let runtime = params.disk.runtime.max(MIN_DURATION_SECS);
                let filename = match params.disk.filename.trim() {
                    "" => self
                        .working_dir
                        .join(DEFAULT_DISK_FILE)
                        .to_string_lossy()
                        .into_owned(),
                    name => name.to_string(),
                };
                CommandSpec::new(
                    vec![
                        tool.to_string(),
                        "--name=randrw".to_string(),
                        "--rw=randrw".to_string(),
                        format!("--size={size}"),
                        format!("--runtime={runtime}"),
                        "--time_based=1".to_string(),
                        format!("--filename={filename}"),
                        format!("--ioengine={FIO_IOENGINE}"),
                        "--direct=1".to_string(),
                    ],
                    Some(runtime),
                )
            }
            BenchmarkKind::Network => {
                let server = params.network.server.trim();
                if server.is_empty() {
                    return Err(RunError::InputInvalid(
                        "Please enter the iperf3 server IP.".to_string(),
                    ));
                }
                let mut argv = vec![tool.to_string(), "-c".to_string(), server.to_string()];
                argv.extend(split_command(params.network.extra.trim()));
                CommandSpec::new(argv, None)
            }
        };

        debug!("Built {kind} command: {}", spec.command_line());
        Ok(spec)
    }
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}
