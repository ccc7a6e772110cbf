mod command_builder;
pub use command_builder::{CommandBuilder, CommandSpec};
mod dependency;
pub use dependency::{DependencyChecker, ShellDependencyChecker, DEFAULT_LOOKUP_TIMEOUT};
mod error;
pub use error::{install_hint, RunError};
mod kind;
pub use kind::{BenchmarkKind, KNOWN_TOOLS};
mod logger;
pub use logger::RunLogger;
mod parameters;
pub use parameters::{BenchmarkParameters, CpuOptions, DiskOptions, MemoryOptions, NetworkOptions};
mod progress;
pub use progress::{format_mm_ss, Progress};
mod supervisor;
pub use supervisor::{
    ExitInfo, OutputStream, RunListener, RunOutcome, RunState, RunSupervisor, SupervisorSettings,
};
pub mod utils;
