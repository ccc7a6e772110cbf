use anyhow::{Context, Result};
use stresskit::{
    benchmarks::{
        install_hint, BenchmarkKind, BenchmarkParameters, CommandBuilder, DependencyChecker,
        RunError, RunState, RunSupervisor, ShellDependencyChecker, KNOWN_TOOLS,
    },
    config::{load_app_config, AppConfig},
    console::{ConsoleView, OutputCapture},
    dashboard::{self, Dashboard},
    metrics::MetricsSampler,
    path_utils, system_info, APP_NAME, LONG_VERSION,
};

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Upper bound for one pass of the run loop
const LOOP_WAIT: Duration = Duration::from_millis(100);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(
    name = "stresskit",
    version,
    long_version = LONG_VERSION,
    about = APP_NAME,
    long_about = "Run stress-ng, glmark2, fio and iperf3 stress tests with per-run logs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application config (defaults to ./stresskit.yml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for run logs
    #[arg(long, env = "STRESSKIT_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a stress test
    Run(RunArgs),
    /// Check that the external stress tools are installed
    Deps,
    /// Show the log directory and existing run logs
    Logs,
    /// Show CPU, memory and disk utilization
    Dashboard {
        /// Stop after this many samples
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Print one JSON object per sample
        #[arg(long)]
        json: bool,
    },
    /// Print host information
    Info,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Subsystem to stress
    #[arg(value_enum)]
    kind: BenchmarkKind,

    /// Number of stressor workers (cpu, memory)
    #[arg(short, long)]
    workers: Option<u32>,

    /// Test duration in seconds (cpu, memory)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Bytes per memory worker, e.g. 512M or 2G
    #[arg(long)]
    bytes: Option<String>,

    /// Size of the fio test file
    #[arg(long)]
    size: Option<String>,

    /// fio runtime in seconds
    #[arg(long)]
    runtime: Option<u64>,

    /// Path of the fio test file
    #[arg(long)]
    filename: Option<String>,

    /// iperf3 server address
    #[arg(long)]
    server: Option<String>,

    /// Extra iperf3 arguments, quoted as a single string
    #[arg(long, allow_hyphen_values = true)]
    extra: Option<String>,

    /// Also write the streamed output to this file
    #[arg(long)]
    save_output: Option<PathBuf>,

    /// Print utilization gauges while the test runs
    #[arg(long)]
    monitor: bool,
}

impl RunArgs {
    /// Overlay the command line on the configured defaults
    fn parameters(&self, defaults: &BenchmarkParameters) -> BenchmarkParameters {
        let mut params = defaults.clone();
        match self.kind {
            BenchmarkKind::Cpu => {
                if let Some(workers) = self.workers {
                    params.cpu.workers = workers;
                }
                if let Some(duration) = self.duration {
                    params.cpu.duration = duration;
                }
            }
            BenchmarkKind::Memory => {
                if let Some(workers) = self.workers {
                    params.memory.workers = workers;
                }
                if let Some(duration) = self.duration {
                    params.memory.duration = duration;
                }
                if let Some(bytes) = &self.bytes {
                    params.memory.bytes = bytes.clone();
                }
            }
            BenchmarkKind::Disk => {
                if let Some(size) = &self.size {
                    params.disk.size = size.clone();
                }
                if let Some(runtime) = self.runtime {
                    params.disk.runtime = runtime;
                }
                if let Some(filename) = &self.filename {
                    params.disk.filename = filename.clone();
                }
            }
            BenchmarkKind::Network => {
                if let Some(server) = &self.server {
                    params.network.server = server.clone();
                }
                if let Some(extra) = &self.extra {
                    params.network.extra = extra.clone();
                }
            }
            BenchmarkKind::Gpu => {}
        }
        params
    }
}

extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install_sigint_handler() -> Result<()> {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error()).context("Failed to install SIGINT handler");
    }
    Ok(())
}

fn run_benchmark(config: &AppConfig, args: &RunArgs) -> Result<i32> {
    let checker = ShellDependencyChecker::new(config.dependency_timeout());
    let working_dir = std::env::current_dir().context("Failed to get working directory")?;
    let params = args.parameters(&config.defaults);
    let spec = CommandBuilder::new(&checker, working_dir).build(args.kind, &params)?;

    let bar = ProgressBar::new_spinner();
    let mut supervisor = RunSupervisor::new(config.supervisor_settings());
    supervisor.add_listener(Box::new(ConsoleView::new(bar.clone())?));
    if let Some(path) = &args.save_output {
        supervisor.add_listener(Box::new(OutputCapture::create(path)?));
    }

    install_sigint_handler()?;
    supervisor.start(args.kind.log_name(), &spec)?;
    info!("Running {} test", args.kind);

    let mut monitor = args
        .monitor
        .then(|| Dashboard::new(MetricsSampler::new(), config.sample_interval()));

    loop {
        if INTERRUPTED.swap(false, Ordering::SeqCst) {
            match supervisor.stop() {
                Ok(()) => {}
                Err(RunError::NotRunning) => debug!("Interrupt with no run in flight"),
                Err(e) => warn!("{e}"),
            }
        }

        let now = Instant::now();
        let mut wait = LOOP_WAIT;
        if let Some(dashboard) = monitor.as_mut() {
            if let Some(reading) = dashboard.poll(now) {
                ConsoleView::println(&bar, &dashboard::render(&reading));
            }
            wait = wait.min(dashboard.until_due(now));
        }

        if let Some(outcome) = supervisor.process_events(wait) {
            let exit = outcome.exit;
            return Ok(exit
                .code
                .or_else(|| exit.signal.map(|signal| 128 + signal))
                .unwrap_or(1));
        }

        if supervisor.state() == RunState::Idle {
            anyhow::bail!("Run ended without an exit status");
        }
    }
}

fn check_dependencies(config: &AppConfig) -> Result<()> {
    let checker = ShellDependencyChecker::new(config.dependency_timeout());
    let mut out = io::stdout().lock();

    writeln!(out, "Dependency check on {}", system_info::os_description())?;
    for tool in KNOWN_TOOLS {
        match checker.locate(tool) {
            Some(path) => writeln!(out, "  {tool:<10} {}", path.display())?,
            None => writeln!(out, "  {tool:<10} NOT FOUND ({})", install_hint(tool))?,
        }
    }
    writeln!(
        out,
        "\nMetrics are read from /proc/stat, /proc/meminfo and statvfs(\"/\")."
    )?;
    Ok(())
}

fn list_logs(config: &AppConfig) -> Result<()> {
    path_utils::ensure_directory(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;
    let logs = path_utils::list_logs(&config.log_dir)
        .with_context(|| format!("Failed to list {:?}", config.log_dir))?;

    let mut out = io::stdout().lock();
    writeln!(out, "{}", config.log_dir.display())?;
    if logs.is_empty() {
        writeln!(out, "  (no logs yet)")?;
    }
    for log in logs {
        writeln!(out, "  {}", log.display())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Host information needs no configuration
    if let Commands::Info = &cli.command {
        system_info::dump_sys_info(&mut io::stdout().lock())?;
        process::exit(0);
    }

    let mut config = load_app_config(cli.config.as_deref())?;
    if let Some(dir) = &cli.log_dir {
        config.set_log_dir(dir);
    }

    match &cli.command {
        Commands::Run(args) => {
            let code = run_benchmark(&config, args)?;
            process::exit(code);
        }
        Commands::Deps => check_dependencies(&config)?,
        Commands::Logs => list_logs(&config)?,
        Commands::Dashboard { count, json } => {
            let mut dashboard = Dashboard::new(MetricsSampler::new(), config.sample_interval());
            dashboard.run(*count, *json, &mut io::stdout().lock())?;
        }
        Commands::Info => {}
    }

    Ok(())
}
