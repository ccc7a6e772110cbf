use log::{debug, info, trace, warn};
use std::io::{ErrorKind, Read};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::benchmarks::command_builder::CommandSpec;
use crate::benchmarks::logger::RunLogger;
use crate::benchmarks::progress::Progress;
use crate::benchmarks::RunError;
use crate::command::{signal_process_group, CommandExecutor};
use crate::timer::PeriodicTimer;

/// How long the exit notification waits for the output pipes to drain
const DRAIN_GRACE: Duration = Duration::from_millis(250);
const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code for a normal exit
    pub code: Option<i32>,
    /// Terminating signal when the child was killed
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }

    /// Return code as shown to the user; `-1` when there was none
    pub fn display_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Text following `[exit] ` in the log footer
    pub fn footer(&self) -> String {
        match self.signal {
            Some(signal) => format!("{} (signal {signal})", self.display_code()),
            None => self.display_code().to_string(),
        }
    }
}

/// Summary handed out once a run is over
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub name: String,
    pub exit: ExitInfo,
    pub log_path: PathBuf,
    pub elapsed: Duration,
}

/// Observer of a run's lifecycle
///
/// All callbacks happen on the thread that calls
/// [`RunSupervisor::process_events`], one at a time.
pub trait RunListener {
    fn on_started(&mut self, _spec: &CommandSpec, _log_path: &Path) {}
    fn on_output(&mut self, _stream: OutputStream, _bytes: &[u8]) {}
    fn on_progress(&mut self, _progress: &Progress) {}
    fn on_stopping(&mut self) {}
    fn on_exit(&mut self, _outcome: &RunOutcome) {}
}

/// Tunables for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Directory receiving one log file per run
    pub log_dir: PathBuf,
    /// Wait between the graceful termination request and the kill
    pub stop_grace: Duration,
    /// Progress recomputation period
    pub progress_interval: Duration,
}

impl SupervisorSettings {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            stop_grace: Duration::from_secs(3),
            progress_interval: Duration::from_millis(200),
        }
    }
}

enum RunEvent {
    Output {
        run_id: u64,
        stream: OutputStream,
        bytes: Vec<u8>,
    },
    Exited {
        run_id: u64,
        exit: ExitInfo,
    },
}

struct ActiveRun {
    id: u64,
    name: String,
    pid: u32,
    logger: RunLogger,
    started: Instant,
    expected_secs: Option<u64>,
    progress_timer: PeriodicTimer,
    kill_deadline: Option<Instant>,
    killed: bool,
}

/// Owns at most one child process and everything tied to its lifetime
///
/// Output and exit notifications arrive from helper threads over a channel
/// and are applied in [`process_events`](Self::process_events), so every
/// state change happens on the caller's thread.
pub struct RunSupervisor {
    settings: SupervisorSettings,
    state: RunState,
    active: Option<ActiveRun>,
    listeners: Vec<Box<dyn RunListener>>,
    next_run_id: u64,
    tx: Sender<RunEvent>,
    rx: Receiver<RunEvent>,
}

impl RunSupervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            settings,
            state: RunState::Idle,
            active: None,
            listeners: Vec::new(),
            next_run_id: 1,
            tx,
            rx,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn RunListener>) {
        self.listeners.push(listener);
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Log file of the run in flight
    pub fn log_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|run| run.logger.path())
    }

    /// Current progress, computed from the wall clock
    pub fn progress(&self) -> Progress {
        match &self.active {
            Some(run) => Progress::compute(run.expected_secs, run.started.elapsed()),
            None => Progress::Idle,
        }
    }

    /// Open the run's log and launch `spec`
    ///
    /// `name` prefixes the log file. Any failure leaves the supervisor Idle.
    pub fn start(&mut self, name: &str, spec: &CommandSpec) -> Result<(), RunError> {
        if self.state != RunState::Idle {
            return Err(RunError::Busy);
        }
        if spec.argv.is_empty() {
            return Err(RunError::InputInvalid("Empty command".to_string()));
        }

        let command_line = spec.command_line();
        let mut logger = RunLogger::create(&self.settings.log_dir, name, &command_line)?;

        let args: Vec<&str> = spec.args().iter().map(String::as_str).collect();
        let executor = CommandExecutor::builder()
            .name(command_line.clone())
            .capture_output(true)
            .process_group(true)
            .build();
        let mut child = match executor.launch_command(spec.program(), &args) {
            Ok(child) => child,
            Err(e) => {
                warn!("{e}");
                logger.write_note(&format!("[error] {e}"));
                let no_status = ExitInfo {
                    code: None,
                    signal: None,
                };
                if let Err(io_err) = logger.finish(&no_status) {
                    warn!("Failed to finalize run log: {io_err}");
                }
                return Err(e);
            }
        };

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let pid = child.id();

        let (done_tx, done_rx) = mpsc::channel();
        let mut readers = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, run_id, OutputStream::Stdout, &self.tx, &done_tx);
            readers += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, run_id, OutputStream::Stderr, &self.tx, &done_tx);
            readers += 1;
        }
        drop(done_tx);

        let tx = self.tx.clone();
        thread::spawn(move || wait_for_exit(child, run_id, readers, done_rx, tx));

        let now = Instant::now();
        info!("Started {name} run (pid {pid}): {command_line}");
        for listener in self.listeners.iter_mut() {
            listener.on_started(spec, logger.path());
            listener.on_progress(&Progress::initial(spec.expected_secs));
        }

        self.active = Some(ActiveRun {
            id: run_id,
            name: name.to_string(),
            pid,
            logger,
            started: now,
            expected_secs: spec.expected_secs,
            progress_timer: PeriodicTimer::start(self.settings.progress_interval, now),
            kill_deadline: None,
            killed: false,
        });
        self.state = RunState::Running;
        Ok(())
    }

    /// Ask the child to terminate
    ///
    /// Sends SIGTERM to the child's process group and returns immediately.
    /// If the child is still alive `stop_grace` later, `process_events`
    /// kills it. The run becomes Idle once the exit is delivered.
    pub fn stop(&mut self) -> Result<(), RunError> {
        let run = match (self.state, self.active.as_mut()) {
            (RunState::Running, Some(run)) => run,
            (RunState::Stopping, Some(_)) => return Ok(()),
            _ => return Err(RunError::NotRunning),
        };

        info!("Stopping… attempting graceful termination of pid {}", run.pid);
        if let Err(e) = signal_process_group(run.pid, libc::SIGTERM) {
            debug!("SIGTERM to process group {} failed: {e}", run.pid);
        }
        run.kill_deadline = Some(Instant::now() + self.settings.stop_grace);
        self.state = RunState::Stopping;

        for listener in self.listeners.iter_mut() {
            listener.on_stopping();
        }
        Ok(())
    }

    /// Deliver pending events and timer expiries for up to `wait`
    ///
    /// Returns early with the outcome if the run finished during the call.
    pub fn process_events(&mut self, wait: Duration) -> Option<RunOutcome> {
        let deadline = Instant::now() + wait;

        loop {
            let now = Instant::now();
            self.fire_timers(now);

            let mut timeout = deadline.saturating_duration_since(now);
            if let Some(next) = self.next_timer(now) {
                timeout = timeout.min(next);
            }

            let mut finished = None;
            match self.rx.recv_timeout(timeout) {
                Ok(event) => {
                    finished = self.handle_event(event);
                    while finished.is_none() {
                        match self.rx.try_recv() {
                            Ok(event) => finished = self.handle_event(event),
                            Err(_) => break,
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }

            if finished.is_some() {
                return finished;
            }
            if Instant::now() >= deadline {
                return None;
            }
        }
    }

    fn next_timer(&self, now: Instant) -> Option<Duration> {
        let run = self.active.as_ref()?;
        let progress = run.progress_timer.until_due(now);
        match run.kill_deadline {
            Some(deadline) if !run.killed => {
                Some(progress.min(deadline.saturating_duration_since(now)))
            }
            _ => Some(progress),
        }
    }

    fn fire_timers(&mut self, now: Instant) {
        let Some(run) = self.active.as_mut() else {
            return;
        };

        if run.progress_timer.fire(now) {
            let progress = Progress::compute(run.expected_secs, now - run.started);
            for listener in self.listeners.iter_mut() {
                listener.on_progress(&progress);
            }
        }

        if let Some(deadline) = run.kill_deadline {
            if !run.killed && now >= deadline {
                warn!(
                    "pid {} did not exit within {:?}, killing it",
                    run.pid, self.settings.stop_grace
                );
                if let Err(e) = signal_process_group(run.pid, libc::SIGKILL) {
                    debug!("SIGKILL to process group {} failed: {e}", run.pid);
                }
                run.killed = true;
            }
        }
    }

    fn handle_event(&mut self, event: RunEvent) -> Option<RunOutcome> {
        match event {
            RunEvent::Output {
                run_id,
                stream,
                bytes,
            } => {
                match self.active.as_mut() {
                    Some(run) if run.id == run_id => {
                        run.logger.write_output(&bytes);
                        for listener in self.listeners.iter_mut() {
                            listener.on_output(stream, &bytes);
                        }
                    }
                    _ => trace!("Dropping {} bytes from finished run {run_id}", bytes.len()),
                }
                None
            }
            RunEvent::Exited { run_id, exit } => {
                if self.active.as_ref().map(|run| run.id) != Some(run_id) {
                    trace!("Ignoring exit of finished run {run_id}");
                    return None;
                }
                let run = self.active.take()?;
                Some(self.finish_run(run, exit))
            }
        }
    }

    fn finish_run(&mut self, run: ActiveRun, exit: ExitInfo) -> RunOutcome {
        let elapsed = run.started.elapsed();
        let fallback_path = run.logger.path().to_path_buf();
        let log_path = run.logger.finish(&exit).unwrap_or_else(|e| {
            warn!("Failed to finalize {}: {e}", fallback_path.display());
            fallback_path
        });

        self.state = RunState::Idle;
        info!(
            "Process finished with return code: {} ({} after {:.1}s)",
            exit.footer(),
            run.name,
            elapsed.as_secs_f64()
        );

        let outcome = RunOutcome {
            name: run.name,
            exit,
            log_path,
            elapsed,
        };
        for listener in self.listeners.iter_mut() {
            listener.on_progress(&Progress::Idle);
            listener.on_exit(&outcome);
        }
        outcome
    }
}

impl Drop for RunSupervisor {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            warn!("Supervisor dropped with pid {} still running, killing it", run.pid);
            let _ = signal_process_group(run.pid, libc::SIGKILL);
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    run_id: u64,
    kind: OutputStream,
    tx: &Sender<RunEvent>,
    done: &Sender<()>,
) {
    let tx = tx.clone();
    let done = done.clone();
    thread::spawn(move || {
        forward_stream(stream, run_id, kind, &tx);
        let _ = done.send(());
    });
}

/// Forward raw chunks from one pipe until EOF
fn forward_stream<R: Read>(mut stream: R, run_id: u64, kind: OutputStream, tx: &Sender<RunEvent>) {
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                let event = RunEvent::Output {
                    run_id,
                    stream: kind,
                    bytes: buffer[..n].to_vec(),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Error reading {kind:?} of run {run_id}: {e}");
                break;
            }
        }
    }
    trace!("{kind:?} of run {run_id} closed");
}

/// Reap the child, let the readers drain, then report the exit
fn wait_for_exit(
    mut child: Child,
    run_id: u64,
    readers: usize,
    done: Receiver<()>,
    tx: Sender<RunEvent>,
) {
    let exit = match child.wait() {
        Ok(status) => ExitInfo::from_status(status),
        Err(e) => {
            warn!("Failed to wait for run {run_id}: {e}");
            ExitInfo {
                code: None,
                signal: None,
            }
        }
    };

    let deadline = Instant::now() + DRAIN_GRACE;
    for _ in 0..readers {
        let left = deadline.saturating_duration_since(Instant::now());
        if done.recv_timeout(left).is_err() {
            debug!("Output of run {run_id} still open after exit, not waiting for it");
            break;
        }
    }

    let _ = tx.send(RunEvent::Exited { run_id, exit });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_footer() {
        let clean = ExitInfo {
            code: Some(0),
            signal: None,
        };
        assert_eq!(clean.footer(), "0");
        assert!(clean.success());

        let killed = ExitInfo {
            code: None,
            signal: Some(9),
        };
        assert_eq!(killed.footer(), "-1 (signal 9)");
        assert_eq!(killed.display_code(), -1);
        assert!(!killed.success());
    }

    #[test]
    fn test_stop_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = RunSupervisor::new(SupervisorSettings::new(dir.path().to_path_buf()));
        assert!(matches!(supervisor.stop(), Err(RunError::NotRunning)));
        assert_eq!(supervisor.state(), RunState::Idle);
        assert_eq!(supervisor.progress(), Progress::Idle);
    }

    #[test]
    fn test_empty_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = RunSupervisor::new(SupervisorSettings::new(dir.path().to_path_buf()));
        let err = supervisor.start("cpu", &CommandSpec::new(vec![], None)).unwrap_err();
        assert!(matches!(err, RunError::InputInvalid(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
