//! Terminal presentation of a run

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::benchmarks::{CommandSpec, OutputStream, Progress, RunListener, RunOutcome};

const SPINNER_TICK: Duration = Duration::from_millis(120);

fn started_line(spec: &CommandSpec) -> String {
    format!("Starting: {}", spec.command_line())
}

fn finished_line(outcome: &RunOutcome) -> String {
    format!(
        "Process finished with return code: {}",
        outcome.exit.display_code()
    )
}

/// Streams a run to the terminal under a progress bar or spinner
pub struct ConsoleView {
    bar: ProgressBar,
    bar_style: ProgressStyle,
    spinner_style: ProgressStyle,
}

impl ConsoleView {
    pub fn new(bar: ProgressBar) -> Result<Self> {
        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}s {msg}")?
            .progress_chars("=> ");
        let spinner_style = ProgressStyle::default_spinner().template("{spinner} {msg}")?;
        Ok(Self {
            bar,
            bar_style,
            spinner_style,
        })
    }

    /// Print a line without tearing the progress display
    pub fn println(bar: &ProgressBar, text: &str) {
        bar.suspend(|| println!("{text}"));
    }
}

impl RunListener for ConsoleView {
    fn on_started(&mut self, spec: &CommandSpec, log_path: &Path) {
        Self::println(&self.bar, &started_line(spec));
        Self::println(&self.bar, &format!("Logging to {}", log_path.display()));

        match spec.expected_secs {
            Some(total) => {
                self.bar.set_style(self.bar_style.clone());
                self.bar.set_length(total);
                self.bar.set_position(0);
            }
            None => {
                self.bar.set_style(self.spinner_style.clone());
                self.bar.enable_steady_tick(SPINNER_TICK);
            }
        }
    }

    fn on_output(&mut self, _stream: OutputStream, bytes: &[u8]) {
        self.bar.suspend(|| {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
                warn!("Failed to forward output: {e}");
            }
        });
    }

    fn on_progress(&mut self, progress: &Progress) {
        match *progress {
            Progress::Pending { .. } => self.bar.set_position(0),
            Progress::Determinate { elapsed, .. } => self.bar.set_position(elapsed),
            Progress::Indeterminate => {}
            Progress::Idle => {
                self.bar.finish_and_clear();
                return;
            }
        }
        self.bar.set_message(progress.eta_text());
    }

    fn on_stopping(&mut self) {
        Self::println(&self.bar, "Stopping… attempting graceful termination.");
        self.bar.set_message("Stopping…");
    }

    fn on_exit(&mut self, outcome: &RunOutcome) {
        self.bar.finish_and_clear();
        println!("{}", finished_line(outcome));
        println!(
            "{} run took {:.1}s, log saved to {}",
            outcome.name,
            outcome.elapsed.as_secs_f64(),
            outcome.log_path.display()
        );
    }
}

/// Keeps a copy of the streamed output in a user-chosen file
pub struct OutputCapture {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OutputCapture {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.writer.write_all(bytes) {
            warn!("Failed to write {}: {e}", self.path.display());
        }
    }
}

impl RunListener for OutputCapture {
    fn on_started(&mut self, spec: &CommandSpec, _log_path: &Path) {
        self.write(format!("{}\n", started_line(spec)).as_bytes());
    }

    fn on_output(&mut self, _stream: OutputStream, bytes: &[u8]) {
        self.write(bytes);
    }

    fn on_exit(&mut self, outcome: &RunOutcome) {
        self.write(format!("\n{}\n", finished_line(outcome)).as_bytes());
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::ExitInfo;
    use tempfile::tempdir;

    fn outcome(code: Option<i32>, signal: Option<i32>) -> RunOutcome {
        RunOutcome {
            name: "cpu".to_string(),
            exit: ExitInfo { code, signal },
            log_path: PathBuf::from("/tmp/cpu.log"),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_finished_line() {
        assert_eq!(
            finished_line(&outcome(Some(3), None)),
            "Process finished with return code: 3"
        );
        assert_eq!(
            finished_line(&outcome(None, Some(9))),
            "Process finished with return code: -1"
        );
    }

    #[test]
    fn test_output_capture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.txt");
        let spec = CommandSpec::new(
            vec!["stress-ng".into(), "--cpu".into(), "2".into()],
            Some(5),
        );

        let mut capture = OutputCapture::create(&path).unwrap();
        capture.on_started(&spec, Path::new("/tmp/cpu.log"));
        capture.on_output(OutputStream::Stdout, b"tick\n");
        capture.on_output(OutputStream::Stderr, b"warn\n");
        capture.on_exit(&outcome(Some(0), None));

        let saved = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            saved,
            "Starting: stress-ng --cpu 2\ntick\nwarn\n\nProcess finished with return code: 0\n"
        );
    }

    #[test]
    fn test_output_capture_bad_path() {
        let dir = tempdir().unwrap();
        assert!(OutputCapture::create(&dir.path().join("missing").join("out.txt")).is_err());
    }

    #[test]
    fn test_console_view_tracks_progress() {
        let bar = ProgressBar::hidden();
        let mut view = ConsoleView::new(bar.clone()).unwrap();
        let spec = CommandSpec::new(vec!["true".into()], Some(60));

        view.on_started(&spec, Path::new("/tmp/x.log"));
        assert_eq!(bar.length(), Some(60));

        view.on_progress(&Progress::Determinate {
            elapsed: 12,
            total: 60,
            remaining: 48,
        });
        assert_eq!(bar.position(), 12);
        assert_eq!(bar.message(), "ETA: 00:48");

        view.on_progress(&Progress::Idle);
        assert!(bar.is_finished());
    }
}
