use chrono::{DateTime, Local};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::benchmarks::supervisor::ExitInfo;
use crate::benchmarks::RunError;
use crate::path_utils;
use crate::APP_NAME;

/// Per-run log file
///
/// Holds the header, every byte the child wrote, and an exit footer. The
/// file is flushed and released by `finish`, or by `Drop` on any path that
/// never reaches it.
pub struct RunLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl RunLogger {
    /// Create `{log_dir}/{name}_{timestamp}.log` and write the header
    pub fn create(log_dir: &Path, name: &str, command_line: &str) -> Result<Self, RunError> {
        let now = Local::now();
        let path = log_path(log_dir, name, &now);
        let open_err = |source| RunError::LogOpen {
            path: path.clone(),
            source,
        };

        path_utils::ensure_directory(log_dir).map_err(open_err)?;
        let file = File::create(&path).map_err(open_err)?;
        let mut writer = BufWriter::new(file);

        write!(
            writer,
            "{APP_NAME} Log - {}\nCommand: {command_line}\n\n",
            now.format("%Y-%m-%dT%H:%M:%S")
        )
        .and_then(|_| writer.flush())
        .map_err(open_err)?;

        debug!("Opened run log {}", path.display());
        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw child output
    ///
    /// Write failures are reported but never abort the run.
    pub fn write_output(&mut self, bytes: &[u8]) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write_all(bytes) {
                warn!("Failed to write to {}: {e}", self.path.display());
            }
        }
    }

    /// Append a line written by us rather than by the child
    pub fn write_note(&mut self, note: &str) {
        self.write_output(format!("\n{note}\n").as_bytes());
    }

    /// Write the exit footer and close the file
    pub fn finish(mut self, exit: &ExitInfo) -> io::Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            write!(writer, "\n[exit] {}\n", exit.footer())?;
            writer.flush()?;
        }
        debug!("Closed run log {}", self.path.display());
        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush {}: {e}", self.path.display());
            }
        }
    }
}

fn log_path(log_dir: &Path, name: &str, now: &DateTime<Local>) -> PathBuf {
    log_dir.join(format!("{name}_{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_log_path_format() {
        let now = Local.with_ymd_and_hms(2025, 9, 6, 14, 5, 9).unwrap();
        let path = log_path(Path::new("/logs"), "disk", &now);
        assert_eq!(path, PathBuf::from("/logs/disk_2025-09-06_14-05-09.log"));
    }

    #[test]
    fn test_header_output_footer() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("nested/logs");

        let mut logger = RunLogger::create(&log_dir, "cpu", "stress-ng --cpu 2 --timeout 5s").unwrap();
        assert!(log_dir.exists());
        logger.write_output(b"stress-ng: info: dispatching hogs\n");
        logger.write_output(b"partial");
        let path = logger
            .finish(&ExitInfo {
                code: Some(0),
                signal: None,
            })
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&format!("{APP_NAME} Log - ")));
        assert!(contents.contains("Command: stress-ng --cpu 2 --timeout 5s\n\n"));
        assert!(contents.ends_with("dispatching hogs\npartial\n[exit] 0\n"));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("cpu_"));
    }

    #[test]
    fn test_drop_flushes() {
        let dir = tempdir().unwrap();
        let path = {
            let mut logger = RunLogger::create(dir.path(), "gpu", "glmark2").unwrap();
            logger.write_output(b"buffered bytes");
            logger.path().to_path_buf()
        };
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.ends_with("buffered bytes"));
    }

    #[test]
    fn test_unwritable_directory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = RunLogger::create(&blocker, "cpu", "stress-ng").err().unwrap();
        assert!(matches!(err, RunError::LogOpen { .. }));
    }
}
