use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Expand `~` and environment variables in a path string
pub fn expand_path_str(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| path.into())
        .into_owned()
}

/// Expand a PathBuf with `~` and environment variables
pub fn expand_path_buf(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_path_str(&path_str))
}

/// Expand `path` and anchor it at `base_dir` if it is relative
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let expanded = expand_path_buf(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

/// Create a directory and all parent directories if they don't exist
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
        debug!("Created directory: {path:?}");
    }
    Ok(())
}

/// Run logs in `dir`, newest first
pub fn list_logs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut logs: Vec<(SystemTime, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.extension()? != "log" {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, path))
        })
        .collect();

    logs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(logs.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_expand_path_str() {
        assert_eq!(expand_path_str("/tmp/test"), "/tmp/test");

        env::set_var("STRESSKIT_TEST_PATH", "/test/path");
        let result = expand_path_buf(Path::new("$STRESSKIT_TEST_PATH/file"));
        assert_eq!(result, PathBuf::from("/test/path/file"));
        env::remove_var("STRESSKIT_TEST_PATH");
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        let home = env::var("HOME").unwrap();
        let result = expand_path_str("~/HardwareStressTest/logs");
        assert_eq!(result, format!("{home}/HardwareStressTest/logs"));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/etc/stresskit");
        assert_eq!(
            resolve_path(Path::new("/var/log/stress"), base),
            PathBuf::from("/var/log/stress")
        );
        assert_eq!(
            resolve_path(Path::new("logs"), base),
            PathBuf::from("/etc/stresskit/logs")
        );
    }

    #[test]
    fn test_ensure_directory() {
        let tempdir = tempdir().unwrap();
        let nested_dir = tempdir.path().join("nested").join("path");

        ensure_directory(&nested_dir).unwrap();
        assert!(nested_dir.is_dir());

        // Existing dir
        ensure_directory(&nested_dir).unwrap();
        assert!(nested_dir.is_dir());
    }

    #[test]
    fn test_list_logs() {
        let tempdir = tempdir().unwrap();
        assert!(list_logs(&tempdir.path().join("missing")).unwrap().is_empty());

        fs::write(tempdir.path().join("cpu_2025-01-01_00-00-00.log"), "a").unwrap();
        fs::write(tempdir.path().join("notes.txt"), "b").unwrap();
        fs::write(tempdir.path().join("disk_2025-01-02_00-00-00.log"), "c").unwrap();

        let logs = list_logs(tempdir.path()).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs
            .iter()
            .all(|p| p.extension().map(|e| e == "log").unwrap_or(false)));
    }
}
