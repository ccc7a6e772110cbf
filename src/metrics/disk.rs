use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::metrics::{MetricSample, SamplingError};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// The parts of `statvfs(3)` needed for a usage reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    /// Size of the filesystem in fragments
    pub blocks: u64,
    pub fragment_size: u64,
    /// Free fragments available to unprivileged users
    pub available_blocks: u64,
}

impl FsStats {
    /// Query filesystem statistics for the mount containing `path`
    pub fn query(path: &Path) -> Result<Self, SamplingError> {
        let statvfs_err = |source| SamplingError::Statvfs {
            path: path.to_path_buf(),
            source,
        };
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| statvfs_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        // SAFETY: `c_path` is a valid NUL-terminated string and `stat` is a
        // plain C struct that statvfs fills in.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(statvfs_err(io::Error::last_os_error()));
        }

        Ok(Self {
            blocks: stat.f_blocks as u64,
            fragment_size: stat.f_frsize as u64,
            available_blocks: stat.f_bavail as u64,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.blocks.saturating_mul(self.fragment_size)
    }

    pub fn available_bytes(&self) -> u64 {
        self.available_blocks.saturating_mul(self.fragment_size)
    }

    /// Usage fraction with used/total in GiB
    ///
    /// Blocks reserved for root count as used.
    pub fn sample(&self) -> MetricSample {
        let total = self.total_bytes();
        let used = total.saturating_sub(self.available_bytes());
        MetricSample::from_used_total(used, total, BYTES_PER_GIB)
    }
}
