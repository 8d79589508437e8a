//! Filesystem log storage
//!
//! The mount point must already exist: on the device it is the SD card
//! mount, and a missing card is a start-up failure. Each append opens the
//! log in append mode, writes one record and closes it again, so a power
//! cut loses at most the record being written.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{InitError, InitResult, LogWriteError};
use crate::record::LogRecord;
use crate::traits::LogStorage;

/// Append counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Records appended
    pub appends: u64,
    /// Bytes appended
    pub bytes_written: u64,
    /// Appends that failed
    pub failures: u64,
}

/// Logs stored as files under a mount point
#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    mounted: bool,
    stats: StorageStats,
}

impl DirectoryStorage {
    /// Storage rooted at `root`. Nothing is touched until `mount`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
            stats: StorageStats::default(),
        }
    }

    /// Mount point
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a log
    pub fn path_for(&self, log_name: &str) -> PathBuf {
        self.root.join(log_name)
    }

    /// Counters
    pub fn stats(&self) -> StorageStats {
        self.stats
    }

    fn write_record(&self, log_name: &str, record: &LogRecord) -> Result<(), LogWriteError> {
        let path = self.path_for(log_name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                log::warn!("Cannot open {}: {}", path.display(), e);
                LogWriteError::Open
            })?;

        file.write_all(record.as_bytes()).map_err(|e| {
            log::warn!("Cannot write {}: {}", path.display(), e);
            LogWriteError::Write
        })
    }
}

impl LogStorage for DirectoryStorage {
    fn mount(&mut self) -> InitResult<()> {
        let metadata = fs::metadata(&self.root).map_err(|_| InitError::StorageMount {
            reason: "mount point not found",
        })?;
        if !metadata.is_dir() {
            return Err(InitError::StorageMount {
                reason: "mount point is not a directory",
            });
        }
        if metadata.permissions().readonly() {
            return Err(InitError::StorageMount {
                reason: "mount point is read-only",
            });
        }

        self.mounted = true;
        log::info!("Storage mounted at {}", self.root.display());
        Ok(())
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            log::info!("Storage unmounted from {}", self.root.display());
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn append(&mut self, log_name: &str, record: &LogRecord) -> Result<(), LogWriteError> {
        if !self.mounted {
            self.stats.failures += 1;
            return Err(LogWriteError::NotMounted);
        }

        match self.write_record(log_name, record) {
            Ok(()) => {
                self.stats.appends += 1;
                self.stats.bytes_written += record.as_bytes().len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }
}
