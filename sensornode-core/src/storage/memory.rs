//! In-memory log storage
//!
//! Keeps every log as a `String`. Appends can be made to fail on demand to
//! exercise the skip-this-cycle path.

use std::collections::HashMap;

use crate::errors::{InitError, InitResult, LogWriteError};
use crate::record::{LogFormat, LogRecord};
use crate::sample::Sample;
use crate::traits::LogStorage;

/// Logs kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    logs: HashMap<String, String>,
    mounted: bool,
    refuse_mount: bool,
    fail_appends: u32,
}

impl MemoryStorage {
    /// Empty, unmounted storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose `mount` always fails
    pub fn unmountable() -> Self {
        Self {
            refuse_mount: true,
            ..Self::default()
        }
    }

    /// Make the next `count` appends fail with [`LogWriteError::Write`]
    pub fn fail_next_appends(&mut self, count: u32) {
        self.fail_appends = count;
    }

    /// Raw text of a log
    pub fn contents(&self, log_name: &str) -> Option<&str> {
        self.logs.get(log_name).map(String::as_str)
    }

    /// Decoded samples of a log, oldest first
    pub fn samples(&self, log_name: &str, format: LogFormat) -> Vec<Sample> {
        self.contents(log_name)
            .map(|text| super::decode_log(text, format))
            .unwrap_or_default()
    }
}

impl LogStorage for MemoryStorage {
    fn mount(&mut self) -> InitResult<()> {
        if self.refuse_mount {
            return Err(InitError::StorageMount {
                reason: "medium not present",
            });
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn append(&mut self, log_name: &str, record: &LogRecord) -> Result<(), LogWriteError> {
        if !self.mounted {
            return Err(LogWriteError::NotMounted);
        }
        if self.fail_appends > 0 {
            self.fail_appends -= 1;
            return Err(LogWriteError::Write);
        }

        self.logs
            .entry(log_name.to_owned())
            .or_default()
            .push_str(record.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::DigitalInputs;

    #[test]
    fn injected_failures_run_out() {
        let mut storage = MemoryStorage::new();
        storage.mount().unwrap();
        storage.fail_next_appends(1);

        let sample = Sample::new([3; 4], DigitalInputs::new(0));
        let record = LogRecord::encode(&sample, LogFormat::Legacy).unwrap();

        assert_eq!(storage.append("log", &record), Err(LogWriteError::Write));
        assert_eq!(storage.append("log", &record), Ok(()));
        assert_eq!(storage.samples("log", LogFormat::Legacy), vec![sample]);
    }

    #[test]
    fn unmountable_storage_fails_mount() {
        let mut storage = MemoryStorage::unmountable();
        assert!(storage.mount().is_err());
        assert!(!storage.is_mounted());
    }
}
