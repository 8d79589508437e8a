//! Error Tiers for the Acquisition Pipeline
//!
//! The node distinguishes two kinds of failure and keeps them as separate
//! types so they cannot be propagated through the same path:
//!
//! ### Initialization (`InitError`)
//! Timer setup, storage mount, channel reader setup, configuration. Any of
//! these is fatal: the entry point halts before the tasks start. A node that
//! cannot sample or cannot log has no useful degraded mode.
//!
//! ### Steady state
//! Raised inside the task loops and always absorbed there:
//! - `LogWriteError`: one cycle's record is skipped, the next period retries
//!   with a fresh record.
//! - Mailbox contention: reported as `Handoff::Contended` / an empty consume.
//! - Transport failures: classified into `backoff::TransportFailure` and
//!   turned into a pacing delay.
//!
//! All variants are `Copy` and carry only `&'static str` context so they can
//! be returned from interrupt-adjacent code without allocating.
//!
//! ```rust
//! use sensornode_core::{InitError, TimerConfig};
//!
//! fn start(config: &TimerConfig) -> Result<(), InitError> {
//!     config.validate()?;
//!     Ok(())
//! }
//!
//! assert!(start(&TimerConfig::default()).is_ok());
//! ```

use thiserror_no_std::Error;

/// Result type for initialization steps
pub type InitResult<T> = Result<T, InitError>;

/// Fatal start-up errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// Hardware timer could not be configured
    #[error("Timer configuration failed: {reason}")]
    Timer {
        /// What was wrong with the timer setup
        reason: &'static str,
    },

    /// Storage backend could not be mounted
    #[error("Storage mount failed: {reason}")]
    StorageMount {
        /// Backend-specific cause
        reason: &'static str,
    },

    /// Channel reader could not be set up
    #[error("Channel reader setup failed: {reason}")]
    ChannelReader {
        /// Driver-specific cause
        reason: &'static str,
    },

    /// Configuration rejected before any subsystem started
    #[error("Invalid configuration: {reason}")]
    Config {
        /// Offending setting
        reason: &'static str,
    },
}

/// Log sink failure for a single acquisition cycle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogWriteError {
    /// Storage is not mounted
    #[error("Storage not mounted")]
    NotMounted,

    /// Log could not be opened for append
    #[error("Cannot open log")]
    Open,

    /// Write or flush failed part-way
    #[error("Log write failed")]
    Write,

    /// Record did not fit the encoding buffer
    #[error("Record encoding overflow")]
    Encode,
}

#[cfg(feature = "defmt")]
impl defmt::Format for InitError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Timer { reason } => defmt::write!(fmt, "Timer: {}", reason),
            Self::StorageMount { reason } => defmt::write!(fmt, "Storage mount: {}", reason),
            Self::ChannelReader { reason } => defmt::write!(fmt, "Channel reader: {}", reason),
            Self::Config { reason } => defmt::write!(fmt, "Config: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LogWriteError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotMounted => defmt::write!(fmt, "Storage not mounted"),
            Self::Open => defmt::write!(fmt, "Cannot open log"),
            Self::Write => defmt::write!(fmt, "Log write failed"),
            Self::Encode => defmt::write!(fmt, "Record encoding overflow"),
        }
    }
}
