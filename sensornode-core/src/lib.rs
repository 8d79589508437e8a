//! Acquisition and reporting pipeline for SensorNode
//!
//! A hardware timer marks every sampling period. The acquisition task reads
//! the channels, hands the newest sample to the reporting task through a
//! single-slot mailbox and appends a log record to local storage. The
//! reporting task drains the mailbox on its own cadence and forwards the
//! sample to a telemetry endpoint, backing off by failure class.
//!
//! ```text
//!  timer ISR ──► PeriodElapsed ──► AcquisitionTask ──┬──► LogStorage
//!                                                    │
//!                                                    └──► Mailbox ──► ReportingTask ──► Transport
//! ```
//!
//! Key constraints:
//! - The interrupt path only sets a flag and wakes a task
//! - No heap allocation in the acquisition hot path
//! - Local records are written every period, telemetry is best-effort
//!
//! ```no_run
//! use sensornode_core::{Mailbox, Sample, DigitalInputs};
//!
//! let mailbox = Mailbox::new();
//! mailbox.produce(Sample::new([1000, 1050, 900, 1200], DigitalInputs::new(0b0101)));
//!
//! if let Some(sample) = mailbox.try_consume() {
//!     // forward to telemetry
//!     let _ = sample.analog();
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod acquisition;
pub mod backoff;
pub mod context;
pub mod errors;
pub mod mailbox;
pub mod record;
pub mod reporting;
pub mod sample;
pub mod telemetry;
pub mod traits;
pub mod trigger;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod runtime;
#[cfg(feature = "std")]
pub mod storage;

// Public API
pub use acquisition::{AcquisitionState, AcquisitionStats, AcquisitionTask, CycleReport};
pub use backoff::{BackoffPolicy, Delivery, Outcome, TransportFailure};
pub use context::NodeContext;
pub use errors::{InitError, InitResult, LogWriteError};
pub use mailbox::{Handoff, Mailbox, MailboxConfig};
pub use record::{LogFormat, LogRecord};
pub use reporting::{Iteration, ReportingStats, ReportingTask};
pub use sample::{DigitalInputs, Sample, ANALOG_CHANNELS, DIGITAL_CHANNELS};
pub use telemetry::{Endpoint, TelemetryPayload, TelemetryRequest};
pub use traits::{ChannelReader, Delay, LogStorage, Transport};
pub use trigger::{NoWake, PeriodElapsed, TimerConfig, Wake};

#[cfg(feature = "std")]
pub use config::{ConfigError, NodeConfig};
#[cfg(feature = "std")]
pub use runtime::{ParkDelay, PeriodicTimer, ThreadWaker};
#[cfg(feature = "std")]
pub use storage::{DirectoryStorage, MemoryStorage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
