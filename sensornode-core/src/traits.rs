//! Collaborator traits
//!
//! The pipeline talks to hardware, storage and network only through these
//! traits. Each one is used by exactly one task, so none of them needs to be
//! `Sync`. Keep them simple: drivers behind them are thin, synchronous calls.

use core::time::Duration;

use crate::backoff::Outcome;
use crate::errors::{InitResult, LogWriteError};
use crate::record::LogRecord;
use crate::sample::Sample;
use crate::telemetry::Endpoint;

/// Source of analog and digital readings
pub trait ChannelReader {
    /// One-time driver setup. Failure is fatal.
    fn setup(&mut self) -> InitResult<()> {
        Ok(())
    }

    /// Read every channel once. Calibration happens behind this call.
    fn read(&mut self) -> Sample;
}

/// Append-only record storage
pub trait LogStorage {
    /// Make the medium available. Failure is fatal.
    fn mount(&mut self) -> InitResult<()>;

    /// Release the medium. Appends fail afterwards.
    fn unmount(&mut self);

    /// Whether appends can currently succeed
    fn is_mounted(&self) -> bool;

    /// Append one record to the named log, creating it if needed
    fn append(&mut self, log_name: &str, record: &LogRecord) -> Result<(), LogWriteError>;
}

/// One-shot request/response transport
pub trait Transport {
    /// Resolve, connect, send `request`, read until close, classify.
    ///
    /// Must return in bounded time for every outcome.
    fn send(&mut self, endpoint: &Endpoint<'_>, request: &str) -> Outcome;
}

/// Blocking pause between reporting iterations
pub trait Delay {
    /// Suspend the calling task for `duration`
    fn delay(&mut self, duration: Duration);
}

impl<T: ChannelReader + ?Sized> ChannelReader for &mut T {
    fn setup(&mut self) -> InitResult<()> {
        (**self).setup()
    }

    fn read(&mut self) -> Sample {
        (**self).read()
    }
}

impl<T: LogStorage + ?Sized> LogStorage for &mut T {
    fn mount(&mut self) -> InitResult<()> {
        (**self).mount()
    }

    fn unmount(&mut self) {
        (**self).unmount()
    }

    fn is_mounted(&self) -> bool {
        (**self).is_mounted()
    }

    fn append(&mut self, log_name: &str, record: &LogRecord) -> Result<(), LogWriteError> {
        (**self).append(log_name, record)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, endpoint: &Endpoint<'_>, request: &str) -> Outcome {
        (**self).send(endpoint, request)
    }
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}
