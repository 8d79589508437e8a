//! Acquisition Task
//!
//! Two states, driven by the period-elapsed flag:
//!
//! ```text
//!            trigger flag set
//! WaitingForTrigger ─────────────► Sampling
//!        ▲                            │ read channels
//!        │                            │ produce into mailbox
//!        └────────────────────────────┘ append log record
//! ```
//!
//! The flag is cleared before the channels are read, so an alarm that fires
//! while sampling is kept for the next cycle. The log record is written
//! whatever happened to the mailbox hand-off: persistence never depends on
//! telemetry. A failed append skips this cycle's record and nothing else.

use core::convert::Infallible;

use crate::context::NodeContext;
use crate::errors::LogWriteError;
use crate::mailbox::Handoff;
use crate::record::{LogFormat, LogRecord};
use crate::sample::Sample;
use crate::traits::{ChannelReader, LogStorage};
use crate::trigger::{NoWake, Wake};

/// Default log resource name
pub const DEFAULT_LOG_NAME: &str = "record.txt";

/// Where the task is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Suspended until the next period elapses
    WaitingForTrigger,
    /// Reading channels and fanning out the sample
    Sampling,
}

/// What one sampling pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Sample read this cycle
    pub sample: Sample,
    /// Mailbox hand-off result
    pub handoff: Handoff,
    /// Log append result
    pub logged: Result<(), LogWriteError>,
}

/// Acquisition counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Sampling passes completed
    pub cycles: u32,
    /// Records appended
    pub records_written: u32,
    /// Records skipped because the sink failed
    pub log_failures: u32,
    /// Samples not handed to the mailbox because of contention
    pub handoffs_skipped: u32,
}

/// Trigger-driven sampler feeding the mailbox and the log
pub struct AcquisitionTask<'a, R, S, W: Wake = NoWake> {
    context: &'a NodeContext<W>,
    reader: R,
    storage: S,
    log_name: &'a str,
    format: LogFormat,
    state: AcquisitionState,
    stats: AcquisitionStats,
}

impl<'a, R, S, W> AcquisitionTask<'a, R, S, W>
where
    R: ChannelReader,
    S: LogStorage,
    W: Wake,
{
    /// Task writing legacy-format records to `log_name`
    pub fn new(context: &'a NodeContext<W>, reader: R, storage: S, log_name: &'a str) -> Self {
        Self {
            context,
            reader,
            storage,
            log_name,
            format: LogFormat::Legacy,
            state: AcquisitionState::WaitingForTrigger,
            stats: AcquisitionStats::default(),
        }
    }

    /// Select the record layout
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Run one cycle if a period has elapsed.
    ///
    /// `WouldBlock` while waiting, so bare-metal loops can `nb::block!` on it.
    pub fn poll_cycle(&mut self) -> nb::Result<CycleReport, Infallible> {
        self.context.trigger().poll()?;
        Ok(self.on_period())
    }

    /// Sampling pass. The caller has already cleared the trigger flag.
    pub fn on_period(&mut self) -> CycleReport {
        self.state = AcquisitionState::Sampling;

        let sample = self.reader.read();
        log_debug!(
            "Sampled analog={:?} mV digital={:#06b}",
            sample.analog(),
            sample.digital().bits()
        );

        let handoff = self.context.mailbox().produce(sample);
        if handoff == Handoff::Contended {
            self.stats.handoffs_skipped = self.stats.handoffs_skipped.wrapping_add(1);
            log_warn!("Mailbox busy, telemetry hand-off skipped this cycle");
        }

        let logged = self.write_record(&sample);

        self.stats.cycles = self.stats.cycles.wrapping_add(1);
        self.state = AcquisitionState::WaitingForTrigger;

        CycleReport {
            sample,
            handoff,
            logged,
        }
    }

    #[allow(unused_variables)]
    fn write_record(&mut self, sample: &Sample) -> Result<(), LogWriteError> {
        let result = LogRecord::encode(sample, self.format)
            .and_then(|record| self.storage.append(self.log_name, &record));

        match result {
            Ok(()) => {
                self.stats.records_written = self.stats.records_written.wrapping_add(1);
            }
            Err(e) => {
                self.stats.log_failures = self.stats.log_failures.wrapping_add(1);
                log_warn!("Skipping log record this cycle: {}", e);
            }
        }
        result
    }

    /// Current state
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Counters
    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    /// Shared context
    pub fn context(&self) -> &'a NodeContext<W> {
        self.context
    }

    /// Storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give back the collaborators, e.g. to unmount storage at shutdown
    pub fn into_parts(self) -> (R, S) {
        (self.reader, self.storage)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::errors::InitResult;
    use crate::sample::DigitalInputs;
    use std::string::String;
    use std::vec::Vec;

    struct Fixed(Sample);

    impl ChannelReader for Fixed {
        fn read(&mut self) -> Sample {
            self.0
        }
    }

    #[derive(Default)]
    struct Sink {
        mounted: bool,
        lines: Vec<String>,
    }

    impl LogStorage for Sink {
        fn mount(&mut self) -> InitResult<()> {
            self.mounted = true;
            Ok(())
        }

        fn unmount(&mut self) {
            self.mounted = false;
        }

        fn is_mounted(&self) -> bool {
            self.mounted
        }

        fn append(&mut self, _log_name: &str, record: &LogRecord) -> Result<(), LogWriteError> {
            if !self.mounted {
                return Err(LogWriteError::NotMounted);
            }
            self.lines.push(record.as_str().into());
            Ok(())
        }
    }

    fn reference() -> Sample {
        Sample::new([1000, 1050, 900, 1200], DigitalInputs::new(0b0101))
    }

    #[test]
    fn waits_until_triggered() {
        let context = NodeContext::default();
        let mut task = AcquisitionTask::new(&context, Fixed(reference()), Sink::default(), DEFAULT_LOG_NAME);

        assert!(matches!(task.poll_cycle(), Err(nb::Error::WouldBlock)));
        assert_eq!(task.state(), AcquisitionState::WaitingForTrigger);
        assert_eq!(task.stats().cycles, 0);
    }

    #[test]
    fn cycle_fans_out_to_mailbox_and_log() {
        let context = NodeContext::default();
        let mut sink = Sink::default();
        sink.mount().unwrap();
        let mut task = AcquisitionTask::new(&context, Fixed(reference()), &mut sink, DEFAULT_LOG_NAME)
            .with_format(LogFormat::Compact);

        context.on_timer_interrupt();
        let report = task.poll_cycle().unwrap();

        assert_eq!(report.handoff, Handoff::Delivered);
        assert_eq!(report.logged, Ok(()));
        assert_eq!(task.state(), AcquisitionState::WaitingForTrigger);
        drop(task);

        assert_eq!(context.mailbox().try_consume(), Some(reference()));
        assert_eq!(sink.lines, ["1000,1050,900,1200\n1,0,1,0\n"]);
    }

    #[test]
    fn log_failure_does_not_stop_handoff() {
        let context = NodeContext::default();
        let mut task = AcquisitionTask::new(&context, Fixed(reference()), Sink::default(), DEFAULT_LOG_NAME);

        context.on_timer_interrupt();
        let report = task.poll_cycle().unwrap();

        assert_eq!(report.logged, Err(LogWriteError::NotMounted));
        assert_eq!(task.stats().log_failures, 1);
        assert!(task.storage().lines.is_empty());
        assert!(context.mailbox().has_data());
    }

    #[test]
    fn trigger_during_sampling_is_kept() {
        struct Retrigger<'a>(&'a NodeContext);

        impl ChannelReader for Retrigger<'_> {
            fn read(&mut self) -> Sample {
                self.0.on_timer_interrupt();
                Sample::default()
            }
        }

        let context = NodeContext::default();
        let mut task = AcquisitionTask::new(&context, Retrigger(&context), Sink::default(), DEFAULT_LOG_NAME);

        context.on_timer_interrupt();
        assert!(task.poll_cycle().is_ok());
        assert!(task.poll_cycle().is_ok());
        assert_eq!(task.stats().cycles, 2);
    }
}
