//! Single-Slot Mailbox Between Acquisition and Reporting
//!
//! ## Overview
//!
//! Telemetry is a "latest value" feed. The acquisition task is the only
//! writer, the reporting task the only reader, and the slot holds at most
//! one sample:
//!
//! ```text
//! AcquisitionTask                         ReportingTask
//!      │ produce(B)                             │ try_consume()
//!      ▼                                        ▼
//!   ┌──────── guard (spin::Mutex) ────────┐
//!   │  slot: Sample          ready: bool  │
//!   └─────────────────────────────────────┘
//! ```
//!
//! A write always replaces whatever is in the slot. If the reader did not
//! drain between two writes, the older sample is dropped and counted in
//! [`MailboxStats::overwritten`]. The persistent log is the audit trail, not
//! this mailbox.
//!
//! ## Two primitives
//!
//! - The **guard** protects the slot contents. A consumer never sees fields
//!   from two different `produce` calls.
//! - The **ready flag** says whether the slot holds an unread sample. It is
//!   only modified while the guard is held, and may be read without it as a
//!   cheap emptiness check.
//!
//! ## Bounded waits
//!
//! Neither side blocks indefinitely. Both acquire the guard through a
//! bounded number of `try_lock` attempts:
//! - `produce` gives up with [`Handoff::Contended`]; the acquisition cycle
//!   still writes its log record.
//! - `try_consume` gives up with `None`, the same answer as an empty slot.
//!
//! The critical sections are a 20-byte copy, so contention is not expected
//! in practice.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spin::{Mutex, MutexGuard};

use crate::sample::{DigitalInputs, Sample, ANALOG_CHANNELS};

/// Guard attempts before `produce` gives up
pub const DEFAULT_PRODUCE_ATTEMPTS: u32 = 64;

/// Guard attempts before `try_consume` gives up
pub const DEFAULT_CONSUME_ATTEMPTS: u32 = 1024;

/// Result of a `produce` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Slot was empty and now holds the sample
    Delivered,
    /// Slot held an unread sample which was replaced
    Overwrote,
    /// Guard stayed busy; the sample was not handed off this cycle
    Contended,
}

/// Bounds on guard acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
    /// `try_lock` attempts on the producer side
    pub produce_attempts: u32,
    /// `try_lock` attempts on the consumer side
    pub consume_attempts: u32,
}

impl MailboxConfig {
    /// Default bounds, usable in const context
    pub const fn new() -> Self {
        Self {
            produce_attempts: DEFAULT_PRODUCE_ATTEMPTS,
            consume_attempts: DEFAULT_CONSUME_ATTEMPTS,
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Mailbox counters. Relaxed, diagnostics only.
pub struct MailboxStats {
    /// Samples written into the slot
    pub produced: AtomicU32,
    /// Samples taken out of the slot
    pub consumed: AtomicU32,
    /// Unread samples replaced by a newer one
    pub overwritten: AtomicU32,
    /// `produce` calls that could not get the guard
    pub contended_produce: AtomicU32,
    /// `try_consume` calls that could not get the guard
    pub contended_consume: AtomicU32,
}

impl MailboxStats {
    const fn new() -> Self {
        Self {
            produced: AtomicU32::new(0),
            consumed: AtomicU32::new(0),
            overwritten: AtomicU32::new(0),
            contended_produce: AtomicU32::new(0),
            contended_consume: AtomicU32::new(0),
        }
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Capacity-one, overwrite-on-produce hand-off
pub struct Mailbox {
    slot: Mutex<Sample>,
    ready: AtomicBool,
    config: MailboxConfig,
    stats: MailboxStats,
}

impl Mailbox {
    /// Empty mailbox with default bounds. Usable in `static` context.
    pub const fn new() -> Self {
        Self::with_config(MailboxConfig::new())
    }

    /// Empty mailbox with explicit bounds
    pub const fn with_config(config: MailboxConfig) -> Self {
        Self {
            slot: Mutex::new(Sample::new([0; ANALOG_CHANNELS], DigitalInputs::new(0))),
            ready: AtomicBool::new(false),
            config,
            stats: MailboxStats::new(),
        }
    }

    /// Replace the slot contents and mark them unread.
    ///
    /// Acquisition side only.
    pub fn produce(&self, sample: Sample) -> Handoff {
        let Some(mut slot) = self.lock_within(self.config.produce_attempts) else {
            MailboxStats::bump(&self.stats.contended_produce);
            return Handoff::Contended;
        };

        *slot = sample;
        let unread = self.ready.swap(true, Ordering::AcqRel);
        drop(slot);

        MailboxStats::bump(&self.stats.produced);
        if unread {
            MailboxStats::bump(&self.stats.overwritten);
            Handoff::Overwrote
        } else {
            Handoff::Delivered
        }
    }

    /// Take the unread sample, if any.
    ///
    /// Returns `None` immediately when the slot is empty, and after the
    /// bounded wait when the guard stays busy. Reporting side only.
    pub fn try_consume(&self) -> Option<Sample> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }

        let Some(slot) = self.lock_within(self.config.consume_attempts) else {
            MailboxStats::bump(&self.stats.contended_consume);
            return None;
        };

        if !self.ready.swap(false, Ordering::AcqRel) {
            return None;
        }
        let sample = *slot;
        drop(slot);

        MailboxStats::bump(&self.stats.consumed);
        Some(sample)
    }

    /// Whether an unread sample is waiting
    pub fn has_data(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Guard bounds in use
    pub fn config(&self) -> MailboxConfig {
        self.config
    }

    /// Counters
    pub fn stats(&self) -> &MailboxStats {
        &self.stats
    }

    fn lock_within(&self, attempts: u32) -> Option<MutexGuard<'_, Sample>> {
        for _ in 0..attempts.max(1) {
            if let Some(guard) = self.slot.try_lock() {
                return Some(guard);
            }
            core::hint::spin_loop();
        }
        None
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mv: u32, bits: u8) -> Sample {
        Sample::new([mv; 4], DigitalInputs::new(bits))
    }

    #[test]
    fn fresh_mailbox_is_empty() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.has_data());
        assert_eq!(mailbox.try_consume(), None);
    }

    #[test]
    fn consume_takes_exactly_once() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.produce(sample(500, 0)), Handoff::Delivered);

        assert_eq!(mailbox.try_consume(), Some(sample(500, 0)));
        assert_eq!(mailbox.try_consume(), None);
        assert_eq!(mailbox.stats().consumed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn newer_sample_overwrites_unread() {
        let mailbox = Mailbox::new();
        mailbox.produce(sample(100, 1));
        assert_eq!(mailbox.produce(sample(200, 2)), Handoff::Overwrote);

        assert_eq!(mailbox.try_consume(), Some(sample(200, 2)));
        assert_eq!(mailbox.try_consume(), None);
        assert_eq!(mailbox.stats().overwritten.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn held_guard_skips_handoff() {
        let mailbox = Mailbox::with_config(MailboxConfig {
            produce_attempts: 4,
            consume_attempts: 4,
        });
        mailbox.produce(sample(1, 0));

        let guard = mailbox.slot.lock();
        assert_eq!(mailbox.produce(sample(2, 0)), Handoff::Contended);
        assert_eq!(mailbox.try_consume(), None);
        drop(guard);

        // The earlier sample is still there and still unread
        assert_eq!(mailbox.try_consume(), Some(sample(1, 0)));
        assert_eq!(mailbox.stats().contended_produce.load(Ordering::Relaxed), 1);
        assert_eq!(mailbox.stats().contended_consume.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mailbox = Mailbox::with_config(MailboxConfig {
            produce_attempts: 0,
            consume_attempts: 0,
        });
        assert_eq!(mailbox.config().produce_attempts, 0);
        assert_ne!(Mailbox::new().config(), mailbox.config());
        assert_eq!(mailbox.produce(sample(7, 0)), Handoff::Delivered);
        assert_eq!(mailbox.try_consume(), Some(sample(7, 0)));
    }
}
