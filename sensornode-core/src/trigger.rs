//! Periodic Trigger
//!
//! The sampling cadence comes from a countdown timer with auto-reload. On
//! every alarm the interrupt handler calls [`PeriodElapsed::signal`], which
//! only sets a flag, bumps a counter and wakes the acquisition task. It never
//! allocates, logs or blocks.
//!
//! ```text
//! timer alarm ──► ISR ──► signal() ──► pending = true ──► Wake::wake()
//!                                                             │
//!                 AcquisitionTask ◄── take() clears pending ◄─┘
//! ```
//!
//! Bare-metal super-loops can skip the waker entirely and poll with
//! [`PeriodElapsed::poll`] through `nb::block!`.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use fugit::{HertzU32, SecsDurationU32};

use crate::errors::{InitError, InitResult};

/// Default sampling period
pub const DEFAULT_PERIOD_SECS: u32 = 2;

/// Default timer source clock (APB)
pub const DEFAULT_BASE_CLOCK_MHZ: u32 = 80;

/// Default counter prescaler
pub const DEFAULT_DIVIDER: u16 = 16;

/// Wakes the task waiting on a trigger.
///
/// Implementations run in interrupt context: they must be bounded and must
/// not allocate or block.
pub trait Wake {
    /// Make the waiting task runnable
    fn wake(&self);

    /// Make every task sharing the context runnable. Shutdown only.
    fn wake_all(&self) {
        self.wake();
    }
}

/// Waker for polled targets
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWake;

impl Wake for NoWake {
    fn wake(&self) {}
}

/// Period-elapsed flag shared between the timer interrupt and the
/// acquisition task
pub struct PeriodElapsed<W: Wake = NoWake> {
    pending: AtomicBool,
    elapsed: AtomicU32,
    waker: W,
}

impl<W: Wake> PeriodElapsed<W> {
    /// Create an idle flag. Usable in `static` context.
    pub const fn new(waker: W) -> Self {
        Self {
            pending: AtomicBool::new(false),
            elapsed: AtomicU32::new(0),
            waker,
        }
    }

    /// Interrupt entry point: mark the period as elapsed and wake the task
    #[inline]
    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
        self.elapsed.fetch_add(1, Ordering::Relaxed);
        self.waker.wake();
    }

    /// Clear the flag, returning whether it was set.
    ///
    /// Clearing before sampling means an alarm that fires during the
    /// sampling pass is kept for the next cycle.
    #[inline]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Non-blocking form of [`take`](Self::take)
    pub fn poll(&self) -> nb::Result<(), Infallible> {
        if self.take() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Whether an elapsed period is waiting to be handled
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of alarms since start, wrapping
    pub fn elapsed_count(&self) -> u32 {
        self.elapsed.load(Ordering::Relaxed)
    }

    /// Waker handed to the interrupt path
    pub fn waker(&self) -> &W {
        &self.waker
    }
}

impl Default for PeriodElapsed<NoWake> {
    fn default() -> Self {
        Self::new(NoWake)
    }
}

/// Countdown timer setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Sampling period
    pub period: SecsDurationU32,
    /// Timer source clock
    pub base_clock: HertzU32,
    /// Counter prescaler
    pub divider: u16,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period: SecsDurationU32::secs(DEFAULT_PERIOD_SECS),
            base_clock: HertzU32::MHz(DEFAULT_BASE_CLOCK_MHZ),
            divider: DEFAULT_DIVIDER,
        }
    }
}

impl TimerConfig {
    /// Timer with the given period and default clocking
    pub fn with_period_secs(secs: u32) -> Self {
        Self {
            period: SecsDurationU32::secs(secs),
            ..Self::default()
        }
    }

    /// Counter ticks per second after the prescaler
    pub fn scale(&self) -> u32 {
        self.base_clock.raw() / u32::from(self.divider.max(1))
    }

    /// Alarm value loaded on every auto-reload
    pub fn alarm_ticks(&self) -> u64 {
        u64::from(self.period.to_secs()) * u64::from(self.scale())
    }

    /// Period as a core duration, for host timers
    pub fn period_duration(&self) -> core::time::Duration {
        core::time::Duration::from_secs(u64::from(self.period.to_secs()))
    }

    /// Reject setups the counter cannot run
    pub fn validate(&self) -> InitResult<()> {
        if self.period.to_secs() == 0 {
            return Err(InitError::Timer {
                reason: "period must be non-zero",
            });
        }
        if self.divider < 2 {
            return Err(InitError::Timer {
                reason: "divider must be at least 2",
            });
        }
        if self.alarm_ticks() == 0 {
            return Err(InitError::Timer {
                reason: "base clock slower than divider",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct CountingWake(Cell<u32>);

    impl Wake for CountingWake {
        fn wake(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn signal_sets_and_take_clears() {
        let flag = PeriodElapsed::default();
        assert!(!flag.take());

        flag.signal();
        assert!(flag.is_pending());
        assert!(flag.take());
        assert!(!flag.take());
        assert_eq!(flag.elapsed_count(), 1);
    }

    #[test]
    fn poll_would_block_when_idle() {
        let flag = PeriodElapsed::default();
        assert_eq!(flag.poll(), Err(nb::Error::WouldBlock));

        flag.signal();
        assert_eq!(flag.poll(), Ok(()));
    }

    #[test]
    fn repeated_alarms_collapse_into_one_pending() {
        let flag = PeriodElapsed::default();
        flag.signal();
        flag.signal();
        assert!(flag.take());
        assert!(!flag.take());
        assert_eq!(flag.elapsed_count(), 2);
    }

    #[test]
    fn signal_wakes_task() {
        let flag = PeriodElapsed::new(CountingWake(Cell::new(0)));
        flag.signal();
        flag.signal();
        assert_eq!(flag.waker().0.get(), 2);
    }

    #[test]
    fn default_alarm_matches_two_seconds() {
        let config = TimerConfig::default();
        assert_eq!(config.scale(), 5_000_000);
        assert_eq!(config.alarm_ticks(), 10_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_period_is_fatal() {
        let config = TimerConfig::with_period_secs(0);
        assert!(matches!(config.validate(), Err(InitError::Timer { .. })));
    }

    #[test]
    fn divider_must_prescale() {
        let config = TimerConfig {
            divider: 1,
            ..TimerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn slow_clock_is_rejected() {
        let config = TimerConfig {
            base_clock: HertzU32::Hz(8),
            ..TimerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(InitError::Timer {
                reason: "base clock slower than divider"
            })
        );
    }
}
