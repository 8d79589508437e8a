//! Host thread runtime
//!
//! Runs the pipeline on OS threads, one per execution context:
//!
//! ```text
//! timer thread ──on_timer_interrupt()──► PeriodElapsed ──unpark──► acquisition thread
//!                                                                   │ produce
//!                                                                   ▼
//!                                            reporting thread ◄── Mailbox
//! ```
//!
//! The timer thread stands in for the hardware countdown timer with
//! auto-reload: alarm `k` fires at `start + k * period`, so scheduling
//! jitter never accumulates. The acquisition thread parks until the trigger
//! unparks it. The reporting thread sleeps between iterations with
//! [`ParkDelay`], which returns early once the context is stopped.

use std::io;
use std::sync::OnceLock;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use crate::acquisition::AcquisitionTask;
use crate::context::NodeContext;
use crate::errors::InitResult;
use crate::reporting::ReportingTask;
use crate::traits::{ChannelReader, Delay, LogStorage, Transport};
use crate::trigger::{TimerConfig, Wake};

/// Thread roles known to the waker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Timer emulation
    Timer,
    /// Acquisition task
    Acquisition,
    /// Reporting task
    Reporting,
}

impl Role {
    const fn slot(self) -> usize {
        match self {
            Role::Timer => 0,
            Role::Acquisition => 1,
            Role::Reporting => 2,
        }
    }
}

/// Waker that unparks registered threads.
///
/// `wake` only touches the acquisition thread and never blocks, so it is
/// safe to call from the timer path.
#[derive(Debug, Default)]
pub struct ThreadWaker {
    threads: [OnceLock<Thread>; 3],
}

impl ThreadWaker {
    /// Waker with no threads registered
    pub const fn new() -> Self {
        Self {
            threads: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
        }
    }

    /// Register the calling thread for `role`. Later registrations are ignored.
    pub fn register(&self, role: Role) {
        if self.threads[role.slot()].set(thread::current()).is_err() {
            log::debug!("{:?} thread already registered", role);
        }
    }

    fn unpark(&self, role: Role) {
        if let Some(thread) = self.threads[role.slot()].get() {
            thread.unpark();
        }
    }
}

impl Wake for ThreadWaker {
    fn wake(&self) {
        self.unpark(Role::Acquisition);
    }

    fn wake_all(&self) {
        self.unpark(Role::Timer);
        self.unpark(Role::Acquisition);
        self.unpark(Role::Reporting);
    }
}

/// Park the calling thread until `deadline`.
///
/// Returns `false` if the context was stopped first.
fn park_until<W: Wake>(context: &NodeContext<W>, deadline: Instant) -> bool {
    loop {
        if !context.is_running() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}

/// Countdown timer emulation with auto-reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    period: Duration,
}

impl PeriodicTimer {
    /// Timer for a validated configuration
    pub fn new(config: &TimerConfig) -> InitResult<Self> {
        config.validate()?;
        log::info!(
            "Timer armed: period {} s, alarm {} ticks",
            config.period.to_secs(),
            config.alarm_ticks()
        );
        Ok(Self {
            period: config.period_duration(),
        })
    }

    /// Timer with an arbitrary period, for sub-second runs
    pub fn from_period(period: Duration) -> Self {
        Self { period }
    }

    /// Alarm period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Fire alarms on `context` until it is stopped
    pub fn run<W: Wake>(&self, context: &NodeContext<W>) {
        if self.period.is_zero() {
            log::error!("Timer period is zero, not starting");
            return;
        }

        let start = Instant::now();
        let mut alarm: u32 = 1;

        while park_until(context, start + self.period * alarm) {
            context.on_timer_interrupt();

            // Alarms missed while descheduled collapse into the one just fired
            let due = (start.elapsed().as_nanos() / self.period.as_nanos()) as u32;
            if due > alarm {
                log::warn!("Timer fell behind by {} periods", due - alarm);
            }
            alarm = due.max(alarm) + 1;
        }
    }
}

/// [`Delay`] that parks the calling thread and gives up early on stop
pub struct ParkDelay<'a, W: Wake> {
    context: &'a NodeContext<W>,
}

impl<'a, W: Wake> ParkDelay<'a, W> {
    /// Delay bound to a context
    pub fn new(context: &'a NodeContext<W>) -> Self {
        Self { context }
    }
}

impl<W: Wake> Delay for ParkDelay<'_, W> {
    fn delay(&mut self, duration: Duration) {
        park_until(self.context, Instant::now() + duration);
    }
}

/// Acquisition thread body: park, sample, repeat until stopped
pub fn run_acquisition<R, S>(task: &mut AcquisitionTask<'_, R, S, ThreadWaker>)
where
    R: ChannelReader,
    S: LogStorage,
{
    let context = task.context();
    context.trigger().waker().register(Role::Acquisition);
    log::info!("Acquisition started");

    while context.is_running() {
        if context.trigger().take() {
            task.on_period();
        } else {
            thread::park();
        }
    }

    log::info!("Acquisition stopped after {} cycles", task.stats().cycles);
}

/// Reporting thread body
pub fn run_reporting<T: Transport>(task: &mut ReportingTask<'_, T, ThreadWaker>) {
    let context = task.context();
    context.trigger().waker().register(Role::Reporting);
    task.run(&mut ParkDelay::new(context));
}

/// Run the timer and both tasks until the context is stopped.
///
/// With `run_for` set, the calling thread stops the context after that
/// long. Without it this only returns if something else stops the
/// context. The tasks are handed back so their collaborators can be shut
/// down cleanly. Fails only if a thread cannot be spawned.
pub fn run_node<'a, R, S, T>(
    context: &'a NodeContext<ThreadWaker>,
    timer: PeriodicTimer,
    mut acquisition: AcquisitionTask<'a, R, S, ThreadWaker>,
    mut reporting: ReportingTask<'a, T, ThreadWaker>,
    run_for: Option<Duration>,
) -> io::Result<(AcquisitionTask<'a, R, S, ThreadWaker>, ReportingTask<'a, T, ThreadWaker>)>
where
    R: ChannelReader + Send,
    S: LogStorage + Send,
    T: Transport + Send,
{
    thread::scope(|scope| {
        let timer_thread = thread::Builder::new()
            .name("timer".into())
            .spawn_scoped(scope, move || {
                context.trigger().waker().register(Role::Timer);
                timer.run(context);
            });
        let acquisition_thread = thread::Builder::new()
            .name("acquisition".into())
            .spawn_scoped(scope, move || {
                run_acquisition(&mut acquisition);
                acquisition
            });
        let reporting_thread = thread::Builder::new()
            .name("reporting".into())
            .spawn_scoped(scope, move || {
                run_reporting(&mut reporting);
                reporting
            });

        let (timer_thread, acquisition_thread, reporting_thread) =
            match (timer_thread, acquisition_thread, reporting_thread) {
                (Ok(t), Ok(a), Ok(r)) => (t, a, r),
                (t, a, r) => {
                    // Threads that did start see the stop and exit with the scope
                    context.request_stop();
                    let error = t.err().or(a.err()).or(r.err());
                    return Err(error.unwrap_or_else(|| io::Error::other("thread spawn failed")));
                }
            };

        if let Some(run_for) = run_for {
            park_until(context, Instant::now() + run_for);
            log::info!("Run time elapsed, stopping");
            context.request_stop();
        }

        timer_thread
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        let acquisition = acquisition_thread
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        let reporting = reporting_thread
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        Ok((acquisition, reporting))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn timer_config_is_validated() {
        assert!(PeriodicTimer::new(&TimerConfig::with_period_secs(0)).is_err());
        let timer = PeriodicTimer::new(&TimerConfig::default()).unwrap();
        assert_eq!(timer.period(), Duration::from_secs(2));
    }

    #[test]
    fn timer_fires_until_stopped() {
        let context = NodeContext::new(ThreadWaker::new(), MailboxConfig::new());
        let timer = PeriodicTimer::from_period(Duration::from_millis(5));

        thread::scope(|scope| {
            scope.spawn(|| {
                context.trigger().waker().register(Role::Timer);
                timer.run(&context);
            });
            while context.trigger().elapsed_count() < 3 {
                thread::sleep(Duration::from_millis(1));
            }
            context.request_stop();
        });

        assert!(context.trigger().elapsed_count() >= 3);
    }

    #[test]
    fn park_delay_returns_early_on_stop() {
        let context = NodeContext::new(ThreadWaker::new(), MailboxConfig::new());
        let woke = AtomicU32::new(0);

        thread::scope(|scope| {
            scope.spawn(|| {
                context.trigger().waker().register(Role::Reporting);
                let started = Instant::now();
                ParkDelay::new(&context).delay(Duration::from_secs(30));
                assert!(started.elapsed() < Duration::from_secs(10));
                woke.fetch_add(1, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(20));
            context.request_stop();
        });

        assert_eq!(woke.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn park_delay_waits_while_running() {
        let context = NodeContext::new(ThreadWaker::new(), MailboxConfig::new());
        let started = Instant::now();
        ParkDelay::new(&context).delay(Duration::from_millis(15));
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
