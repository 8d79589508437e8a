//! Shared node context
//!
//! The only state crossing task boundaries. Built once at start-up and
//! lent to the timer interrupt, the acquisition task and the reporting task.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::mailbox::{Mailbox, MailboxConfig};
use crate::trigger::{NoWake, PeriodElapsed, Wake};

/// Trigger flag, mailbox and run state shared by both tasks
pub struct NodeContext<W: Wake = NoWake> {
    trigger: PeriodElapsed<W>,
    mailbox: Mailbox,
    running: AtomicBool,
}

impl<W: Wake> NodeContext<W> {
    /// Fresh context. Usable in `static` context on bare metal.
    pub const fn new(waker: W, mailbox: MailboxConfig) -> Self {
        Self {
            trigger: PeriodElapsed::new(waker),
            mailbox: Mailbox::with_config(mailbox),
            running: AtomicBool::new(true),
        }
    }

    /// Timer interrupt handler body
    #[inline]
    pub fn on_timer_interrupt(&self) {
        self.trigger.signal();
    }

    /// Period-elapsed flag
    pub fn trigger(&self) -> &PeriodElapsed<W> {
        &self.trigger
    }

    /// Acquisition to reporting hand-off
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Whether the tasks should keep looping
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask both tasks to leave their loops after the current step
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.trigger.waker().wake_all();
    }
}

impl Default for NodeContext<NoWake> {
    fn default() -> Self {
        Self::new(NoWake, MailboxConfig::new())
    }
}
