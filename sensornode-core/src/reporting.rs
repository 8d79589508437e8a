//! Reporting Task
//!
//! Drains the mailbox on its own cadence and forwards the sample to the
//! telemetry endpoint. One iteration is one attempt:
//!
//! ```text
//! try_consume ── None ───────────────────────────► idle delay
//!      │
//!      └─ Some(sample) ─► encode ─► Transport::send ─► Outcome ─► class delay
//! ```
//!
//! Every outcome is classified and paced by [`BackoffPolicy`]. Nothing in
//! here can end the loop: a failed send drops the sample, and the next
//! iteration starts from whatever the mailbox holds by then.

use core::time::Duration;

use crate::backoff::{BackoffPolicy, Outcome, TransportFailure};
use crate::context::NodeContext;
use crate::telemetry::{Endpoint, TelemetryPayload, TelemetryRequest};
use crate::traits::{Delay, Transport};
use crate::trigger::{NoWake, Wake};

/// Settle time before the first iteration, lets the network come up
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);

/// Result of one reporting iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iteration {
    /// Send outcome, `None` when there was nothing to send
    pub outcome: Option<Outcome>,
    /// Pause before the next iteration
    pub delay: Duration,
}

/// Reporting counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportingStats {
    /// Iterations run
    pub iterations: u32,
    /// Iterations that found the mailbox empty
    pub idle: u32,
    /// Requests delivered
    pub delivered: u32,
    /// Delivered requests answered with a non-2xx status
    pub rejected: u32,
    /// Samples dropped because the request did not fit its buffer
    pub encode_failures: u32,
    /// Failures per class, indexed by [`TransportFailure::index`]
    pub failures: [u32; TransportFailure::ALL.len()],
}

impl ReportingStats {
    /// Failures of one class
    pub fn failures_of(&self, failure: TransportFailure) -> u32 {
        self.failures[failure.index()]
    }
}

/// Mailbox drain and telemetry forwarder
pub struct ReportingTask<'a, T, W: Wake = NoWake> {
    context: &'a NodeContext<W>,
    transport: T,
    endpoint: Endpoint<'a>,
    policy: BackoffPolicy,
    startup_delay: Duration,
    stats: ReportingStats,
}

impl<'a, T, W> ReportingTask<'a, T, W>
where
    T: Transport,
    W: Wake,
{
    /// Task with default pacing
    pub fn new(context: &'a NodeContext<W>, transport: T, endpoint: Endpoint<'a>) -> Self {
        Self {
            context,
            transport,
            endpoint,
            policy: BackoffPolicy::new(),
            startup_delay: DEFAULT_STARTUP_DELAY,
            stats: ReportingStats::default(),
        }
    }

    /// Replace the backoff table
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the settle time before the first iteration
    pub fn with_startup_delay(mut self, startup_delay: Duration) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    /// One attempt: drain, send, classify. Does not sleep.
    pub fn run_iteration(&mut self) -> Iteration {
        self.stats.iterations = self.stats.iterations.wrapping_add(1);

        let Some(sample) = self.context.mailbox().try_consume() else {
            self.stats.idle = self.stats.idle.wrapping_add(1);
            return Iteration {
                outcome: None,
                delay: self.policy.idle,
            };
        };

        let payload = TelemetryPayload::from(&sample);
        let request = match TelemetryRequest::encode(&self.endpoint, &payload) {
            Ok(request) => request,
            Err(_) => {
                self.stats.encode_failures = self.stats.encode_failures.wrapping_add(1);
                log_warn!("Telemetry request exceeds buffer, sample dropped");
                return Iteration {
                    outcome: None,
                    delay: self.policy.idle,
                };
            }
        };

        log_debug!("Sending {:?} to {}:{}", payload.fields(), self.endpoint.host, self.endpoint.port);
        let outcome = self.transport.send(&self.endpoint, request.as_str());
        let delay = self.policy.delay_for(&outcome);
        self.record(&outcome, delay);

        Iteration {
            outcome: Some(outcome),
            delay,
        }
    }

    #[allow(unused_variables)]
    fn record(&mut self, outcome: &Outcome, delay: Duration) {
        match outcome {
            Outcome::Delivered(delivery) => {
                self.stats.delivered = self.stats.delivered.wrapping_add(1);
                if delivery.is_accepted() {
                    log_info!("Telemetry delivered ({} bytes back)", delivery.bytes);
                } else {
                    self.stats.rejected = self.stats.rejected.wrapping_add(1);
                    log_warn!("Telemetry endpoint answered status {:?}", delivery.status);
                }
            }
            Outcome::Failed(failure) => {
                let count = &mut self.stats.failures[failure.index()];
                *count = count.wrapping_add(1);
                log_warn!("Telemetry {} failure, retrying in {:?}", failure, delay);
            }
        }
    }

    /// Run one iteration and sleep for its delay
    pub fn step<D: Delay>(&mut self, delay: &mut D) -> Iteration {
        let iteration = self.run_iteration();
        delay.delay(iteration.delay);
        iteration
    }

    /// Settle, then iterate until the context is stopped
    pub fn run<D: Delay>(&mut self, delay: &mut D) {
        log_info!("Reporting to {}:{}{}", self.endpoint.host, self.endpoint.port, self.endpoint.path);
        delay.delay(self.startup_delay);
        while self.context.is_running() {
            self.step(delay);
        }
        log_info!("Reporting stopped after {} iterations", self.stats.iterations);
    }

    /// Shared context
    pub fn context(&self) -> &'a NodeContext<W> {
        self.context
    }

    /// Counters
    pub fn stats(&self) -> ReportingStats {
        self.stats
    }

    /// Backoff table in use
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Settle time before the first iteration
    pub fn startup_delay(&self) -> Duration {
        self.startup_delay
    }

    /// Transport, e.g. for connection diagnostics
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
