//! Transport outcome classification and pacing
//!
//! Every send attempt ends in exactly one [`Outcome`]. The reporting task
//! maps it to a fixed delay before its next iteration. Delays are per class,
//! not exponential: a transport that keeps failing the same way keeps
//! getting the same delay.
//!
//! Failures later in the request lifecycle cost the remote side more, so
//! the defaults grow with depth:
//!
//! | Outcome            | Default delay |
//! |--------------------|---------------|
//! | name lookup        | 1 s           |
//! | socket allocation  | 2 s           |
//! | connect            | 4 s           |
//! | send               | 8 s           |
//! | receive timeout    | 60 s          |
//! | delivered          | 20 s          |
//! | mailbox empty      | 250 ms        |

use core::time::Duration;

/// Where in the request lifecycle a send attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailure {
    /// Host name did not resolve
    NameLookup,
    /// No socket could be allocated
    SocketAllocation,
    /// TCP connect failed
    Connect,
    /// Request could not be written
    Send,
    /// Response did not arrive in time, or could not be read
    ReceiveTimeout,
}

impl TransportFailure {
    /// All classes, in lifecycle order
    pub const ALL: [TransportFailure; 5] = [
        TransportFailure::NameLookup,
        TransportFailure::SocketAllocation,
        TransportFailure::Connect,
        TransportFailure::Send,
        TransportFailure::ReceiveTimeout,
    ];

    /// Short label for logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NameLookup => "name lookup",
            Self::SocketAllocation => "socket allocation",
            Self::Connect => "connect",
            Self::Send => "send",
            Self::ReceiveTimeout => "receive timeout",
        }
    }

    /// Index into per-class counters
    pub const fn index(&self) -> usize {
        match self {
            Self::NameLookup => 0,
            Self::SocketAllocation => 1,
            Self::Connect => 2,
            Self::Send => 3,
            Self::ReceiveTimeout => 4,
        }
    }
}

impl core::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a completed request/response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    /// HTTP status code, when the status line could be parsed
    pub status: Option<u16>,
    /// Response bytes read before the peer closed
    pub bytes: usize,
}

impl Delivery {
    /// Whether the endpoint answered with a 2xx status
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

/// Classified result of one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Request sent and response read until close
    Delivered(Delivery),
    /// Attempt abandoned at the given stage
    Failed(TransportFailure),
}

impl Outcome {
    /// Whether the conversation completed
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }
}

/// Fixed delay per outcome class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Mailbox was empty
    pub idle: Duration,
    /// Request delivered
    pub delivered: Duration,
    /// Host name did not resolve
    pub name_lookup: Duration,
    /// Socket allocation failed
    pub socket_allocation: Duration,
    /// Connect failed
    pub connect: Duration,
    /// Send failed
    pub send: Duration,
    /// Receive timed out
    pub receive_timeout: Duration,
}

impl BackoffPolicy {
    /// Default delays, usable in const context
    pub const fn new() -> Self {
        Self {
            idle: Duration::from_millis(250),
            delivered: Duration::from_secs(20),
            name_lookup: Duration::from_secs(1),
            socket_allocation: Duration::from_secs(2),
            connect: Duration::from_secs(4),
            send: Duration::from_secs(8),
            receive_timeout: Duration::from_secs(60),
        }
    }

    /// Delay after a send attempt
    pub fn delay_for(&self, outcome: &Outcome) -> Duration {
        match outcome {
            Outcome::Delivered(_) => self.delivered,
            Outcome::Failed(failure) => self.failure_delay(*failure),
        }
    }

    /// Delay after a failure of the given class
    pub fn failure_delay(&self, failure: TransportFailure) -> Duration {
        match failure {
            TransportFailure::NameLookup => self.name_lookup,
            TransportFailure::SocketAllocation => self.socket_allocation,
            TransportFailure::Connect => self.connect,
            TransportFailure::Send => self.send,
            TransportFailure::ReceiveTimeout => self.receive_timeout,
        }
    }

    /// Whether failure delays never shrink with lifecycle depth
    pub fn is_monotonic(&self) -> bool {
        TransportFailure::ALL
            .windows(2)
            .all(|pair| self.failure_delay(pair[0]) <= self.failure_delay(pair[1]))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_grow_with_depth() {
        let policy = BackoffPolicy::default();
        assert!(policy.is_monotonic());

        let deepest = policy.failure_delay(TransportFailure::ReceiveTimeout);
        for failure in TransportFailure::ALL {
            assert!(policy.failure_delay(failure) <= deepest);
        }
    }

    #[test]
    fn every_class_has_its_own_delay() {
        let policy = BackoffPolicy::default();
        for (i, a) in TransportFailure::ALL.iter().enumerate() {
            for b in &TransportFailure::ALL[i + 1..] {
                assert_ne!(policy.failure_delay(*a), policy.failure_delay(*b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn delivered_uses_success_delay() {
        let policy = BackoffPolicy::default();
        let outcome = Outcome::Delivered(Delivery { status: Some(200), bytes: 12 });
        assert_eq!(policy.delay_for(&outcome), Duration::from_secs(20));
        assert!(outcome.is_delivered());
    }

    #[test]
    fn accepted_means_2xx() {
        assert!(Delivery { status: Some(204), bytes: 0 }.is_accepted());
        assert!(!Delivery { status: Some(400), bytes: 0 }.is_accepted());
        assert!(!Delivery { status: None, bytes: 3 }.is_accepted());
    }

    #[test]
    fn indices_are_distinct() {
        for (i, failure) in TransportFailure::ALL.iter().enumerate() {
            assert_eq!(failure.index(), i);
        }
    }
}
