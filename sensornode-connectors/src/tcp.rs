//! One-shot HTTP/1.1 over TCP
//!
//! Every `send` walks the request lifecycle once and stops at the first
//! stage that fails:
//!
//! ```text
//! resolve ──► connect ──► write request ──► read until close ──► Delivery
//!    │           │              │                  │
//! NameLookup  SocketAllocation  Send          ReceiveTimeout
//!             / Connect
//! ```
//!
//! Connect is bounded per address and the whole response, from the first
//! byte to the peer closing, shares one receive deadline, so `send` returns
//! even if the peer trickles bytes forever. The response body is not
//! interpreted: only the status line is parsed, and the rest is counted and
//! discarded.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use sensornode_core::{Delivery, Endpoint, Outcome, Transport, TransportFailure};

use crate::{ConnectionStats, ConnectorError};

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the response to arrive and finish
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Response bytes kept for status parsing
const STATUS_LINE_LIMIT: usize = 128;

/// TCP transport configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Bound on each connect attempt
    pub connect_timeout: Duration,
    /// Bound on the whole response, from the end of the request until the
    /// peer closes
    pub receive_timeout: Duration,
}

impl TcpConfig {
    /// Default timeouts
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain TCP transport, one connection per request
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpConfig,
    stats: ConnectionStats,
}

impl TcpTransport {
    /// Create new transport
    pub fn new(config: TcpConfig) -> Result<Self, ConnectorError> {
        if config.connect_timeout.is_zero() {
            return Err(ConnectorError::ConfigError("connect timeout must be non-zero"));
        }
        if config.receive_timeout.is_zero() {
            return Err(ConnectorError::ConfigError("receive timeout must be non-zero"));
        }

        Ok(Self {
            config,
            stats: ConnectionStats::default(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn exchange(&mut self, endpoint: &Endpoint<'_>, request: &str) -> Result<Delivery, TransportFailure> {
        let addrs = resolve(endpoint)?;
        let mut stream = self.connect(&addrs)?;

        stream
            .set_write_timeout(Some(self.config.receive_timeout))
            .and_then(|_| stream.write_all(request.as_bytes()))
            .and_then(|_| stream.flush())
            .map_err(|e| {
                log::debug!("Write to {} failed: {}", endpoint.host, e);
                TransportFailure::Send
            })?;
        self.stats.bytes_sent += request.len() as u64;

        let deadline = Instant::now() + self.config.receive_timeout;
        let delivery = read_response(&mut stream, deadline).map_err(|e| {
            log::debug!("Read from {} failed: {}", endpoint.host, e);
            TransportFailure::ReceiveTimeout
        })?;
        self.stats.bytes_received += delivery.bytes as u64;
        Ok(delivery)
    }

    fn connect(&self, addrs: &[SocketAddr]) -> Result<TcpStream, TransportFailure> {
        let mut failure = TransportFailure::Connect;

        for addr in addrs {
            match TcpStream::connect_timeout(addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    log::debug!("Connect to {} failed: {}", addr, e);
                    failure = classify_connect_error(&e);
                    if failure == TransportFailure::SocketAllocation {
                        break;
                    }
                }
            }
        }
        Err(failure)
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, endpoint: &Endpoint<'_>, request: &str) -> Outcome {
        self.stats.requests += 1;

        match self.exchange(endpoint, request) {
            Ok(delivery) => {
                self.stats.delivered += 1;
                log::debug!(
                    "{}:{} answered {:?} ({} bytes)",
                    endpoint.host,
                    endpoint.port,
                    delivery.status,
                    delivery.bytes
                );
                Outcome::Delivered(delivery)
            }
            Err(failure) => {
                self.stats.failed += 1;
                self.stats.last_failure = Some(failure);
                Outcome::Failed(failure)
            }
        }
    }
}

fn resolve(endpoint: &Endpoint<'_>) -> Result<Vec<SocketAddr>, TransportFailure> {
    let addrs: Vec<SocketAddr> = (endpoint.host, endpoint.port)
        .to_socket_addrs()
        .map_err(|e| {
            log::debug!("Cannot resolve {}: {}", endpoint.host, e);
            TransportFailure::NameLookup
        })?
        .collect();

    if addrs.is_empty() {
        log::debug!("{} resolved to no addresses", endpoint.host);
        return Err(TransportFailure::NameLookup);
    }
    Ok(addrs)
}

/// Out of sockets or buffers, as opposed to the peer refusing
fn classify_connect_error(error: &io::Error) -> TransportFailure {
    if error.kind() == io::ErrorKind::OutOfMemory {
        return TransportFailure::SocketAllocation;
    }

    #[cfg(unix)]
    {
        // ENFILE, EMFILE
        if matches!(error.raw_os_error(), Some(23) | Some(24)) {
            return TransportFailure::SocketAllocation;
        }
    }

    TransportFailure::Connect
}

/// Stream whose blocking reads can be bounded
trait TimedRead: Read {
    fn arm_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for TcpStream {
    fn arm_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

/// Read until the peer closes or `deadline` passes, keeping only the
/// status line
fn read_response(stream: &mut impl TimedRead, deadline: Instant) -> io::Result<Delivery> {
    let mut head = Vec::with_capacity(STATUS_LINE_LIMIT);
    let mut buffer = [0u8; 512];
    let mut bytes = 0usize;

    loop {
        // Zero would disable the timeout
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "response deadline passed"))?;
        stream.arm_read_timeout(remaining)?;

        let n = match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let room = STATUS_LINE_LIMIT.saturating_sub(head.len());
        head.extend_from_slice(&buffer[..n.min(room)]);
        bytes += n;
    }

    Ok(Delivery {
        status: parse_status(&head),
        bytes,
    })
}

/// Status code from an `HTTP/x.y NNN reason` line
fn parse_status(head: &[u8]) -> Option<u16> {
    let line = head.split(|&b| b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();

    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}
