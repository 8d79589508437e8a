//! Network Transports for Telemetry
//!
//! ## Overview
//!
//! The reporting task hands every transport one complete request and gets
//! back one classified [`Outcome`](sensornode_core::Outcome). Transports own
//! no pipeline state: they open a connection, send, read until the peer
//! closes and report how far they got.
//!
//! ### TCP (plain HTTP/1.1)
//!
//! **When to use:**
//! - Host builds and gateways with a normal IP stack
//! - Endpoints that accept one request per connection (`Connection: close`)
//!
//! **Failure classes**, in lifecycle order:
//! - name lookup, socket allocation, connect, send, receive timeout
//!
//! Each maps to its own backoff delay in the reporting task, so a
//! transport must never fold two classes together.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sensornode_connectors::{TcpConfig, TcpTransport};
//! use sensornode_core::{Endpoint, Transport};
//!
//! let mut transport = TcpTransport::new(TcpConfig::new())?;
//! let outcome = transport.send(&Endpoint::thingspeak(), "GET /update?field1=1 HTTP/1.1\r\n\r\n");
//! println!("{outcome:?}");
//! # Ok::<(), sensornode_connectors::ConnectorError>(())
//! ```

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpTransport};

use sensornode_core::TransportFailure;
use thiserror::Error;

/// Connector construction errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    ConfigError(&'static str),
}

/// Connection statistics common to all transports
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Requests attempted
    pub requests: u64,
    /// Requests that completed a response
    pub delivered: u64,
    /// Requests abandoned
    pub failed: u64,
    /// Request bytes written
    pub bytes_sent: u64,
    /// Response bytes read
    pub bytes_received: u64,
    /// Class of the most recent failure
    pub last_failure: Option<TransportFailure>,
}
