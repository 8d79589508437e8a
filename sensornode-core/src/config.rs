//! Node configuration
//!
//! Loaded once at start-up from a JSON file. Every field has a default, so
//! an empty object (`{}`) is a valid configuration:
//!
//! ```json
//! {
//!   "trigger":  { "period_secs": 2 },
//!   "storage":  { "mount_point": "/sdcard", "log_name": "record.txt", "format": "legacy" },
//!   "endpoint": { "host": "api.thingspeak.com", "api_key": "XXXXXXXXXXXXXXXX" },
//!   "backoff":  { "connect_ms": 4000 }
//! }
//! ```
//!
//! Durations are integer milliseconds. A configuration that fails
//! [`NodeConfig::validate`] is an initialization error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fugit::{HertzU32, SecsDurationU32};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::acquisition::DEFAULT_LOG_NAME;
use crate::backoff::BackoffPolicy;
use crate::errors::{InitError, InitResult};
use crate::mailbox::{MailboxConfig, DEFAULT_CONSUME_ATTEMPTS, DEFAULT_PRODUCE_ATTEMPTS};
use crate::record::LogFormat;
use crate::reporting::DEFAULT_STARTUP_DELAY;
use crate::telemetry::{Endpoint, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_PORT, DEFAULT_USER_AGENT};
use crate::trigger::{TimerConfig, DEFAULT_BASE_CLOCK_MHZ, DEFAULT_DIVIDER, DEFAULT_PERIOD_SECS};

/// Default storage mount point
pub const DEFAULT_MOUNT_POINT: &str = "/sdcard";

/// Default transport connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default transport receive timeout
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 60_000;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid configuration JSON
    #[error("Cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values parsed but cannot be used
    #[error("{0}")]
    Invalid(#[from] InitError),
}

/// Sampling timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    /// Sampling period in seconds
    pub period_secs: u32,
    /// Timer source clock in Hz
    pub base_clock_hz: u32,
    /// Counter prescaler
    pub divider: u16,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_PERIOD_SECS,
            base_clock_hz: DEFAULT_BASE_CLOCK_MHZ * 1_000_000,
            divider: DEFAULT_DIVIDER,
        }
    }
}

impl TriggerSettings {
    /// Timer setup for these settings
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            period: SecsDurationU32::secs(self.period_secs),
            base_clock: HertzU32::Hz(self.base_clock_hz),
            divider: self.divider,
        }
    }
}

/// Local log storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory the storage is mounted at
    pub mount_point: PathBuf,
    /// Log file name under the mount point
    pub log_name: String,
    /// Record layout
    pub format: LogFormat,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from(DEFAULT_MOUNT_POINT),
            log_name: DEFAULT_LOG_NAME.to_owned(),
            format: LogFormat::default(),
        }
    }
}

/// Telemetry endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Host name
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Update path
    pub path: String,
    /// Channel write key
    pub api_key: String,
    /// `User-Agent` header
    pub user_agent: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_owned(),
            api_key: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl EndpointSettings {
    /// Borrowed endpoint for the reporting task
    pub fn endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            host: &self.host,
            port: self.port,
            path: &self.path,
            api_key: &self.api_key,
            user_agent: &self.user_agent,
        }
    }
}

/// Network transport timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Connect timeout in ms
    pub connect_timeout_ms: u64,
    /// Response timeout in ms
    pub receive_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

impl TransportSettings {
    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Receive timeout
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Reporting delays per outcome, in ms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Mailbox empty
    pub idle_ms: u64,
    /// Request delivered
    pub delivered_ms: u64,
    /// Name lookup failed
    pub name_lookup_ms: u64,
    /// Socket allocation failed
    pub socket_allocation_ms: u64,
    /// Connect failed
    pub connect_ms: u64,
    /// Send failed
    pub send_ms: u64,
    /// Receive timed out
    pub receive_timeout_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        let policy = BackoffPolicy::new();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            idle_ms: ms(policy.idle),
            delivered_ms: ms(policy.delivered),
            name_lookup_ms: ms(policy.name_lookup),
            socket_allocation_ms: ms(policy.socket_allocation),
            connect_ms: ms(policy.connect),
            send_ms: ms(policy.send),
            receive_timeout_ms: ms(policy.receive_timeout),
        }
    }
}

impl BackoffSettings {
    /// Backoff table for the reporting task
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            idle: Duration::from_millis(self.idle_ms),
            delivered: Duration::from_millis(self.delivered_ms),
            name_lookup: Duration::from_millis(self.name_lookup_ms),
            socket_allocation: Duration::from_millis(self.socket_allocation_ms),
            connect: Duration::from_millis(self.connect_ms),
            send: Duration::from_millis(self.send_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        }
    }
}

/// Mailbox guard bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxSettings {
    /// Producer `try_lock` attempts
    pub produce_attempts: u32,
    /// Consumer `try_lock` attempts
    pub consume_attempts: u32,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            produce_attempts: DEFAULT_PRODUCE_ATTEMPTS,
            consume_attempts: DEFAULT_CONSUME_ATTEMPTS,
        }
    }
}

impl MailboxSettings {
    /// Mailbox bounds
    pub fn mailbox_config(&self) -> MailboxConfig {
        MailboxConfig {
            produce_attempts: self.produce_attempts,
            consume_attempts: self.consume_attempts,
        }
    }
}

/// Reporting task pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingSettings {
    /// Settle time before the first iteration, in ms
    pub startup_delay_ms: u64,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            startup_delay_ms: DEFAULT_STARTUP_DELAY.as_millis() as u64,
        }
    }
}

impl ReportingSettings {
    /// Settle time before the first iteration
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Sampling timer
    pub trigger: TriggerSettings,
    /// Local log storage
    pub storage: StorageSettings,
    /// Telemetry endpoint
    pub endpoint: EndpointSettings,
    /// Transport timeouts
    pub transport: TransportSettings,
    /// Reporting backoff table
    pub backoff: BackoffSettings,
    /// Mailbox bounds
    pub mailbox: MailboxSettings,
    /// Reporting pacing
    pub reporting: ReportingSettings,
}

impl NodeConfig {
    /// Parse JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check everything that would otherwise fail after the tasks started
    pub fn validate(&self) -> InitResult<()> {
        self.trigger.timer_config().validate()?;

        if self.storage.log_name.is_empty() {
            return Err(InitError::Config {
                reason: "storage.log_name is empty",
            });
        }
        if self.endpoint.host.is_empty() {
            return Err(InitError::Config {
                reason: "endpoint.host is empty",
            });
        }
        if !self.endpoint.endpoint().fits_request() {
            return Err(InitError::Config {
                reason: "endpoint settings exceed the request buffer",
            });
        }
        if self.transport.connect_timeout_ms == 0 || self.transport.receive_timeout_ms == 0 {
            return Err(InitError::Config {
                reason: "transport timeouts must be non-zero",
            });
        }

        if !self.backoff.policy().is_monotonic() {
            log::warn!("Backoff delays shrink for deeper failures");
        }
        Ok(())
    }
}
