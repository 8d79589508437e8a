//! Telemetry payload and request encoding
//!
//! The node produces exactly one request shape: an HTTP/1.1 `GET` against
//! a channel-update endpoint with the four analog readings as `field1` to
//! `field4`, and `Connection: close` so each request owns its connection.

use core::fmt::Write;

use crate::sample::{Sample, ANALOG_CHANNELS};

/// Default telemetry host (ThingSpeak channel update API)
pub const DEFAULT_HOST: &str = "api.thingspeak.com";

/// Default telemetry port
pub const DEFAULT_PORT: u16 = 80;

/// Default update path
pub const DEFAULT_PATH: &str = "/update";

/// Default `User-Agent` header
pub const DEFAULT_USER_AGENT: &str = concat!("sensornode/", env!("CARGO_PKG_VERSION"));

/// Bytes reserved for one encoded request
pub const REQUEST_CAPACITY: usize = 512;

/// Four analog readings of the last drained sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPayload {
    fields: [u32; ANALOG_CHANNELS],
}

impl TelemetryPayload {
    /// Payload fields, `field1` first
    pub const fn fields(&self) -> [u32; ANALOG_CHANNELS] {
        self.fields
    }
}

impl From<&Sample> for TelemetryPayload {
    fn from(sample: &Sample) -> Self {
        Self {
            fields: sample.analog(),
        }
    }
}

/// Remote endpoint the reporting task talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    /// Host name, resolved on every request
    pub host: &'a str,
    /// TCP port
    pub port: u16,
    /// Request path
    pub path: &'a str,
    /// Write key, sent as `api_key`. Empty to omit.
    pub api_key: &'a str,
    /// `User-Agent` header value
    pub user_agent: &'a str,
}

impl Endpoint<'static> {
    /// Default endpoint without a write key
    pub const fn thingspeak() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            path: DEFAULT_PATH,
            api_key: "",
            user_agent: DEFAULT_USER_AGENT,
        }
    }
}

impl<'a> Endpoint<'a> {
    /// Same endpoint with a write key
    pub fn with_api_key(self, api_key: &'a str) -> Self {
        Self { api_key, ..self }
    }

    /// Check that the largest possible request still fits the request buffer
    pub fn fits_request(&self) -> bool {
        let widest = TelemetryPayload {
            fields: [u32::MAX; ANALOG_CHANNELS],
        };
        TelemetryRequest::encode(self, &widest).is_ok()
    }
}

/// Complete request text handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRequest {
    text: heapless::String<REQUEST_CAPACITY>,
}

impl TelemetryRequest {
    /// Format the request for one payload
    pub fn encode(endpoint: &Endpoint<'_>, payload: &TelemetryPayload) -> Result<Self, core::fmt::Error> {
        let mut text = heapless::String::new();

        write!(text, "GET {}?", endpoint.path)?;
        if !endpoint.api_key.is_empty() {
            write!(text, "api_key={}&", endpoint.api_key)?;
        }
        for (i, value) in payload.fields.iter().enumerate() {
            if i > 0 {
                text.push('&').map_err(|_| core::fmt::Error)?;
            }
            write!(text, "field{}={}", i + 1, value)?;
        }
        write!(
            text,
            " HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nUser-Agent: {}\r\n\r\n",
            endpoint.host, endpoint.user_agent
        )?;

        Ok(Self { text })
    }

    /// Request text
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::DigitalInputs;

    #[test]
    fn payload_drops_digital_mask() {
        let sample = Sample::new([1, 2, 3, 4], DigitalInputs::new(0x0F));
        assert_eq!(TelemetryPayload::from(&sample).fields(), [1, 2, 3, 4]);
    }

    #[test]
    fn request_lists_fields_in_order() {
        let endpoint = Endpoint::thingspeak().with_api_key("KEY123");
        let payload = TelemetryPayload::from(&Sample::new([500, 510, 520, 530], DigitalInputs::default()));
        let request = TelemetryRequest::encode(&endpoint, &payload).unwrap();

        assert!(request.as_str().starts_with(
            "GET /update?api_key=KEY123&field1=500&field2=510&field3=520&field4=530 HTTP/1.1\r\n"
        ));
        assert!(request.as_str().contains("\r\nHost: api.thingspeak.com\r\n"));
        assert!(request.as_str().contains("\r\nConnection: close\r\n"));
        assert!(request.as_str().ends_with("\r\n\r\n"));
    }

    #[test]
    fn empty_key_is_omitted() {
        let payload = TelemetryPayload::from(&Sample::default());
        let request = TelemetryRequest::encode(&Endpoint::thingspeak(), &payload).unwrap();
        assert!(request.as_str().starts_with("GET /update?field1=0&"));
    }

    #[test]
    #[cfg(feature = "std")]
    fn oversized_endpoint_does_not_fit() {
        let long_key = "k".repeat(REQUEST_CAPACITY);
        let endpoint = Endpoint::thingspeak().with_api_key(&long_key);
        assert!(!endpoint.fits_request());
        assert!(Endpoint::thingspeak().fits_request());
    }
}
