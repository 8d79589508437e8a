//! Log record encoding
//!
//! Every acquisition cycle appends one two-line ASCII block to the log:
//! analog channels on the first line, digital channels (LSB first) on the
//! second. Records are built in a fixed buffer so the acquisition path does
//! not allocate.
//!
//! ### Legacy
//! Matches logs already written by deployed nodes, byte for byte
//! (including the historical `Digtal` label):
//! ```text
//! Analog: Chan 0:1000mV, Chan 1:1050mV, Chan 2:900mV, Chan 3:1200 mV.
//! Digtal: Chan 0: 1, Chan 1: 0, Chan 2: 1, Chan 3: 0
//! ```
//!
//! ### Compact
//! ```text
//! 1000,1050,900,1200
//! 1,0,1,0
//! ```

use core::fmt::Write;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::LogWriteError;
use crate::sample::{DigitalInputs, Sample, ANALOG_CHANNELS, DIGITAL_CHANNELS};

/// Bytes reserved for one encoded record
pub const RECORD_CAPACITY: usize = 192;

/// Text layout of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogFormat {
    /// Labelled layout used by existing device logs
    #[default]
    Legacy,
    /// Comma-separated values only
    Compact,
}

/// One encoded sample, ready to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    text: heapless::String<RECORD_CAPACITY>,
}

impl LogRecord {
    /// Encode a sample
    pub fn encode(sample: &Sample, format: LogFormat) -> Result<Self, LogWriteError> {
        let mut text = heapless::String::new();
        let [a0, a1, a2, a3] = sample.analog();
        let [d0, d1, d2, d3] = sample.digital().levels();

        match format {
            LogFormat::Legacy => {
                writeln!(
                    text,
                    "Analog: Chan 0:{}mV, Chan 1:{}mV, Chan 2:{}mV, Chan 3:{} mV.",
                    a0, a1, a2, a3
                )
                .map_err(|_| LogWriteError::Encode)?;
                writeln!(
                    text,
                    "Digtal: Chan 0: {}, Chan 1: {}, Chan 2: {}, Chan 3: {}",
                    d0, d1, d2, d3
                )
                .map_err(|_| LogWriteError::Encode)?;
            }
            LogFormat::Compact => {
                writeln!(text, "{},{},{},{}", a0, a1, a2, a3).map_err(|_| LogWriteError::Encode)?;
                writeln!(text, "{},{},{},{}", d0, d1, d2, d3).map_err(|_| LogWriteError::Encode)?;
            }
        }

        Ok(Self { text })
    }

    /// Encoded text, newline-terminated
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Analog line without its terminator
    pub fn analog_line(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }

    /// Digital line without its terminator
    pub fn digital_line(&self) -> &str {
        self.text.lines().nth(1).unwrap_or("")
    }

    /// Decode one record block back into a sample.
    ///
    /// Only the first two lines of `text` are read.
    pub fn parse(text: &str, format: LogFormat) -> Option<Sample> {
        let mut lines = text.lines();
        let analog_line = lines.next()?;
        let digital_line = lines.next()?;

        let (analog_body, digital_body) = match format {
            LogFormat::Legacy => (
                analog_line.strip_prefix("Analog: ")?,
                digital_line.strip_prefix("Digtal: ")?,
            ),
            LogFormat::Compact => (analog_line, digital_line),
        };

        let mut analog = [0u32; ANALOG_CHANNELS];
        let mut fields = analog_body.split(',');
        for value in analog.iter_mut() {
            *value = field_value(fields.next()?, format)?;
        }
        if fields.next().is_some() {
            return None;
        }

        let mut levels = [false; DIGITAL_CHANNELS];
        let mut fields = digital_body.split(',');
        for level in levels.iter_mut() {
            *level = match field_value(fields.next()?, format)? {
                0 => false,
                1 => true,
                _ => return None,
            };
        }
        if fields.next().is_some() {
            return None;
        }

        Some(Sample::new(analog, DigitalInputs::from_levels(levels)))
    }
}

/// Numeric part of one field: `Chan 2:900mV`, ` Chan 3: 1` or `900`
fn field_value(field: &str, format: LogFormat) -> Option<u32> {
    let raw = match format {
        LogFormat::Legacy => field.split_once(':')?.1,
        LogFormat::Compact => field,
    };
    let raw = raw.trim_start();
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Sample {
        Sample::new([1000, 1050, 900, 1200], DigitalInputs::new(0b0101))
    }

    #[test]
    fn legacy_layout_is_exact() {
        let record = LogRecord::encode(&reference(), LogFormat::Legacy).unwrap();
        assert_eq!(
            record.as_str(),
            "Analog: Chan 0:1000mV, Chan 1:1050mV, Chan 2:900mV, Chan 3:1200 mV.\n\
             Digtal: Chan 0: 1, Chan 1: 0, Chan 2: 1, Chan 3: 0\n"
        );
    }

    #[test]
    fn compact_digital_line_is_lsb_first() {
        let record = LogRecord::encode(&reference(), LogFormat::Compact).unwrap();
        assert_eq!(record.analog_line(), "1000,1050,900,1200");
        assert_eq!(record.digital_line(), "1,0,1,0");
        assert!(record.as_str().ends_with('\n'));
    }

    #[test]
    fn widest_sample_fits() {
        let sample = Sample::new([u32::MAX; 4], DigitalInputs::new(0x0F));
        for format in [LogFormat::Legacy, LogFormat::Compact] {
            assert!(LogRecord::encode(&sample, format).is_ok());
        }
    }

    #[test]
    fn parse_reads_back_both_layouts() {
        for format in [LogFormat::Legacy, LogFormat::Compact] {
            let record = LogRecord::encode(&reference(), format).unwrap();
            assert_eq!(LogRecord::parse(record.as_str(), format), Some(reference()));
        }
    }

    #[test]
    fn parse_rejects_truncated_block() {
        assert_eq!(LogRecord::parse("1,2,3,4\n", LogFormat::Compact), None);
        assert_eq!(LogRecord::parse("1,2,3\n0,0,0,0\n", LogFormat::Compact), None);
        assert_eq!(LogRecord::parse("1,2,3,4\n0,2,0,0\n", LogFormat::Compact), None);
    }
}
