//! Sample model
//!
//! One synchronized reading of every analog and digital channel. Samples
//! carry no timestamp: ordering is the order in which the acquisition task
//! produced them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of analog channels sampled per period
pub const ANALOG_CHANNELS: usize = 4;

/// Number of digital inputs packed into the mask
pub const DIGITAL_CHANNELS: usize = 4;

const DIGITAL_MASK: u8 = (1 << DIGITAL_CHANNELS) - 1;

/// Digital input states, bit 0 is channel 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitalInputs(u8);

impl DigitalInputs {
    /// Build from a raw mask. Bits above the channel count are dropped.
    pub const fn new(bits: u8) -> Self {
        Self(bits & DIGITAL_MASK)
    }

    /// Pack individual channel states, channel 0 first
    pub fn from_levels(levels: [bool; DIGITAL_CHANNELS]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &high)| acc | ((high as u8) << i));
        Self(bits)
    }

    /// Raw mask
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// State of one channel. Out of range channels read low.
    pub const fn channel(self, index: usize) -> bool {
        index < DIGITAL_CHANNELS && (self.0 >> index) & 0x01 == 1
    }

    /// Channel states as 0/1, channel 0 first
    pub fn levels(self) -> [u8; DIGITAL_CHANNELS] {
        let mut levels = [0u8; DIGITAL_CHANNELS];
        for (i, level) in levels.iter_mut().enumerate() {
            *level = (self.0 >> i) & 0x01;
        }
        levels
    }
}

/// Immutable snapshot of all channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    analog_mv: [u32; ANALOG_CHANNELS],
    digital: DigitalInputs,
}

impl Sample {
    /// Create a sample from millivolt readings and the digital mask
    pub const fn new(analog_mv: [u32; ANALOG_CHANNELS], digital: DigitalInputs) -> Self {
        Self { analog_mv, digital }
    }

    /// Analog readings in millivolts, channel 0 first
    pub const fn analog(&self) -> [u32; ANALOG_CHANNELS] {
        self.analog_mv
    }

    /// Digital input states
    pub const fn digital(&self) -> DigitalInputs {
        self.digital
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Sample {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "analog={}mV digital={=u8:b}",
            self.analog_mv,
            self.digital.bits()
        )
    }
}
