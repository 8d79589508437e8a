//! Simulated channel reader
//!
//! Stands in for the ADC and GPIO drivers on hosts without hardware. Each
//! analog channel follows a triangle wave over `0..=full_scale` millivolts,
//! phase-shifted by a quarter period per channel. The digital inputs count
//! up in binary, one step per read.

use sensornode_core::{ChannelReader, DigitalInputs, InitError, InitResult, Sample, ANALOG_CHANNELS};

/// Default full-scale input, matching a 3.3 V ADC reference
pub const DEFAULT_FULL_SCALE_MV: u32 = 3300;

/// Reads per triangle period
const WAVE_STEPS: u32 = 32;

/// Deterministic waveform generator
#[derive(Debug, Clone)]
pub struct SimulatedChannels {
    full_scale_mv: u32,
    tick: u32,
}

impl SimulatedChannels {
    /// Generator with the default full scale
    pub fn new() -> Self {
        Self::with_full_scale(DEFAULT_FULL_SCALE_MV)
    }

    /// Generator with a custom full scale
    pub fn with_full_scale(full_scale_mv: u32) -> Self {
        Self { full_scale_mv, tick: 0 }
    }

    fn triangle(&self, step: u32) -> u32 {
        let half = WAVE_STEPS / 2;
        let pos = step % WAVE_STEPS;
        let rising = if pos < half { pos } else { WAVE_STEPS - pos };
        self.full_scale_mv / half * rising
    }
}

impl Default for SimulatedChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelReader for SimulatedChannels {
    fn setup(&mut self) -> InitResult<()> {
        if self.full_scale_mv < WAVE_STEPS {
            return Err(InitError::ChannelReader {
                reason: "full scale too small for the simulated waveform",
            });
        }
        log::info!("Simulated channels ready, full scale {} mV", self.full_scale_mv);
        Ok(())
    }

    fn read(&mut self) -> Sample {
        let mut analog = [0u32; ANALOG_CHANNELS];
        for (channel, value) in analog.iter_mut().enumerate() {
            let phase = channel as u32 * WAVE_STEPS / 4;
            *value = self.triangle(self.tick.wrapping_add(phase));
        }
        let digital = DigitalInputs::new(self.tick as u8);

        self.tick = self.tick.wrapping_add(1);
        Sample::new(analog, digital)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_in_range() {
        let mut channels = SimulatedChannels::new();
        channels.setup().unwrap();

        for _ in 0..(WAVE_STEPS * 3) {
            let sample = channels.read();
            assert!(sample.analog().iter().all(|&mv| mv <= DEFAULT_FULL_SCALE_MV));
        }
    }

    #[test]
    fn channels_are_phase_shifted() {
        let mut channels = SimulatedChannels::new();
        let first = channels.read();
        assert_eq!(first.analog()[0], 0);
        assert_ne!(first.analog()[0], first.analog()[1]);
    }

    #[test]
    fn digital_inputs_count() {
        let mut channels = SimulatedChannels::new();
        let bits: Vec<u8> = (0..4).map(|_| channels.read().digital().bits()).collect();
        assert_eq!(bits, [0, 1, 2, 3]);
    }

    #[test]
    fn tiny_full_scale_fails_setup() {
        let mut channels = SimulatedChannels::with_full_scale(1);
        assert!(matches!(channels.setup(), Err(InitError::ChannelReader { .. })));
    }
}
