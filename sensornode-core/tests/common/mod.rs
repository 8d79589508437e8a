//! Shared fixtures for the pipeline integration tests
//!
//! - Scripted channel readers with a known sample sequence
//! - A transport replaying a fixed list of outcomes
//! - A delay that records instead of sleeping

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use sensornode_core::{
    ChannelReader, Delay, Delivery, DigitalInputs, Endpoint, Outcome, Sample, Transport,
};

/// Reference sample used across scenarios
pub const REFERENCE: Sample = Sample::new([1000, 1050, 900, 1200], DigitalInputs::new(0b0101));

/// Sample `n` of a deterministic sequence
pub fn numbered(n: u32) -> Sample {
    Sample::new([n, n + 1, n + 2, n + 3], DigitalInputs::new((n % 16) as u8))
}

/// Reader returning `numbered(1)`, `numbered(2)`, ...
#[derive(Debug, Default)]
pub struct CountingChannels {
    next: u32,
}

impl ChannelReader for CountingChannels {
    fn read(&mut self) -> Sample {
        self.next += 1;
        numbered(self.next)
    }
}

/// Reader returning the same sample forever
#[derive(Debug)]
pub struct FixedChannels(pub Sample);

impl ChannelReader for FixedChannels {
    fn read(&mut self) -> Sample {
        self.0
    }
}

/// Successful delivery with a 200 status
pub fn delivered() -> Outcome {
    Outcome::Delivered(Delivery {
        status: Some(200),
        bytes: 32,
    })
}

/// Transport replaying outcomes in order, then delivering
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Outcome>,
    /// Every request the task handed over
    pub requests: Vec<String>,
}

impl ScriptedTransport {
    /// Transport that plays `script` first
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: script.into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, _endpoint: &Endpoint<'_>, request: &str) -> Outcome {
        self.requests.push(request.to_owned());
        self.script.pop_front().unwrap_or_else(delivered)
    }
}

/// Delay that only records what it was asked to wait
#[derive(Debug, Default)]
pub struct RecordingDelay {
    /// Requested pauses, in order
    pub waits: Vec<Duration>,
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.waits.push(duration);
    }
}

/// Pull the four `fieldN=` values out of a request line
pub fn request_fields(request: &str) -> Vec<u32> {
    let query = request
        .split_whitespace()
        .nth(1)
        .and_then(|target| target.split_once('?'))
        .map(|(_, query)| query)
        .unwrap_or("");

    query
        .split('&')
        .filter(|pair| pair.starts_with("field"))
        .filter_map(|pair| pair.split_once('=')?.1.parse().ok())
        .collect()
}
