//! Paired-channel capture from the analog front end
//!
//! Provides:
//! - The [`AnalogFrontEnd`] contract the converter driver implements
//! - [`CaptureWindow`], a caller-allocated pair of raw sample buffers
//! - [`PairedSampler`], which fills a window at a fixed sample period
//!
//! ## Timing
//!
//! Sampling uses a next-deadline accumulator: each pair of reads is due at
//! `start + k * period`, and the loop only sleeps for whatever is left of
//! the current slot. Read latency is absorbed by the slot instead of being
//! added to it, so timing error does not build up across the window.

use crate::acquisition::clock::Clock;
use crate::acquisition::gain::GainSetting;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Hardware channel number on the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Logical input of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const BOTH: [Channel; 2] = [Channel::A, Channel::B];

    pub fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

/// Converter resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitWidth {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl BitWidth {
    pub fn bits(self) -> u8 {
        match self {
            BitWidth::Bits9 => 9,
            BitWidth::Bits10 => 10,
            BitWidth::Bits11 => 11,
            BitWidth::Bits12 => 12,
        }
    }

    /// Largest raw count the converter can report
    pub fn max_count(self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

impl TryFrom<u8> for BitWidth {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            9 => Ok(BitWidth::Bits9),
            10 => Ok(BitWidth::Bits10),
            11 => Ok(BitWidth::Bits11),
            12 => Ok(BitWidth::Bits12),
            other => Err(format!("unsupported bit width: {other}")),
        }
    }
}

impl From<BitWidth> for u8 {
    fn from(width: BitWidth) -> Self {
        width.bits()
    }
}

/// A channel could not be configured or read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareFault {
    #[error("read failed on {channel}: {reason}")]
    ReadFailed { channel: ChannelId, reason: String },

    #[error("failed to configure {channel}: {reason}")]
    ConfigureFailed { channel: ChannelId, reason: String },
}

impl HardwareFault {
    pub fn channel(&self) -> ChannelId {
        match self {
            HardwareFault::ReadFailed { channel, .. }
            | HardwareFault::ConfigureFailed { channel, .. } => *channel,
        }
    }
}

/// Analog-to-digital converter driver
///
/// Reads are blocking and may take a variable amount of time.
pub trait AnalogFrontEnd: Send {
    /// Apply a gain setting and resolution to one channel before capture
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        gain: GainSetting,
        bit_width: BitWidth,
    ) -> Result<(), HardwareFault>;

    /// Take a single raw sample
    fn read_raw(&mut self, channel: ChannelId) -> Result<u16, HardwareFault>;
}

impl<T: AnalogFrontEnd + ?Sized> AnalogFrontEnd for Box<T> {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        gain: GainSetting,
        bit_width: BitWidth,
    ) -> Result<(), HardwareFault> {
        (**self).configure_channel(channel, gain, bit_width)
    }

    fn read_raw(&mut self, channel: ChannelId) -> Result<u16, HardwareFault> {
        (**self).read_raw(channel)
    }
}

/// Fixed-length pair of raw sample sequences for channels A and B
///
/// Buffers are allocated once and reused. Only a fully captured window
/// exposes samples; a failed capture leaves it empty.
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    a: Vec<u16>,
    b: Vec<u16>,
    filled: usize,
}

impl CaptureWindow {
    pub fn with_capacity(samples_per_channel: usize) -> Self {
        Self {
            a: vec![0; samples_per_channel],
            b: vec![0; samples_per_channel],
            filled: 0,
        }
    }

    /// Samples per channel in a complete window
    pub fn capacity(&self) -> usize {
        self.a.len()
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.capacity() && self.capacity() > 0
    }

    /// Samples for one channel; empty unless the window is complete
    pub fn channel(&self, channel: Channel) -> &[u16] {
        if !self.is_complete() {
            return &[];
        }
        match channel {
            Channel::A => &self.a,
            Channel::B => &self.b,
        }
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }
}

/// Reads both channels at a fixed period into a [`CaptureWindow`]
#[derive(Debug, Clone, Copy)]
pub struct PairedSampler {
    channels: [ChannelId; 2],
    period_us: u64,
    bit_width: BitWidth,
}

impl PairedSampler {
    /// # Arguments
    /// * `channels` - Hardware channels for A and B
    /// * `sample_rate_hz` - Per-channel sample rate (non-zero)
    /// * `bit_width` - Resolution applied whenever gains are configured
    pub fn new(channels: [ChannelId; 2], sample_rate_hz: u32, bit_width: BitWidth) -> Self {
        Self {
            channels,
            period_us: 1_000_000 / u64::from(sample_rate_hz.max(1)),
            bit_width,
        }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    pub fn channel_id(&self, channel: Channel) -> ChannelId {
        self.channels[channel.index()]
    }

    /// Apply one gain per channel
    pub fn configure<F: AnalogFrontEnd + ?Sized>(
        &self,
        frontend: &mut F,
        gains: [GainSetting; 2],
    ) -> Result<(), HardwareFault> {
        for channel in Channel::BOTH {
            frontend.configure_channel(
                self.channel_id(channel),
                gains[channel.index()],
                self.bit_width,
            )?;
        }
        Ok(())
    }

    /// Fill `window` with paired samples
    ///
    /// Any read failure aborts the capture and leaves the window empty.
    pub fn capture<F, C>(
        &self,
        frontend: &mut F,
        clock: &C,
        window: &mut CaptureWindow,
    ) -> Result<(), HardwareFault>
    where
        F: AnalogFrontEnd + ?Sized,
        C: Clock + ?Sized,
    {
        window.clear();
        let outcome = self.fill(frontend, clock, window);
        if let Err(fault) = &outcome {
            window.clear();
            error!(channel = %fault.channel(), error = %fault, "Capture aborted");
        }
        outcome
    }

    fn fill<F, C>(
        &self,
        frontend: &mut F,
        clock: &C,
        window: &mut CaptureWindow,
    ) -> Result<(), HardwareFault>
    where
        F: AnalogFrontEnd + ?Sized,
        C: Clock + ?Sized,
    {
        let [id_a, id_b] = self.channels;
        let mut next_due_us = clock.now_us();

        for index in 0..window.capacity() {
            let now_us = clock.now_us();
            if now_us < next_due_us {
                clock.delay_us((next_due_us - now_us) as u64);
            }

            let raw_a = frontend.read_raw(id_a)?;
            let raw_b = frontend.read_raw(id_b)?;
            window.a[index] = raw_a;
            window.b[index] = raw_b;
            window.filled = index + 1;

            next_due_us += self.period_us as i64;
        }

        Ok(())
    }
}
