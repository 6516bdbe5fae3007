//! Synthetic analog front end
//!
//! Generates a sinusoid per channel, sampled at the configured rate, and
//! digitises it against the full-scale range of whichever gain the channel
//! is currently set to. Values beyond the range clamp to `0` or full scale,
//! so an over-sensitive gain saturates exactly the way a real converter does.

use crate::acquisition::gain::GainSetting;
use crate::acquisition::reader::{AnalogFrontEnd, BitWidth, Channel, ChannelId, HardwareFault};
use crate::config::AcquisitionConfig;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

fn default_frequency_hz() -> f64 {
    50.0
}

/// Voltage waveform presented to one input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSignal {
    /// Peak AC amplitude in volts
    #[serde(default)]
    pub amplitude_volts: f64,
    /// DC bias in volts
    #[serde(default)]
    pub offset_volts: f64,
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,
    #[serde(default)]
    pub phase_rad: f64,
}

impl ChannelSignal {
    /// Constant voltage
    pub fn dc(volts: f64) -> Self {
        Self {
            amplitude_volts: 0.0,
            offset_volts: volts,
            frequency_hz: default_frequency_hz(),
            phase_rad: 0.0,
        }
    }

    /// Sinusoid riding on a DC bias
    pub fn sine(amplitude_volts: f64, offset_volts: f64, frequency_hz: f64) -> Self {
        Self {
            amplitude_volts,
            offset_volts,
            frequency_hz,
            phase_rad: 0.0,
        }
    }

    /// Instantaneous voltage at `t_secs`
    pub fn volts_at(&self, t_secs: f64) -> f64 {
        self.offset_volts
            + self.amplitude_volts * (2.0 * PI * self.frequency_hz * t_secs + self.phase_rad).sin()
    }

    /// Expected RMS of the AC part
    pub fn ac_rms_volts(&self) -> f64 {
        self.amplitude_volts / 2f64.sqrt()
    }
}

impl Default for ChannelSignal {
    fn default() -> Self {
        Self::sine(1.0, 1.65, default_frequency_hz())
    }
}

/// Deterministic [`AnalogFrontEnd`] for hosts without converter hardware
#[derive(Debug, Clone)]
pub struct SimulatedFrontEnd {
    ids: [ChannelId; 2],
    sample_rate_hz: u32,
    full_scale_volts: [f64; GainSetting::COUNT],
    full_scale_counts: u16,
    signals: [ChannelSignal; 2],
    gains: [GainSetting; 2],
    sample_index: [u64; 2],
    reads: usize,
    fail_after: Option<usize>,
}

impl SimulatedFrontEnd {
    pub fn new(
        ids: [ChannelId; 2],
        sample_rate_hz: u32,
        full_scale_volts: [f64; GainSetting::COUNT],
        full_scale_counts: u16,
        signals: [ChannelSignal; 2],
    ) -> Self {
        Self {
            ids,
            sample_rate_hz: sample_rate_hz.max(1),
            full_scale_volts,
            full_scale_counts,
            signals,
            gains: [GainSetting::LEAST_SENSITIVE; 2],
            sample_index: [0; 2],
            reads: 0,
            fail_after: None,
        }
    }

    /// Build a front end matching an acquisition config
    pub fn from_config(config: &AcquisitionConfig, signals: [ChannelSignal; 2]) -> Self {
        Self::new(
            [config.channel_a, config.channel_b],
            config.sample_rate_hz,
            config.full_scale_volts,
            config.full_scale_counts,
            signals,
        )
    }

    pub fn signal(&self, channel: Channel) -> &ChannelSignal {
        &self.signals[channel.index()]
    }

    pub fn set_signal(&mut self, channel: Channel, signal: ChannelSignal) {
        self.signals[channel.index()] = signal;
    }

    /// Gain most recently applied to a channel
    pub fn gain(&self, channel: Channel) -> GainSetting {
        self.gains[channel.index()]
    }

    /// Total successful reads so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Fail every read once `reads` reads have succeeded
    pub fn fail_after_reads(&mut self, reads: usize) {
        self.fail_after = Some(self.reads + reads);
    }

    pub fn clear_fault(&mut self) {
        self.fail_after = None;
    }

    fn lane(&self, id: ChannelId) -> Option<usize> {
        self.ids.iter().position(|&known| known == id)
    }

    fn digitise(&self, volts: f64, gain: GainSetting) -> u16 {
        let full_scale = f64::from(self.full_scale_counts);
        let counts = (volts / self.full_scale_volts[gain.index()] * full_scale).round();
        counts.clamp(0.0, full_scale) as u16
    }
}

impl AnalogFrontEnd for SimulatedFrontEnd {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        gain: GainSetting,
        _bit_width: BitWidth,
    ) -> Result<(), HardwareFault> {
        let lane = self
            .lane(channel)
            .ok_or_else(|| HardwareFault::ConfigureFailed {
                channel,
                reason: "no such channel".to_string(),
            })?;
        self.gains[lane] = gain;
        Ok(())
    }

    fn read_raw(&mut self, channel: ChannelId) -> Result<u16, HardwareFault> {
        let lane = self.lane(channel).ok_or_else(|| HardwareFault::ReadFailed {
            channel,
            reason: "no such channel".to_string(),
        })?;
        if self.fail_after.is_some_and(|limit| self.reads >= limit) {
            return Err(HardwareFault::ReadFailed {
                channel,
                reason: "simulated fault".to_string(),
            });
        }

        let t_secs = self.sample_index[lane] as f64 / f64::from(self.sample_rate_hz);
        self.sample_index[lane] += 1;
        self.reads += 1;

        let volts = self.signals[lane].volts_at(t_secs);
        Ok(self.digitise(volts, self.gains[lane]))
    }
}
