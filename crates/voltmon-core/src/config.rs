//! Acquisition configuration
//!
//! Sampling, filtering and converter constants for the pipeline. Stored as
//! JSON; any field missing from the file takes its default.

use crate::acquisition::gain::GainSetting;
use crate::acquisition::reader::{BitWidth, ChannelId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Lowest accepted per-channel sample rate
pub const MIN_SAMPLE_RATE_HZ: u32 = 100;

/// Highest accepted per-channel sample rate
pub const MAX_SAMPLE_RATE_HZ: u32 = 20_000;

/// Longest accepted capture window, one second at the highest rate
pub const MAX_SAMPLES_PER_CHANNEL: usize = 20_000;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("filter tap count must be odd and non-zero, got {0}")]
    InvalidFilterTaps(usize),

    #[error("sample rate {0} Hz outside {min}..={max} Hz", min = MIN_SAMPLE_RATE_HZ, max = MAX_SAMPLE_RATE_HZ)]
    SampleRateOutOfRange(u32),

    #[error("signal frequency and periods to capture must be non-zero")]
    InvalidCaptureWindow,

    #[error("capture window holds no samples")]
    EmptyCaptureWindow,

    #[error("capture window of {0} samples exceeds {max}", max = MAX_SAMPLES_PER_CHANNEL)]
    CaptureWindowTooLong(usize),

    #[error("{taps}-tap filter longer than the {samples}-sample window")]
    FilterLongerThanWindow { taps: usize, samples: usize },

    #[error("full-scale volts must be positive and strictly decreasing from least to most sensitive gain")]
    InvalidFullScaleVolts,

    #[error("full-scale counts {counts} invalid for {bits}-bit converter")]
    InvalidFullScaleCounts { counts: u16, bits: u8 },

    #[error("channels A and B must be different hardware channels")]
    DuplicateChannel,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_channel_a() -> ChannelId {
    ChannelId(6)
}

fn default_channel_b() -> ChannelId {
    ChannelId(7)
}

fn default_signal_hz() -> u32 {
    50
}

fn default_periods_to_capture() -> u32 {
    3
}

fn default_sample_rate_hz() -> u32 {
    crate::DEFAULT_SAMPLE_RATE
}

fn default_filter_taps() -> usize {
    5
}

fn default_bit_width() -> BitWidth {
    BitWidth::Bits12
}

fn default_full_scale_counts() -> u16 {
    crate::DEFAULT_FULL_SCALE_COUNTS
}

fn default_full_scale_volts() -> [f64; GainSetting::COUNT] {
    [3.9, 2.2, 1.5, 1.1]
}

fn default_max_ranging_iterations() -> u32 {
    crate::acquisition::ranger::MAX_RANGING_ITERATIONS
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Hardware channel sampled as input A
    #[serde(default = "default_channel_a")]
    pub channel_a: ChannelId,
    /// Hardware channel sampled as input B
    #[serde(default = "default_channel_b")]
    pub channel_b: ChannelId,
    /// Expected signal frequency, sizes the capture window
    #[serde(default = "default_signal_hz")]
    pub signal_hz: u32,
    /// Whole signal periods per capture window
    #[serde(default = "default_periods_to_capture")]
    pub periods_to_capture: u32,
    /// Per-channel sample rate in Hz
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    /// Moving-average length (odd)
    #[serde(default = "default_filter_taps")]
    pub filter_taps: usize,
    #[serde(default = "default_bit_width")]
    pub bit_width: BitWidth,
    /// Raw count treated as full scale / saturation
    #[serde(default = "default_full_scale_counts")]
    pub full_scale_counts: u16,
    /// Full-scale volts per gain, least sensitive first
    #[serde(default = "default_full_scale_volts")]
    pub full_scale_volts: [f64; GainSetting::COUNT],
    /// Probe budget for one ranging pass
    #[serde(default = "default_max_ranging_iterations")]
    pub max_ranging_iterations: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channel_a: default_channel_a(),
            channel_b: default_channel_b(),
            signal_hz: default_signal_hz(),
            periods_to_capture: default_periods_to_capture(),
            sample_rate_hz: default_sample_rate_hz(),
            filter_taps: default_filter_taps(),
            bit_width: default_bit_width(),
            full_scale_counts: default_full_scale_counts(),
            full_scale_volts: default_full_scale_volts(),
            max_ranging_iterations: default_max_ranging_iterations(),
        }
    }
}

impl AcquisitionConfig {
    /// Capture window length in milliseconds
    pub fn capture_ms(&self) -> u64 {
        if self.signal_hz == 0 {
            return 0;
        }
        1000 * u64::from(self.periods_to_capture) / u64::from(self.signal_hz)
    }

    /// Samples captured per channel in one window
    pub fn samples_per_channel(&self) -> usize {
        let samples = u64::from(self.sample_rate_hz).saturating_mul(self.capture_ms()) / 1000;
        usize::try_from(samples).unwrap_or(usize::MAX)
    }

    /// Interval between paired reads in microseconds
    pub fn sample_period_us(&self) -> u64 {
        1_000_000 / u64::from(self.sample_rate_hz.max(1))
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_taps == 0 || self.filter_taps % 2 == 0 {
            return Err(ConfigError::InvalidFilterTaps(self.filter_taps));
        }
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&self.sample_rate_hz) {
            return Err(ConfigError::SampleRateOutOfRange(self.sample_rate_hz));
        }
        if self.signal_hz == 0 || self.periods_to_capture == 0 {
            return Err(ConfigError::InvalidCaptureWindow);
        }
        let samples = self.samples_per_channel();
        if samples == 0 {
            return Err(ConfigError::EmptyCaptureWindow);
        }
        if samples > MAX_SAMPLES_PER_CHANNEL {
            return Err(ConfigError::CaptureWindowTooLong(samples));
        }
        if self.filter_taps > samples {
            return Err(ConfigError::FilterLongerThanWindow {
                taps: self.filter_taps,
                samples,
            });
        }
        let volts = &self.full_scale_volts;
        let positive = volts.iter().all(|&v| v.is_finite() && v > 0.0);
        if !positive || volts.windows(2).any(|w| w[1] >= w[0]) {
            return Err(ConfigError::InvalidFullScaleVolts);
        }
        if self.full_scale_counts == 0 || self.full_scale_counts > self.bit_width.max_count() {
            return Err(ConfigError::InvalidFullScaleCounts {
                counts: self.full_scale_counts,
                bits: self.bit_width.bits(),
            });
        }
        if self.channel_a == self.channel_b {
            return Err(ConfigError::DuplicateChannel);
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.capture_ms(), 60);
        assert_eq!(config.samples_per_channel(), 120);
        assert_eq!(config.sample_period_us(), 500);
        assert_eq!(config.channel_a, ChannelId(6));
        assert_eq!(config.channel_b, ChannelId(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AcquisitionConfig::from_json("{}").unwrap();
        assert_eq!(config, AcquisitionConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config =
            AcquisitionConfig::from_json(r#"{"sample_rate_hz": 4000, "bit_width": 12}"#).unwrap();
        assert_eq!(config.sample_rate_hz, 4000);
        assert_eq!(config.samples_per_channel(), 240);
        assert_eq!(config.filter_taps, 5);
    }

    #[test]
    fn test_rejects_even_taps() {
        let config = AcquisitionConfig {
            filter_taps: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFilterTaps(4))
        ));
    }

    #[test]
    fn test_rejects_sample_rate_out_of_range() {
        let config = AcquisitionConfig {
            sample_rate_hz: 50_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleRateOutOfRange(50_000))
        ));
    }

    #[test]
    fn test_huge_period_count_rejected_without_overflow() {
        let config = AcquisitionConfig {
            periods_to_capture: 5_000_000,
            ..Default::default()
        };
        assert_eq!(config.capture_ms(), 100_000_000);
        assert_eq!(config.samples_per_channel(), 200_000_000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CaptureWindowTooLong(200_000_000))
        ));

        let config = AcquisitionConfig {
            signal_hz: 1,
            periods_to_capture: u32::MAX,
            sample_rate_hz: MAX_SAMPLE_RATE_HZ,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CaptureWindowTooLong(_))
        ));
    }

    #[test]
    fn test_longest_window_accepted() {
        let config = AcquisitionConfig {
            signal_hz: 1,
            periods_to_capture: 1,
            sample_rate_hz: MAX_SAMPLE_RATE_HZ,
            ..Default::default()
        };
        assert_eq!(config.samples_per_channel(), MAX_SAMPLES_PER_CHANNEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_filter_longer_than_window() {
        // 1 period of 50 Hz at 100 Hz: 2 samples
        let config = AcquisitionConfig {
            periods_to_capture: 1,
            sample_rate_hz: MIN_SAMPLE_RATE_HZ,
            ..Default::default()
        };
        assert_eq!(config.samples_per_channel(), 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FilterLongerThanWindow { taps: 5, samples: 2 })
        ));
    }

    #[test]
    fn test_oversized_window_in_json() {
        assert!(matches!(
            AcquisitionConfig::from_json(r#"{"signal_hz": 1, "periods_to_capture": 4000000}"#),
            Err(ConfigError::CaptureWindowTooLong(_))
        ));
    }

    #[test]
    fn test_rejects_unordered_full_scale() {
        let config = AcquisitionConfig {
            full_scale_volts: [3.9, 1.5, 2.2, 1.1],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFullScaleVolts)
        ));
    }

    #[test]
    fn test_rejects_counts_beyond_bit_width() {
        let config = AcquisitionConfig {
            bit_width: BitWidth::Bits10,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFullScaleCounts { counts: 4095, bits: 10 })
        ));
    }

    #[test]
    fn test_rejects_bad_bit_width_in_json() {
        assert!(matches!(
            AcquisitionConfig::from_json(r#"{"bit_width": 16}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acquisition.json");
        std::fs::write(&path, r#"{"signal_hz": 60, "periods_to_capture": 6}"#).unwrap();

        let config = AcquisitionConfig::load(&path).unwrap();
        assert_eq!(config.capture_ms(), 100);
        assert_eq!(config.samples_per_channel(), 200);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AcquisitionConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
