//! Sample processing: smoothing, DC removal, unit conversion and RMS
//!
//! All transforms write into caller-provided buffers so the engine can size
//! them once at startup and reuse them every cycle.

use crate::acquisition::gain::GainSetting;

/// Symmetric moving-average filter with an odd tap count
///
/// Window indices outside the sequence are clamped to the nearest end
/// sample, so output length always equals input length and no artificial
/// step is introduced at the boundaries.
///
/// # Example
/// ```
/// use voltmon_core::acquisition::dsp::MovingAverage;
///
/// let filter = MovingAverage::new(3);
/// let mut out = [0u16; 4];
/// filter.apply(&[0, 30, 0, 30], &mut out);
/// assert_eq!(out, [10, 10, 20, 20]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    taps: usize,
}

impl MovingAverage {
    /// Create a filter; an even tap count is rounded up to the next odd one
    pub fn new(taps: usize) -> Self {
        Self { taps: taps | 1 }
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Filter `input` into `output` (lengths must match)
    pub fn apply(&self, input: &[u16], output: &mut [u16]) {
        debug_assert_eq!(input.len(), output.len());
        let Some(last) = input.len().checked_sub(1) else {
            return;
        };
        let half = (self.taps / 2) as isize;

        for (index, out) in output.iter_mut().enumerate() {
            let center = index as isize;
            let sum: u32 = (center - half..=center + half)
                .map(|source| input[source.clamp(0, last as isize) as usize] as u32)
                .sum();
            *out = (sum / self.taps as u32) as u16;
        }
    }
}

/// Subtract the window mean from every sample
///
/// The sum is accumulated in `i64`; the result stays in raw counts. Each
/// call is independent, which assumes the DC offset is stable within one
/// capture window. Differences are rounded to nearest: truncating toward
/// zero would shrink every sample by up to one count and bias RMS low.
pub fn remove_dc(input: &[u16], output: &mut [i32]) {
    debug_assert_eq!(input.len(), output.len());
    if input.is_empty() {
        return;
    }
    let sum: i64 = input.iter().map(|&s| i64::from(s)).sum();
    let mean = sum as f64 / input.len() as f64;

    for (out, &sample) in output.iter_mut().zip(input) {
        *out = (f64::from(sample) - mean).round() as i32;
    }
}

/// Maps raw counts to volts for each gain setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    /// Full-scale volts per gain, least sensitive first
    full_scale_volts: [f64; GainSetting::COUNT],
    full_scale_counts: u16,
}

impl UnitConverter {
    pub fn new(full_scale_volts: [f64; GainSetting::COUNT], full_scale_counts: u16) -> Self {
        Self {
            full_scale_volts,
            full_scale_counts,
        }
    }

    pub fn full_scale_volts(&self, gain: GainSetting) -> f64 {
        self.full_scale_volts[gain.index()]
    }

    pub fn full_scale_counts(&self) -> u16 {
        self.full_scale_counts
    }

    /// Linear conversion, no clamping
    pub fn counts_to_volts(&self, gain: GainSetting, counts: i32) -> f64 {
        f64::from(counts) * self.full_scale_volts(gain) / f64::from(self.full_scale_counts)
    }
}

/// RMS voltage of a zero-centred sequence
///
/// Squares are summed in `f64`; an empty sequence yields 0.
pub fn rms_volts(ac_counts: &[i32], gain: GainSetting, converter: &UnitConverter) -> f64 {
    if ac_counts.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = ac_counts
        .iter()
        .map(|&c| {
            let volts = converter.counts_to_volts(gain, c);
            volts * volts
        })
        .sum();
    (sum_sq / ac_counts.len() as f64).sqrt()
}

/// Volts to whole millivolts, saturating at the `i16` range
pub fn quantize_millivolts(volts: f64) -> i16 {
    let millivolts = (volts * 1000.0).round();
    millivolts.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// True when any sample reaches or exceeds `full_scale_counts`
pub fn is_saturated(filtered: &[u16], full_scale_counts: u16) -> bool {
    filtered.iter().any(|&s| s >= full_scale_counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn converter() -> UnitConverter {
        UnitConverter::new([3.9, 2.2, 1.5, 1.1], 4095)
    }

    #[test]
    fn test_filter_preserves_length() {
        let filter = MovingAverage::new(5);
        for len in [0usize, 1, 2, 3, 7, 120] {
            let input: Vec<u16> = (0..len as u16).collect();
            let mut output = vec![0u16; len];
            filter.apply(&input, &mut output);
            assert_eq!(output.len(), input.len());
        }
    }

    #[test]
    fn test_filter_clamps_edges() {
        let filter = MovingAverage::new(5);
        let input = [100u16, 200, 300, 400, 500];
        let mut output = [0u16; 5];
        filter.apply(&input, &mut output);
        // index 0 window: [100, 100, 100, 200, 300]
        assert_eq!(output[0], 160);
        // index 2 window is fully inside
        assert_eq!(output[2], 300);
        // index 4 window: [300, 400, 500, 500, 500]
        assert_eq!(output[4], 440);
    }

    #[test]
    fn test_filter_single_sample() {
        let filter = MovingAverage::new(5);
        let mut output = [0u16; 1];
        filter.apply(&[777], &mut output);
        assert_eq!(output, [777]);
    }

    #[test]
    fn test_filter_keeps_full_scale_constant() {
        let filter = MovingAverage::new(5);
        let input = [4095u16; 16];
        let mut output = [0u16; 16];
        filter.apply(&input, &mut output);
        assert!(output.iter().all(|&s| s == 4095));
    }

    #[test]
    fn test_even_taps_rounded_to_odd() {
        assert_eq!(MovingAverage::new(4).taps(), 5);
        assert_eq!(MovingAverage::new(5).taps(), 5);
    }

    #[test]
    fn test_remove_dc_constant_is_zero() {
        for value in [0u16, 1, 2047, 4095] {
            let input = vec![value; 120];
            let mut output = vec![99i32; 120];
            remove_dc(&input, &mut output);
            assert!(output.iter().all(|&s| s == 0), "constant {value}");
        }
    }

    #[test]
    fn test_remove_dc_centres_signal() {
        let input = [1000u16, 1200, 1000, 1200];
        let mut output = [0i32; 4];
        remove_dc(&input, &mut output);
        assert_eq!(output, [-100, 100, -100, 100]);
        assert_eq!(output.iter().sum::<i32>(), 0);
    }

    #[test]
    fn test_remove_dc_rounds_half_counts_outward() {
        // Mean 11.5: truncation would give [-1, 1]
        let input = [10u16, 13];
        let mut output = [0i32; 2];
        remove_dc(&input, &mut output);
        assert_eq!(output, [-2, 2]);
    }

    #[test]
    fn test_counts_to_volts_per_gain() {
        let conv = converter();
        assert_relative_eq!(conv.counts_to_volts(GainSetting::Atten12Db, 4095), 3.9, epsilon = 1e-12);
        assert_relative_eq!(conv.counts_to_volts(GainSetting::Atten0Db, 4095), 1.1, epsilon = 1e-12);
        assert_relative_eq!(conv.counts_to_volts(GainSetting::Atten6Db, -4095), -2.2, epsilon = 1e-12);
        assert_eq!(conv.counts_to_volts(GainSetting::Atten2p5Db, 0), 0.0);
    }

    #[test]
    fn test_rms_of_sinusoid() {
        let conv = converter();
        let gain = GainSetting::Atten12Db;
        // 1.0 V amplitude, 50 Hz at 2 kHz, three whole periods
        let amplitude_counts = 1.0 / conv.full_scale_volts(gain) * 4095.0;
        let ac: Vec<i32> = (0..120)
            .map(|n| {
                let phase = 2.0 * PI * 50.0 * n as f64 / 2000.0;
                (amplitude_counts * phase.sin()).round() as i32
            })
            .collect();

        let rms = rms_volts(&ac, gain, &conv);
        assert_relative_eq!(rms, 1.0 / 2f64.sqrt(), max_relative = 0.02);
    }

    #[test]
    fn test_rms_of_empty_is_zero() {
        assert_eq!(rms_volts(&[], GainSetting::Atten0Db, &converter()), 0.0);
    }

    #[test]
    fn test_rms_of_square_wave() {
        let conv = converter();
        let ac = [4095, -4095, 4095, -4095];
        assert_relative_eq!(rms_volts(&ac, GainSetting::Atten0Db, &conv), 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_quantize_saturates() {
        assert_eq!(quantize_millivolts(32.8), i16::MAX);
        assert_eq!(quantize_millivolts(-40.0), i16::MIN);
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        assert_eq!(quantize_millivolts(0.0014), 1);
        assert_eq!(quantize_millivolts(0.0016), 2);
        assert_eq!(quantize_millivolts(-0.0016), -2);
        assert_eq!(quantize_millivolts(1.234), 1234);
    }

    #[test]
    fn test_saturation_includes_exact_full_scale() {
        assert!(is_saturated(&[0, 10, 4095], 4095));
        assert!(!is_saturated(&[0, 10, 4094], 4095));
        assert!(!is_saturated(&[], 4095));
    }
}
