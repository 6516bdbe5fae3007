//! Latest measurement, shared with readers
//!
//! The acquisition engine writes a [`MeasurementResult`] and the matching
//! [`WaveformSnapshot`] together under one lock; readers copy out under the
//! same lock. A reader therefore never sees a result and waveform from two
//! different cycles, and neither side holds the lock for anything longer
//! than a copy.

use crate::acquisition::gain::GainSetting;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// RMS outcome of one acquisition cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    /// Channel A RMS in volts
    pub rms_volts_a: f64,
    /// Channel B RMS in volts
    pub rms_volts_b: f64,
    /// Monotonic clock reading at publish, in microseconds
    pub timestamp_us: i64,
    pub gain_a: GainSetting,
    pub gain_b: GainSetting,
    /// Samples per channel in the capture window
    pub sample_count: usize,
}

/// AC waveform of one acquisition cycle in millivolts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformSnapshot {
    pub ac_millivolts_a: Vec<i16>,
    pub ac_millivolts_b: Vec<i16>,
    /// Samples per channel in the originating capture window
    pub sample_count: usize,
    pub timestamp_us: i64,
    pub gain_a: GainSetting,
    pub gain_b: GainSetting,
}

impl WaveformSnapshot {
    /// Copy of the first `max_samples` samples per channel
    pub fn prefix(&self, max_samples: usize) -> Self {
        let take = max_samples.min(self.ac_millivolts_a.len());
        Self {
            ac_millivolts_a: self.ac_millivolts_a[..take].to_vec(),
            ac_millivolts_b: self.ac_millivolts_b[..take.min(self.ac_millivolts_b.len())].to_vec(),
            sample_count: self.sample_count,
            timestamp_us: self.timestamp_us,
            gain_a: self.gain_a,
            gain_b: self.gain_b,
        }
    }

    /// Samples held per channel
    pub fn len(&self) -> usize {
        self.ac_millivolts_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ac_millivolts_a.is_empty()
    }
}

#[derive(Debug)]
struct Latest {
    result: MeasurementResult,
    waveform: WaveformSnapshot,
}

/// Lock-protected cache of the latest cycle
#[derive(Debug, Default)]
pub struct PublishedState {
    latest: Mutex<Option<Latest>>,
}

impl PublishedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<Latest>> {
        // The pair is only ever replaced wholesale, so a poisoned guard
        // still holds a consistent value.
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace result and waveform in one step
    pub fn publish(&self, result: MeasurementResult, waveform: WaveformSnapshot) {
        let latest = Latest { result, waveform };
        *self.guard() = Some(latest);
    }

    /// Latest result, or `None` before the first successful cycle
    pub fn read_latest_result(&self) -> Option<MeasurementResult> {
        self.guard().as_ref().map(|l| l.result.clone())
    }

    /// Up to `max_samples` samples per channel of the latest waveform
    ///
    /// Returns the snapshot prefix and the number of samples it holds.
    pub fn read_latest_waveform(&self, max_samples: usize) -> Option<(WaveformSnapshot, usize)> {
        let snapshot = self
            .guard()
            .as_ref()
            .map(|l| l.waveform.prefix(max_samples))?;
        let returned = snapshot.len();
        Some((snapshot, returned))
    }

    /// Result and full waveform from the same cycle
    pub fn read_latest(&self) -> Option<(MeasurementResult, WaveformSnapshot)> {
        self.guard()
            .as_ref()
            .map(|l| (l.result.clone(), l.waveform.clone()))
    }

    pub fn has_value(&self) -> bool {
        self.guard().is_some()
    }
}
