//! Time-series record of acquisition cycles
//!
//! Keeps counters for completed and failed cycles and a bounded history of
//! published RMS values, stamped with wall-clock time for trend display.

use crate::acquisition::gain::GainSetting;
use crate::acquisition::reader::HardwareFault;
use crate::published::MeasurementResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of RMS points kept in history
const MAX_HISTORY_SIZE: usize = 8640; // 24 hours at one cycle per 10 s

/// RMS values of one published cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmsPoint {
    /// Wall-clock time the cycle was recorded
    pub timestamp: DateTime<Utc>,
    pub rms_volts_a: f64,
    pub rms_volts_b: f64,
    pub gain_a: GainSetting,
    pub gain_b: GainSetting,
}

/// Running counters over all recorded cycles
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CycleStats {
    /// Cycles that published a result
    pub cycles_completed: u64,
    /// Cycles aborted by a hardware fault
    pub cycles_failed: u64,
    /// Failures since the last successful cycle
    pub consecutive_failures: u32,
    /// Message of the most recent hardware fault
    pub last_fault: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub min_rms_a: Option<f64>,
    pub max_rms_a: Option<f64>,
    pub min_rms_b: Option<f64>,
    pub max_rms_b: Option<f64>,
}

fn widen(min: &mut Option<f64>, max: &mut Option<f64>, value: f64) {
    *min = Some(min.map_or(value, |m| m.min(value)));
    *max = Some(max.map_or(value, |m| m.max(value)));
}

/// Statistics store for acquisition cycles
#[derive(Debug)]
pub struct StatsStore {
    history: VecDeque<RmsPoint>,
    max_size: usize,
    stats: CycleStats,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    /// Store keeping at most `max_size` history points
    pub fn with_capacity(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            history: VecDeque::with_capacity(max_size.min(MAX_HISTORY_SIZE)),
            max_size,
            stats: CycleStats::default(),
        }
    }

    /// Record a cycle that published `result`
    pub fn record_success(&mut self, result: &MeasurementResult) {
        self.record_success_at(result, Utc::now());
    }

    fn record_success_at(&mut self, result: &MeasurementResult, timestamp: DateTime<Utc>) {
        if self.history.len() >= self.max_size {
            self.history.pop_front();
        }
        self.history.push_back(RmsPoint {
            timestamp,
            rms_volts_a: result.rms_volts_a,
            rms_volts_b: result.rms_volts_b,
            gain_a: result.gain_a,
            gain_b: result.gain_b,
        });

        let stats = &mut self.stats;
        stats.cycles_completed += 1;
        stats.consecutive_failures = 0;
        stats.last_success = Some(timestamp);
        widen(&mut stats.min_rms_a, &mut stats.max_rms_a, result.rms_volts_a);
        widen(&mut stats.min_rms_b, &mut stats.max_rms_b, result.rms_volts_b);
    }

    /// Record a cycle aborted by `fault`
    pub fn record_failure(&mut self, fault: &HardwareFault) {
        self.stats.cycles_failed += 1;
        self.stats.consecutive_failures += 1;
        self.stats.last_fault = Some(fault.to_string());
    }

    pub fn history(&self) -> &VecDeque<RmsPoint> {
        &self.history
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Reset counters and min/max without dropping history
    pub fn reset_counters(&mut self) {
        self.stats = CycleStats::default();
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}
