//! Acquisition engine: one measurement cycle from ranging to publish
//!
//! A cycle walks a fixed sequence of states:
//!
//! ```text
//! Idle -> Ranging -> Capturing -> Processing -> Published -> Idle
//!                        |
//!                        +-- capture fault --> Idle (nothing published)
//! ```
//!
//! Ranging always yields usable gains, even when cut short. A capture fault
//! ends the cycle and leaves the previously published result in place, so
//! readers keep seeing stale-but-valid data.
//!
//! The engine owns the front end, the clock and every buffer the pipeline
//! needs; buffers are sized once from the configured capture length.
//! `run_acquisition_cycle` takes `&mut self`, so cycles cannot overlap.

use crate::acquisition::clock::{Clock, MonotonicClock};
use crate::acquisition::dsp::{quantize_millivolts, remove_dc, rms_volts, MovingAverage, UnitConverter};
use crate::acquisition::gain::GainSetting;
use crate::acquisition::ranger::{AutoRanger, ProbeBuffers, RangeOutcome};
use crate::acquisition::reader::{AnalogFrontEnd, CaptureWindow, Channel, HardwareFault, PairedSampler};
use crate::config::{AcquisitionConfig, ConfigError};
use crate::published::{MeasurementResult, PublishedState, WaveformSnapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the engine is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Waiting for the next cycle
    Idle,
    /// Auto-ranging both channels
    Ranging,
    /// Capturing the measurement window
    Capturing,
    /// Filtering, DC removal, RMS and quantization
    Processing,
    /// Writing into the published state
    Published,
}

/// Measurement-window buffers, separate from the ranging probe buffers
#[derive(Debug, Clone)]
struct CycleBuffers {
    window: CaptureWindow,
    filtered: [Vec<u16>; 2],
    ac: [Vec<i32>; 2],
}

impl CycleBuffers {
    fn new(samples: usize) -> Self {
        Self {
            window: CaptureWindow::with_capacity(samples),
            filtered: [vec![0; samples], vec![0; samples]],
            ac: [vec![0; samples], vec![0; samples]],
        }
    }
}

/// Pipeline context: front end, clock, buffers and published state
pub struct AcquisitionEngine<F, C = MonotonicClock> {
    frontend: F,
    clock: C,
    sampler: PairedSampler,
    filter: MovingAverage,
    converter: UnitConverter,
    ranger: AutoRanger,
    probe_buffers: ProbeBuffers,
    buffers: CycleBuffers,
    published: Arc<PublishedState>,
    state: AcquisitionState,
    last_range: Option<RangeOutcome>,
    sample_rate_hz: u32,
}

impl<F: AnalogFrontEnd> AcquisitionEngine<F, MonotonicClock> {
    /// Engine timed by the system monotonic clock
    pub fn with_monotonic_clock(config: &AcquisitionConfig, frontend: F) -> Result<Self, ConfigError> {
        Self::new(config, frontend, MonotonicClock::new())
    }
}

impl<F: AnalogFrontEnd, C: Clock> AcquisitionEngine<F, C> {
    /// Build the pipeline from a validated config
    pub fn new(config: &AcquisitionConfig, frontend: F, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let samples = config.samples_per_channel();
        let filter = MovingAverage::new(config.filter_taps);

        debug!(
            samples,
            sample_rate_hz = config.sample_rate_hz,
            filter_taps = config.filter_taps,
            "Acquisition engine created"
        );

        Ok(Self {
            frontend,
            clock,
            sampler: PairedSampler::new(
                [config.channel_a, config.channel_b],
                config.sample_rate_hz,
                config.bit_width,
            ),
            filter,
            converter: UnitConverter::new(config.full_scale_volts, config.full_scale_counts),
            ranger: AutoRanger::new(filter, config.full_scale_counts)
                .with_max_iterations(config.max_ranging_iterations),
            probe_buffers: ProbeBuffers::new(samples),
            buffers: CycleBuffers::new(samples),
            published: Arc::new(PublishedState::new()),
            state: AcquisitionState::Idle,
            last_range: None,
            sample_rate_hz: config.sample_rate_hz,
        })
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Shared handle for readers
    pub fn published(&self) -> Arc<PublishedState> {
        Arc::clone(&self.published)
    }

    pub fn samples_per_channel(&self) -> usize {
        self.buffers.window.capacity()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Ranging outcome of the most recent cycle
    pub fn last_range_outcome(&self) -> Option<&RangeOutcome> {
        self.last_range.as_ref()
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    fn transition(&mut self, next: AcquisitionState) {
        debug!(from = ?self.state, to = ?next, "Acquisition state");
        self.state = next;
    }

    /// Run one complete cycle and publish its result
    ///
    /// Returns a copy of the published result. On a capture fault nothing
    /// is published and the fault is returned; the next scheduled cycle is
    /// the retry.
    pub fn run_acquisition_cycle(&mut self) -> Result<MeasurementResult, HardwareFault> {
        self.transition(AcquisitionState::Ranging);
        let outcome = self.ranger.select(
            &self.sampler,
            &mut self.frontend,
            &self.clock,
            &mut self.probe_buffers,
        );
        let gains = outcome.gains;
        self.last_range = Some(outcome);

        self.transition(AcquisitionState::Capturing);
        let captured = self
            .sampler
            .configure(&mut self.frontend, gains)
            .and_then(|()| {
                self.sampler
                    .capture(&mut self.frontend, &self.clock, &mut self.buffers.window)
            });
        if let Err(fault) = captured {
            warn!(error = %fault, "Acquisition cycle aborted, keeping previous result");
            self.transition(AcquisitionState::Idle);
            return Err(fault);
        }

        self.transition(AcquisitionState::Processing);
        let (result, waveform) = self.process(gains);

        self.transition(AcquisitionState::Published);
        info!(
            rms_a = result.rms_volts_a,
            rms_b = result.rms_volts_b,
            gain_a = %result.gain_a,
            gain_b = %result.gain_b,
            "Measurement published"
        );
        self.published.publish(result.clone(), waveform);

        self.transition(AcquisitionState::Idle);
        Ok(result)
    }

    /// Filter, remove DC, compute RMS and quantize both channels
    fn process(&mut self, gains: [GainSetting; 2]) -> (MeasurementResult, WaveformSnapshot) {
        let samples = self.buffers.window.capacity();
        let mut rms = [0.0f64; 2];
        let mut millivolts: [Vec<i16>; 2] = [Vec::with_capacity(samples), Vec::with_capacity(samples)];

        for channel in Channel::BOTH {
            let i = channel.index();
            let buffers = &mut self.buffers;
            self.filter
                .apply(buffers.window.channel(channel), &mut buffers.filtered[i]);
            remove_dc(&buffers.filtered[i], &mut buffers.ac[i]);

            rms[i] = rms_volts(&buffers.ac[i], gains[i], &self.converter);
            millivolts[i].extend(
                buffers.ac[i]
                    .iter()
                    .map(|&c| quantize_millivolts(self.converter.counts_to_volts(gains[i], c))),
            );
        }

        let timestamp_us = self.clock.now_us();
        let [ac_millivolts_a, ac_millivolts_b] = millivolts;

        let result = MeasurementResult {
            rms_volts_a: rms[0],
            rms_volts_b: rms[1],
            timestamp_us,
            gain_a: gains[0],
            gain_b: gains[1],
            sample_count: samples,
        };
        let waveform = WaveformSnapshot {
            ac_millivolts_a,
            ac_millivolts_b,
            sample_count: samples,
            timestamp_us,
            gain_a: gains[0],
            gain_b: gains[1],
        };
        (result, waveform)
    }

    /// Latest published result, `None` before the first successful cycle
    pub fn try_get_latest_result(&self) -> Option<MeasurementResult> {
        self.published.read_latest_result()
    }

    /// Prefix of the latest waveform plus the number of samples returned
    pub fn try_get_latest_waveform(&self, max_samples: usize) -> Option<(WaveformSnapshot, usize)> {
        self.published.read_latest_waveform(max_samples)
    }
}
