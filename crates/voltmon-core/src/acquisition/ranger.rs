//! Per-channel gain auto-ranging
//!
//! Finds, independently for each channel, the most sensitive gain that does
//! not saturate the filtered signal. Each channel is a small state machine
//! ([`RangeLane`]); both lanes are stepped by one shared probe loop whose
//! length is bounded by [`MAX_RANGING_ITERATIONS`].

use crate::acquisition::clock::Clock;
use crate::acquisition::dsp::{is_saturated, MovingAverage};
use crate::acquisition::gain::GainSetting;
use crate::acquisition::reader::{
    AnalogFrontEnd, CaptureWindow, Channel, HardwareFault, PairedSampler,
};
use tracing::{debug, warn};

/// Default bound on probe captures per ranging pass (both channels together)
pub const MAX_RANGING_ITERATIONS: u32 = 12;

/// Ranging state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeLane {
    /// Still stepping toward more sensitivity
    Probing {
        /// Setting applied on the next probe
        current: GainSetting,
        /// Last setting seen not to saturate
        prior: GainSetting,
    },
    /// Final choice for this pass
    Locked(GainSetting),
}

impl RangeLane {
    /// Start at the least sensitive setting
    pub fn new() -> Self {
        RangeLane::Probing {
            current: GainSetting::LEAST_SENSITIVE,
            prior: GainSetting::LEAST_SENSITIVE,
        }
    }

    /// Setting to apply for the next capture
    pub fn gain(&self) -> GainSetting {
        match *self {
            RangeLane::Probing { current, .. } => current,
            RangeLane::Locked(gain) => gain,
        }
    }

    /// Locked setting, or the last one known not to saturate
    pub fn verified_gain(&self) -> GainSetting {
        match *self {
            RangeLane::Probing { prior, .. } => prior,
            RangeLane::Locked(gain) => gain,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, RangeLane::Locked(_))
    }

    /// Advance after a probe capture at [`Self::gain`]
    pub fn observe(&mut self, saturated: bool) {
        let RangeLane::Probing { current, prior } = *self else {
            return;
        };
        *self = if saturated {
            RangeLane::Locked(prior)
        } else if current.is_most_sensitive() {
            RangeLane::Locked(current)
        } else {
            RangeLane::Probing {
                current: current.more_sensitive(),
                prior: current,
            }
        };
    }
}

impl Default for RangeLane {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one ranging pass
#[derive(Debug, Clone, PartialEq)]
pub struct RangeOutcome {
    /// Chosen gain for channels A and B
    pub gains: [GainSetting; 2],
    /// Probe captures attempted
    pub iterations: u32,
    /// Both lanes locked before the budget ran out
    pub converged: bool,
    /// Capture failure that cut the pass short
    pub fault: Option<HardwareFault>,
    /// Gains applied on each probe, in order
    pub probes: Vec<[GainSetting; 2]>,
}

/// Scratch buffers for ranging probes, kept apart from the cycle buffers
#[derive(Debug, Clone)]
pub struct ProbeBuffers {
    window: CaptureWindow,
    filtered: [Vec<u16>; 2],
}

impl ProbeBuffers {
    pub fn new(samples_per_channel: usize) -> Self {
        Self {
            window: CaptureWindow::with_capacity(samples_per_channel),
            filtered: [vec![0; samples_per_channel], vec![0; samples_per_channel]],
        }
    }
}

/// Drives probe captures until each channel settles on a gain
#[derive(Debug, Clone, Copy)]
pub struct AutoRanger {
    filter: MovingAverage,
    full_scale_counts: u16,
    max_iterations: u32,
}

impl AutoRanger {
    pub fn new(filter: MovingAverage, full_scale_counts: u16) -> Self {
        Self {
            filter,
            full_scale_counts,
            max_iterations: MAX_RANGING_ITERATIONS,
        }
    }

    /// Override the probe budget
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one ranging pass
    ///
    /// Never fails: running out of probes leaves each channel at its last
    /// setting, and a capture fault stops the pass with every unlocked
    /// channel falling back to its last verified setting.
    pub fn select<F, C>(
        &self,
        sampler: &PairedSampler,
        frontend: &mut F,
        clock: &C,
        buffers: &mut ProbeBuffers,
    ) -> RangeOutcome
    where
        F: AnalogFrontEnd + ?Sized,
        C: Clock + ?Sized,
    {
        let mut lanes = [RangeLane::new(); 2];
        let mut probes = Vec::new();
        let mut iterations = 0;

        while iterations < self.max_iterations && !lanes.iter().all(RangeLane::is_locked) {
            let gains = [lanes[0].gain(), lanes[1].gain()];
            iterations += 1;
            probes.push(gains);

            let captured = sampler
                .configure(frontend, gains)
                .and_then(|()| sampler.capture(frontend, clock, &mut buffers.window));
            if let Err(fault) = captured {
                warn!(iteration = iterations, error = %fault, "Ranging aborted by hardware fault");
                // Unlocked lanes fall back to the last gain that probed clean,
                // not the untested step that faulted
                return RangeOutcome {
                    gains: [lanes[0].verified_gain(), lanes[1].verified_gain()],
                    iterations,
                    converged: false,
                    fault: Some(fault),
                    probes,
                };
            }

            for channel in Channel::BOTH {
                let lane = &mut lanes[channel.index()];
                if lane.is_locked() {
                    continue;
                }
                let filtered = &mut buffers.filtered[channel.index()];
                self.filter
                    .apply(buffers.window.channel(channel), filtered);
                let saturated = is_saturated(filtered, self.full_scale_counts);
                lane.observe(saturated);
                debug!(
                    ?channel,
                    probed = %gains[channel.index()],
                    saturated,
                    next = ?lane,
                    "Ranging probe"
                );
            }
        }

        let converged = lanes.iter().all(RangeLane::is_locked);
        if !converged {
            warn!(
                iterations,
                "Ranging budget exhausted, keeping last settings"
            );
        }

        RangeOutcome {
            gains: [lanes[0].gain(), lanes[1].gain()],
            iterations,
            converged,
            fault: None,
            probes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::clock::ManualClock;
    use crate::acquisition::reader::{BitWidth, ChannelId};
    use crate::acquisition::sim::{ChannelSignal, SimulatedFrontEnd};

    const IDS: [ChannelId; 2] = [ChannelId(6), ChannelId(7)];
    const FULL_SCALE_VOLTS: [f64; 4] = [3.9, 2.2, 1.5, 1.1];
    const SAMPLES: usize = 120;

    fn frontend(a: ChannelSignal, b: ChannelSignal) -> SimulatedFrontEnd {
        SimulatedFrontEnd::new(IDS, 2000, FULL_SCALE_VOLTS, 4095, [a, b])
    }

    fn run(ranger: AutoRanger, frontend: &mut SimulatedFrontEnd) -> RangeOutcome {
        let sampler = PairedSampler::new(IDS, 2000, BitWidth::Bits12);
        let clock = ManualClock::new();
        let mut buffers = ProbeBuffers::new(SAMPLES);
        ranger.select(&sampler, frontend, &clock, &mut buffers)
    }

    fn ranger() -> AutoRanger {
        AutoRanger::new(MovingAverage::new(5), 4095)
    }

    #[test]
    fn test_lane_steps_then_locks_on_saturation() {
        let mut lane = RangeLane::new();
        lane.observe(false);
        assert_eq!(lane.gain(), GainSetting::Atten6Db);
        lane.observe(false);
        assert_eq!(lane.gain(), GainSetting::Atten2p5Db);
        lane.observe(true);
        assert_eq!(lane, RangeLane::Locked(GainSetting::Atten6Db));
        lane.observe(false);
        assert_eq!(lane, RangeLane::Locked(GainSetting::Atten6Db));
    }

    #[test]
    fn test_lane_locks_at_most_sensitive() {
        let mut lane = RangeLane::new();
        for _ in 0..3 {
            lane.observe(false);
        }
        assert_eq!(lane.gain(), GainSetting::Atten0Db);
        lane.observe(false);
        assert_eq!(lane, RangeLane::Locked(GainSetting::Atten0Db));
    }

    #[test]
    fn test_lane_saturated_at_least_sensitive_stays_there() {
        let mut lane = RangeLane::new();
        lane.observe(true);
        assert_eq!(lane, RangeLane::Locked(GainSetting::LEAST_SENSITIVE));
    }

    #[test]
    fn test_channels_converge_independently() {
        // 2.0 V saturates the 1.5 V range; 0.5 V fits the most sensitive one
        let mut fe = frontend(ChannelSignal::dc(2.0), ChannelSignal::dc(0.5));
        let outcome = run(ranger(), &mut fe);

        assert!(outcome.converged);
        assert!(outcome.fault.is_none());
        assert_eq!(
            outcome.gains,
            [GainSetting::Atten6Db, GainSetting::Atten0Db]
        );
        assert_eq!(outcome.iterations, 4);
    }

    #[test]
    fn test_exact_full_scale_counts_as_saturated() {
        // 1.1 V lands exactly on full scale at the most sensitive gain
        let mut fe = frontend(ChannelSignal::dc(1.1), ChannelSignal::dc(0.1));
        let outcome = run(ranger(), &mut fe);

        assert_eq!(outcome.gains[0], GainSetting::Atten2p5Db);
        assert_eq!(outcome.gains[1], GainSetting::Atten0Db);
    }

    #[test]
    fn test_probes_move_monotonically() {
        let mut fe = frontend(
            ChannelSignal::sine(0.9, 1.2, 50.0),
            ChannelSignal::sine(0.2, 0.5, 50.0),
        );
        let outcome = run(ranger(), &mut fe);
        assert!(outcome.converged);

        for channel in Channel::BOTH {
            let tried: Vec<GainSetting> = outcome
                .probes
                .iter()
                .map(|p| p[channel.index()])
                .collect();
            // One step more sensitive per probe, a locked repeat, or a
            // single step back when the lane locks after saturating
            let mut back_steps = 0;
            for w in tried.windows(2) {
                if w[1] == w[0].less_sensitive() && w[1] != w[0] {
                    back_steps += 1;
                } else {
                    assert!(w[1] == w[0] || w[1] == w[0].more_sensitive(), "{tried:?}");
                }
            }
            assert!(back_steps <= 1, "{tried:?}");
            // Final choice is at most one step back from the furthest probe
            let furthest = *tried.iter().max().unwrap();
            let chosen = outcome.gains[channel.index()];
            assert!(chosen == furthest || chosen == furthest.less_sensitive());
        }
    }

    #[test]
    fn test_chosen_gain_does_not_saturate() {
        let mut fe = frontend(
            ChannelSignal::sine(1.0, 1.5, 50.0),
            ChannelSignal::sine(0.3, 0.6, 50.0),
        );
        let outcome = run(ranger(), &mut fe);

        for channel in Channel::BOTH {
            let gain = outcome.gains[channel.index()];
            let signal = fe.signal(channel);
            let peak = signal.offset_volts + signal.amplitude_volts;
            assert!(
                peak < FULL_SCALE_VOLTS[gain.index()],
                "{channel:?} peak {peak} V exceeds {gain} range"
            );
        }
    }

    #[test]
    fn test_budget_exhaustion_keeps_last_settings() {
        let mut fe = frontend(ChannelSignal::dc(0.1), ChannelSignal::dc(0.1));
        let outcome = run(ranger().with_max_iterations(2), &mut fe);

        assert!(!outcome.converged);
        assert!(outcome.fault.is_none());
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.gains,
            [GainSetting::Atten2p5Db, GainSetting::Atten2p5Db]
        );
    }

    #[test]
    fn test_fault_mid_probe_returns_verified_settings() {
        let mut fe = frontend(ChannelSignal::dc(2.0), ChannelSignal::dc(0.1));
        // Two full probes succeed (2 * 120 pairs), the third fails
        fe.fail_after_reads(2 * SAMPLES * 2 + 10);
        let outcome = run(ranger(), &mut fe);

        assert!(outcome.fault.is_some());
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 3);
        // A: probing 2.5 dB, verified 6 dB. B: probing 2.5 dB, verified 6 dB
        assert_eq!(
            outcome.gains,
            [GainSetting::Atten6Db, GainSetting::Atten6Db]
        );
    }
}
