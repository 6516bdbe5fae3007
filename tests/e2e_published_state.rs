//! E2E tests for the published-state cache under concurrency
//!
//! A writer replaces result and waveform while readers copy them out. A
//! reader must never see a result from one cycle next to a waveform from
//! another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use voltmon::acquisition::clock::ManualClock;
use voltmon::{
    AcquisitionConfig, AcquisitionEngine, ChannelSignal, GainSetting, MeasurementResult,
    PublishedState, SimulatedFrontEnd, WaveformSnapshot,
};

const SAMPLES: usize = 64;

/// Result and waveform whose contents all derive from `stamp`
fn cycle(stamp: i64) -> (MeasurementResult, WaveformSnapshot) {
    let marker = (stamp % 1000) as i16;
    let result = MeasurementResult {
        rms_volts_a: stamp as f64,
        rms_volts_b: -(stamp as f64),
        timestamp_us: stamp,
        gain_a: GainSetting::Atten6Db,
        gain_b: GainSetting::Atten0Db,
        sample_count: SAMPLES,
    };
    let waveform = WaveformSnapshot {
        ac_millivolts_a: vec![marker; SAMPLES],
        ac_millivolts_b: vec![-marker; SAMPLES],
        sample_count: SAMPLES,
        timestamp_us: stamp,
        gain_a: GainSetting::Atten6Db,
        gain_b: GainSetting::Atten0Db,
    };
    (result, waveform)
}

#[test]
fn test_concurrent_readers_never_mix_cycles() {
    let state = Arc::new(PublishedState::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = 0;
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    if let Some((result, waveform)) = state.read_latest() {
                        let stamp = result.timestamp_us;
                        assert_eq!(waveform.timestamp_us, stamp);
                        assert_eq!(result.rms_volts_a, stamp as f64);
                        let marker = (stamp % 1000) as i16;
                        assert!(waveform.ac_millivolts_a.iter().all(|&v| v == marker));
                        assert!(waveform.ac_millivolts_b.iter().all(|&v| v == -marker));
                        // Publishes only move forward
                        assert!(stamp >= last_seen);
                        last_seen = stamp;
                        reads += 1;
                    }
                }
                reads
            })
        })
        .collect();

    for stamp in 1..=5000 {
        let (result, waveform) = cycle(stamp);
        state.publish(result, waveform);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(state.read_latest_result().unwrap().timestamp_us, 5000);
}

#[test]
fn test_waveform_prefix_under_concurrency() {
    let state = Arc::new(PublishedState::new());
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                if let Some((snapshot, returned)) = state.read_latest_waveform(8) {
                    assert_eq!(returned, 8);
                    assert_eq!(snapshot.len(), 8);
                    assert_eq!(snapshot.sample_count, SAMPLES);
                    let marker = (snapshot.timestamp_us % 1000) as i16;
                    assert!(snapshot.ac_millivolts_a.iter().all(|&v| v == marker));
                }
            }
        })
    };

    for stamp in 1..=2000 {
        let (result, waveform) = cycle(stamp);
        state.publish(result, waveform);
    }
    done.store(true, Ordering::Release);
    reader.join().unwrap();
}

#[test]
fn test_engine_publishes_to_shared_readers() {
    let config = AcquisitionConfig::default();
    let frontend = SimulatedFrontEnd::from_config(
        &config,
        [
            ChannelSignal::sine(1.0, 1.65, 50.0),
            ChannelSignal::sine(0.3, 0.6, 50.0),
        ],
    );
    let mut engine = AcquisitionEngine::new(&config, frontend, ManualClock::new()).unwrap();
    let published = engine.published();
    assert!(!published.has_value());

    let writer = thread::spawn(move || {
        for _ in 0..20 {
            engine.run_acquisition_cycle().unwrap();
        }
        engine
    });

    let mut observed = Vec::new();
    while !writer.is_finished() {
        if let Some((result, waveform)) = published.read_latest() {
            assert_eq!(result.timestamp_us, waveform.timestamp_us);
            assert_eq!(result.gain_a, waveform.gain_a);
            assert_eq!(waveform.len(), result.sample_count);
            observed.push(result.timestamp_us);
        }
    }
    let engine = writer.join().unwrap();

    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        published.read_latest_result(),
        engine.try_get_latest_result()
    );
}
