//! Voltmon Core - Acquisition pipeline, signal processing, and published state
//!
//! This library provides the measurement core of a two-channel AC voltage
//! monitor: paired-channel timed sampling, moving-average filtering, DC
//! removal, per-channel gain auto-ranging and RMS computation. Results are
//! published into a lock-protected cache that readers copy out of without
//! stalling the next acquisition cycle.

pub mod acquisition;
pub mod config;
pub mod published;
pub mod stats;

pub use acquisition::{
    clock::{Clock, ManualClock, MonotonicClock},
    engine::{AcquisitionEngine, AcquisitionState},
    gain::GainSetting,
    reader::{AnalogFrontEnd, BitWidth, Channel, ChannelId, HardwareFault},
    sim::{ChannelSignal, SimulatedFrontEnd},
};
pub use config::AcquisitionConfig;
pub use published::{MeasurementResult, PublishedState, WaveformSnapshot};
pub use stats::store::StatsStore;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-channel sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 2000;

/// Default full-scale raw count for a 12-bit converter
pub const DEFAULT_FULL_SCALE_COUNTS: u16 = 4095;
