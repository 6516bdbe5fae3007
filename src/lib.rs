//! Voltmon - two-channel AC voltage monitor node
//!
//! This library re-exports the acquisition pipeline, published state and
//! statistics from `voltmon-core`, and holds the node's configuration and
//! command line handling.
//!
//! The HTTP API, engine thread and scheduler live in `voltmon-server`.

pub mod cli;
pub mod config;

pub use voltmon_core::acquisition;
pub use voltmon_core::published;
pub use voltmon_core::stats;

pub use voltmon_core::{
    AcquisitionConfig, AcquisitionEngine, AcquisitionState, ChannelSignal, GainSetting,
    HardwareFault, MeasurementResult, PublishedState, SimulatedFrontEnd, StatsStore,
    WaveformSnapshot,
};
pub use voltmon_core::{DEFAULT_FULL_SCALE_COUNTS, DEFAULT_SAMPLE_RATE, VERSION};
