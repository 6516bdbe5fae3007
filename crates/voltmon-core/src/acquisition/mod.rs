//! Acquisition module
//!
//! This module contains the measurement pipeline, leaf to root:
//! - Analog front-end contract and paired capture ([`reader`])
//! - Monotonic time source used for sample scheduling ([`clock`])
//! - Gain settings and their sensitivity ordering ([`gain`])
//! - Filtering, DC removal, unit conversion and RMS ([`dsp`])
//! - Per-channel gain auto-ranging ([`ranger`])
//! - Cycle orchestration and publishing ([`engine`])
//! - Synthetic front end for hosts without converter hardware ([`sim`])

pub mod clock;
pub mod dsp;
pub mod engine;
pub mod gain;
pub mod ranger;
pub mod reader;
pub mod sim;
