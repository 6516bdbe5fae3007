//! Acquisition cycle statistics

pub mod store;
