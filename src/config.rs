//! Node configuration
//!
//! Device identity, measurement schedule, server binding, the acquisition
//! pipeline section and the simulated signals, stored as one JSON file.
//! Every field is optional in the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use voltmon_core::config::ConfigError;
use voltmon_core::{AcquisitionConfig, ChannelSignal};
use voltmon_server::scheduler::Schedule;
use voltmon_server::ServerConfig;

fn default_device_name() -> String {
    "esp32-adc-node".to_string()
}

fn default_measure_period_secs() -> u64 {
    10
}

fn default_startup_delay_ms() -> u64 {
    2000
}

fn default_port() -> u16 {
    8080
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_signal_a() -> ChannelSignal {
    ChannelSignal::sine(1.0, 1.65, 50.0)
}

fn default_signal_b() -> ChannelSignal {
    ChannelSignal::sine(0.3, 0.6, 50.0)
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
        }
    }
}

/// Signals fed to the simulated front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_signal_a")]
    pub channel_a: ChannelSignal,
    #[serde(default = "default_signal_b")]
    pub channel_b: ChannelSignal,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            channel_a: default_signal_a(),
            channel_b: default_signal_b(),
        }
    }
}

impl SimulationSection {
    pub fn signals(&self) -> [ChannelSignal; 2] {
        [self.channel_a, self.channel_b]
    }
}

/// Persistent node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name reported by the status endpoint
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Seconds between scheduled measurements
    #[serde(default = "default_measure_period_secs")]
    pub measure_period_secs: u64,
    /// Delay before the first scheduled measurement
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub simulation: SimulationSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            measure_period_secs: default_measure_period_secs(),
            startup_delay_ms: default_startup_delay_ms(),
            server: ServerSection::default(),
            acquisition: AcquisitionConfig::default(),
            simulation: SimulationSection::default(),
        }
    }
}

impl AppConfig {
    /// Parse a config and validate its acquisition section
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.acquisition.validate()?;
        Ok(config)
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Apply a `PORT` value, ignoring anything that is not a port number
    pub fn apply_port_override(&mut self, port: Option<&str>) {
        if let Some(port) = port.and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            period: Duration::from_secs(self.measure_period_secs.max(1)),
            startup_delay: Duration::from_millis(self.startup_delay_ms),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            bind_addr: self.server.bind_addr.clone(),
            device_name: self.device_name.clone(),
        }
    }
}
