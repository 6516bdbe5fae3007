//! Standalone test server for E2E testing
//!
//! Starts the HTTP API over a simulated front end and a real engine thread,
//! measuring every two seconds. No converter hardware is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use voltmon_core::{AcquisitionConfig, AcquisitionEngine, ChannelSignal, SimulatedFrontEnd, StatsStore};
use voltmon_server::scheduler::{run_scheduler, Schedule};
use voltmon_server::{AppState, EngineHandle, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voltmon=debug".parse()?),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080u16);

    let acquisition = AcquisitionConfig::default();
    let signals = [
        ChannelSignal::sine(1.0, 1.65, 50.0),
        ChannelSignal::sine(0.3, 0.6, 50.0),
    ];
    let frontend = SimulatedFrontEnd::from_config(&acquisition, signals);
    let engine = AcquisitionEngine::with_monotonic_clock(&acquisition, frontend)?;

    let stats = Arc::new(Mutex::new(StatsStore::new()));
    let handle = EngineHandle::spawn(engine, Arc::clone(&stats))?;

    let config = ServerConfig {
        port,
        bind_addr: "127.0.0.1".to_string(),
        ..Default::default()
    };
    let state = AppState::new(handle, stats, config);

    tokio::spawn(run_scheduler(
        state.clone(),
        Schedule {
            period: Duration::from_secs(2),
            startup_delay: Duration::ZERO,
        },
    ));

    tracing::info!(port, "Test server starting");
    voltmon_server::start_server(state).await
}
