//! Voltmon - two-channel AC voltage monitor node
//!
//! Entry point: loads configuration, starts the acquisition engine thread,
//! the measurement scheduler and the HTTP API, and runs until Ctrl+C.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{error, info};
use voltmon::cli::{self, CliCommand, RunOptions};
use voltmon::config::AppConfig;
use voltmon::{AcquisitionEngine, SimulatedFrontEnd, StatsStore};
use voltmon_server::scheduler::run_scheduler;
use voltmon_server::{AppState, EngineHandle};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voltmon=info".parse()?),
        )
        .init();

    let options = match cli::parse_args(std::env::args().skip(1)) {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            cli::print_help();
            return Ok(());
        }
        Ok(CliCommand::Version) => {
            println!("voltmon {}", voltmon::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            cli::print_help();
            std::process::exit(2);
        }
    };

    let config = load_config(&options);
    info!(
        device = %config.device_name,
        version = voltmon::VERSION,
        "Starting voltmon"
    );

    let frontend = SimulatedFrontEnd::from_config(&config.acquisition, config.simulation.signals());
    let mut engine = AcquisitionEngine::with_monotonic_clock(&config.acquisition, frontend)?;

    if options.once {
        let result = engine.run_acquisition_cycle()?;
        println!(
            "RMS A: {:.4} V ({}) | RMS B: {:.4} V ({}) | {} samples",
            result.rms_volts_a,
            result.gain_a,
            result.rms_volts_b,
            result.gain_b,
            result.sample_count
        );
        return Ok(());
    }

    run_node(config, engine)
}

fn load_config(options: &RunOptions) -> AppConfig {
    let mut config = match &options.config_path {
        Some(path) => AppConfig::load(path),
        None => AppConfig::default(),
    };
    config.apply_port_override(std::env::var("PORT").ok().as_deref());
    if let Some(port) = options.port {
        config.server.port = port;
    }
    config
}

fn run_node(
    config: AppConfig,
    engine: AcquisitionEngine<SimulatedFrontEnd>,
) -> Result<()> {
    let stats = Arc::new(Mutex::new(StatsStore::new()));
    let handle = EngineHandle::spawn(engine, Arc::clone(&stats))?;
    let state = AppState::new(handle, stats, config.server_config());

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || signal.notify_one())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        tokio::spawn(run_scheduler(state.clone(), config.schedule()));

        tokio::select! {
            served = voltmon_server::start_server(state) => {
                if let Err(e) = &served {
                    error!("Web server error: {}", e);
                }
                served
            }
            _ = shutdown.notified() => {
                info!("Shutting down");
                Ok(())
            }
        }
    })
}
