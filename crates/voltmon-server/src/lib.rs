//! Voltmon Web Server - Axum HTTP API
//!
//! Serves the latest RMS measurement, waveform and cycle statistics of the
//! acquisition engine, and accepts commands that trigger a cycle on demand.

pub mod api;
pub mod scheduler;

use axum::http::{header, HeaderValue};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use voltmon_core::acquisition::ranger::RangeOutcome;
use voltmon_core::stats::store::StatsStore;
use voltmon_core::{
    AcquisitionEngine, AnalogFrontEnd, Clock, GainSetting, HardwareFault, MeasurementResult,
    PublishedState,
};

/// Commands sent to the engine thread
pub enum EngineCommand {
    MeasureNow {
        reply: oneshot::Sender<CycleReport>,
    },
}

/// What one acquisition cycle produced
#[derive(Clone, Debug)]
pub enum CycleOutcome {
    Published(MeasurementResult),
    Failed(HardwareFault),
}

/// Outcome of a cycle plus how ranging went
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub range: Option<RangeSummary>,
}

/// Condensed ranging result for status reporting
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeSummary {
    pub gains: [GainSetting; 2],
    pub iterations: u32,
    pub converged: bool,
}

impl From<&RangeOutcome> for RangeSummary {
    fn from(outcome: &RangeOutcome) -> Self {
        Self {
            gains: outcome.gains,
            iterations: outcome.iterations,
            converged: outcome.converged,
        }
    }
}

/// Fixed sampling parameters of the running engine
#[derive(Clone, Copy, Debug)]
pub struct EngineInfo {
    pub sample_rate_hz: u32,
    pub samples_per_channel: usize,
}

/// Handle to communicate with the engine thread
///
/// Cycles run on one dedicated thread, so requests from the scheduler and
/// the API queue up instead of overlapping. Readers go straight to the
/// published state and never wait for a cycle.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    published: Arc<PublishedState>,
    info: EngineInfo,
}

impl EngineHandle {
    /// Move the engine onto a dedicated thread and return a handle
    ///
    /// Every cycle outcome is recorded into `stats`.
    pub fn spawn<F, C>(
        mut engine: AcquisitionEngine<F, C>,
        stats: Arc<Mutex<StatsStore>>,
    ) -> anyhow::Result<Self>
    where
        F: AnalogFrontEnd + 'static,
        C: Clock + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(32);
        let published = engine.published();
        let info = EngineInfo {
            sample_rate_hz: engine.sample_rate_hz(),
            samples_per_channel: engine.samples_per_channel(),
        };

        std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        EngineCommand::MeasureNow { reply } => {
                            let report = run_cycle(&mut engine, &stats);
                            let _ = reply.send(report);
                        }
                    }
                }
                tracing::debug!("Engine thread exiting");
            })?;

        Ok(Self {
            tx,
            published,
            info,
        })
    }

    /// Run one acquisition cycle now and wait for its outcome
    pub async fn measure_now(&self) -> anyhow::Result<CycleReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::MeasureNow { reply })
            .await
            .map_err(|_| anyhow::anyhow!("Engine thread died"))?;
        rx.await.map_err(|_| anyhow::anyhow!("Engine thread died"))
    }

    /// Published state shared with the engine
    pub fn published(&self) -> &Arc<PublishedState> {
        &self.published
    }

    pub fn info(&self) -> EngineInfo {
        self.info
    }
}

fn run_cycle<F, C>(engine: &mut AcquisitionEngine<F, C>, stats: &Mutex<StatsStore>) -> CycleReport
where
    F: AnalogFrontEnd,
    C: Clock,
{
    let outcome = match engine.run_acquisition_cycle() {
        Ok(result) => CycleOutcome::Published(result),
        Err(fault) => CycleOutcome::Failed(fault),
    };

    let mut store = stats.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Statistics lock poisoned, recovering");
        stats.clear_poison();
        poisoned.into_inner()
    });
    match &outcome {
        CycleOutcome::Published(result) => store.record_success(result),
        CycleOutcome::Failed(fault) => store.record_failure(fault),
    }
    drop(store);

    CycleReport {
        outcome,
        range: engine.last_range_outcome().map(RangeSummary::from),
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to engine thread
    pub engine: EngineHandle,
    /// Cycle statistics
    pub stats: Arc<Mutex<StatsStore>>,
    /// Server configuration
    pub config: ServerConfig,
    /// Most recent ranging outcome, updated by anything that runs a cycle
    pub last_range: Arc<Mutex<Option<RangeSummary>>>,
    pub started_at: DateTime<Utc>,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
    /// Name reported by the status endpoint
    pub device_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            device_name: "esp32-adc-node".to_string(),
        }
    }
}

impl AppState {
    pub fn new(engine: EngineHandle, stats: Arc<Mutex<StatsStore>>, config: ServerConfig) -> Self {
        Self {
            engine,
            stats,
            config,
            last_range: Arc::new(Mutex::new(None)),
            started_at: Utc::now(),
        }
    }

    /// Run a cycle through the engine thread and remember its ranging outcome
    pub async fn measure_now(&self) -> anyhow::Result<CycleReport> {
        let report = self.engine.measure_now().await?;
        if let (Some(range), Ok(mut last)) = (report.range, self.last_range.lock()) {
            *last = Some(range);
        }
        Ok(report)
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/rms", axum::routing::get(api::get_rms))
        .route("/api/waveform", axum::routing::get(api::get_waveform))
        .route("/api/status", axum::routing::get(api::get_status))
        .route("/api/stats", axum::routing::get(api::get_stats))
        .route("/api/cmd", axum::routing::post(api::post_command))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

/// Serve the API on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the web server
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Voltmon web server listening");
    serve(listener, state).await
}
