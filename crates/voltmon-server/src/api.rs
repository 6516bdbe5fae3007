//! REST API endpoints for voltmon
//!
//! All endpoints are under /api/ and return camelCase JSON.

use crate::{AppState, CycleOutcome, RangeSummary};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use voltmon_core::stats::store::RmsPoint;
use voltmon_core::{GainSetting, MeasurementResult};

/// Maximum number of history points returned by the stats endpoint
const STATS_HISTORY_POINTS: usize = 300;

/// Latest RMS measurement
#[derive(Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RmsResponse {
    pub has_value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_a: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_b: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_us: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_a: Option<GainSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_b: Option<GainSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
}

impl From<Option<MeasurementResult>> for RmsResponse {
    fn from(result: Option<MeasurementResult>) -> Self {
        match result {
            Some(r) => Self {
                has_value: true,
                rms_a: Some(r.rms_volts_a),
                rms_b: Some(r.rms_volts_b),
                timestamp_us: Some(r.timestamp_us),
                gain_a: Some(r.gain_a),
                gain_b: Some(r.gain_b),
                samples: Some(r.sample_count),
            },
            None => Self::default(),
        }
    }
}

/// Waveform query parameters
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WaveformQuery {
    /// Samples per channel to return; defaults to the whole window
    pub max_samples: Option<usize>,
}

/// AC waveform of the latest cycle in millivolts
#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WaveformResponse {
    pub has_value: bool,
    /// Samples per channel in this response
    pub returned: usize,
    /// Samples per channel in the capture window
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_us: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_a: Option<GainSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_b: Option<GainSetting>,
    /// Channel A samples in millivolts
    pub channel_a: Vec<i16>,
    /// Channel B samples in millivolts
    pub channel_b: Vec<i16>,
}

/// Node status
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub device_name: String,
    pub uptime_seconds: i64,
    pub has_value: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub consecutive_failures: u32,
    pub last_fault: Option<String>,
    pub sample_rate_hz: u32,
    pub samples_per_channel: usize,
    pub last_range: Option<RangeResponse>,
}

/// Gains chosen by the most recent ranging pass
#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct RangeResponse {
    pub gain_a: GainSetting,
    pub gain_b: GainSetting,
    pub iterations: u32,
    pub converged: bool,
}

impl From<RangeSummary> for RangeResponse {
    fn from(range: RangeSummary) -> Self {
        Self {
            gain_a: range.gains[0],
            gain_b: range.gains[1],
            iterations: range.iterations,
            converged: range.converged,
        }
    }
}

/// One point of the RMS history
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPointResponse {
    /// Timestamp as ISO 8601 string
    pub timestamp: String,
    pub rms_a: f64,
    pub rms_b: f64,
    pub gain_a: GainSetting,
    pub gain_b: GainSetting,
}

impl From<&RmsPoint> for HistoryPointResponse {
    fn from(point: &RmsPoint) -> Self {
        Self {
            timestamp: point.timestamp.to_rfc3339(),
            rms_a: point.rms_volts_a,
            rms_b: point.rms_volts_b,
            gain_a: point.gain_a,
            gain_b: point.gain_b,
        }
    }
}

/// RMS trend and extremes
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub min_rms_a: Option<f64>,
    pub max_rms_a: Option<f64>,
    pub min_rms_b: Option<f64>,
    pub max_rms_b: Option<f64>,
    /// Oldest first
    pub history: Vec<HistoryPointResponse>,
}

/// Command request body
#[derive(Deserialize, Debug)]
pub struct CommandRequest {
    pub command: String,
}

/// Command outcome
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RmsResponse>,
}

fn lock_error<T>(_: T) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "statistics unavailable".to_string(),
    )
}

/// GET /api/rms
pub async fn get_rms(State(state): State<AppState>) -> Json<RmsResponse> {
    Json(state.engine.published().read_latest_result().into())
}

/// GET /api/waveform?maxSamples=N
pub async fn get_waveform(
    State(state): State<AppState>,
    Query(query): Query<WaveformQuery>,
) -> Json<WaveformResponse> {
    let max_samples = query.max_samples.unwrap_or(usize::MAX);
    let response = match state.engine.published().read_latest_waveform(max_samples) {
        Some((snapshot, returned)) => WaveformResponse {
            has_value: true,
            returned,
            sample_count: snapshot.sample_count,
            timestamp_us: Some(snapshot.timestamp_us),
            gain_a: Some(snapshot.gain_a),
            gain_b: Some(snapshot.gain_b),
            channel_a: snapshot.ac_millivolts_a,
            channel_b: snapshot.ac_millivolts_b,
        },
        None => WaveformResponse::default(),
    };
    Json(response)
}

/// GET /api/status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let stats = state.stats.lock().map_err(lock_error)?.stats().clone();
    let last_range = *state.last_range.lock().map_err(lock_error)?;
    let info = state.engine.info();

    Ok(Json(StatusResponse {
        version: voltmon_core::VERSION.to_string(),
        device_name: state.config.device_name.clone(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        has_value: state.engine.published().has_value(),
        cycles_completed: stats.cycles_completed,
        cycles_failed: stats.cycles_failed,
        consecutive_failures: stats.consecutive_failures,
        last_fault: stats.last_fault,
        sample_rate_hz: info.sample_rate_hz,
        samples_per_channel: info.samples_per_channel,
        last_range: last_range.map(RangeResponse::from),
    }))
}

/// GET /api/stats
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let store = state.stats.lock().map_err(lock_error)?;
    let stats = store.stats();
    let history = store.history();
    let skip = history.len().saturating_sub(STATS_HISTORY_POINTS);

    Ok(Json(StatsResponse {
        cycles_completed: stats.cycles_completed,
        cycles_failed: stats.cycles_failed,
        min_rms_a: stats.min_rms_a,
        max_rms_a: stats.max_rms_a,
        min_rms_b: stats.min_rms_b,
        max_rms_b: stats.max_rms_b,
        history: history.iter().skip(skip).map(HistoryPointResponse::from).collect(),
    }))
}

/// POST /api/cmd
///
/// Accepts `{"command": "measureNow"}` and `{"command": "resetStats"}`.
pub async fn post_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, (StatusCode, String)> {
    match request.command.as_str() {
        "measureNow" => {
            let report = state
                .measure_now()
                .await
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            let response = match report.outcome {
                CycleOutcome::Published(result) => CommandResponse {
                    success: true,
                    message: "Measurement published".to_string(),
                    result: Some(Some(result).into()),
                },
                CycleOutcome::Failed(fault) => CommandResponse {
                    success: false,
                    message: fault.to_string(),
                    result: None,
                },
            };
            Ok(Json(response))
        }
        "resetStats" => {
            state.stats.lock().map_err(lock_error)?.reset_counters();
            tracing::info!("Statistics counters reset via API");
            Ok(Json(CommandResponse {
                success: true,
                message: "Statistics reset".to_string(),
                result: None,
            }))
        }
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("unknown command: {other}"),
        )),
    }
}
