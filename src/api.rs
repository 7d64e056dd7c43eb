//! Read-only reporting surface over the published analytics view, plus
//! runtime alert-threshold updates.
//!
//! Handlers only read the latest [`AnalyticsView`] from a watch channel;
//! they never reach into the pipeline's live buffers.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::AlertConfig;
use crate::model::alert::Alert;
use crate::model::signal::AlertSignal;
use crate::model::snapshot::StatisticsSnapshot;
use crate::model::tick::ms_to_utc;
use crate::pipeline::AnalyticsView;

#[derive(Clone)]
pub struct ApiState {
    pub symbol_x: String,
    pub symbol_y: String,
    pub view: watch::Receiver<AnalyticsView>,
    pub alert_config: Arc<watch::Sender<AlertConfig>>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub symbol_x: String,
    pub symbol_y: String,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    #[serde(flatten)]
    pub snapshot: StatisticsSnapshot,
    pub signal: AlertSignal,
    pub window_size: usize,
    /// True until the snapshot covers a full price window.
    pub warmup: bool,
}

/// One table row of `/analytics/stats`, also the CSV record layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRow {
    pub timestamp: String,
    pub z_score: Option<f64>,
    pub spread: f64,
    pub correlation: Option<f64>,
    pub hedge_ratio: f64,
    pub is_stationary: bool,
    pub p_value: Option<f64>,
    /// Entry side the row's z-score reaches under the current thresholds.
    pub alert: AlertSignal,
}

const STATS_HEADER: [&str; 8] = [
    "timestamp",
    "z_score",
    "spread",
    "correlation",
    "hedge_ratio",
    "is_stationary",
    "p_value",
    "alert",
];

const STATS_CSV_FILENAME: &str = "analytics_stats.csv";

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub rows: Vec<StatsRow>,
}

#[derive(Debug, Serialize)]
pub struct LatestAlertResponse {
    pub signal: AlertSignal,
    pub alert: Option<Alert>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analytics/latest", get(analytics_latest))
        .route("/analytics/history", get(analytics_history))
        .route("/analytics/stats", get(analytics_stats))
        .route("/analytics/stats/csv", get(analytics_stats_csv))
        .route("/alerts/latest", get(alerts_latest))
        .route("/config", get(get_config).post(update_config))
        .with_state(state)
}

/// Serve until `shutdown` flips.
pub async fn serve(bind: &str, state: ApiState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind API on {}", bind))?;
    tracing::info!(addr = %listener.local_addr()?, "API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("API server failed")
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        symbol_x: state.symbol_x,
        symbol_y: state.symbol_y,
    })
}

pub async fn analytics_latest(
    State(state): State<ApiState>,
) -> Result<Json<LatestResponse>, ApiError> {
    let (latest, signal, window_size) = {
        let view = state.view.borrow();
        (view.latest.clone(), view.signal, view.window_size)
    };
    let snapshot = latest
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no analytics computed yet"))?;
    let warmup = snapshot.points_collected < window_size;
    Ok(Json(LatestResponse {
        snapshot,
        signal,
        window_size,
        warmup,
    }))
}

pub async fn analytics_history(State(state): State<ApiState>) -> Json<Vec<StatisticsSnapshot>> {
    Json(state.view.borrow().history.clone())
}

/// Newest-first table rows over `history`.
pub fn stats_rows(history: &[StatisticsSnapshot], config: &AlertConfig) -> Vec<StatsRow> {
    history
        .iter()
        .rev()
        .map(|snap| {
            let alert = match snap.z_score {
                Some(z) if z >= config.entry_threshold => AlertSignal::Short,
                Some(z) if z <= -config.entry_threshold => AlertSignal::Long,
                _ => AlertSignal::None,
            };
            StatsRow {
                timestamp: ms_to_utc(snap.timestamp_ms).to_rfc3339(),
                z_score: snap.z_score,
                spread: snap.spread,
                correlation: snap.correlation,
                hedge_ratio: snap.hedge_ratio,
                is_stationary: snap.stationarity.is_stationary,
                p_value: snap.stationarity.p_value,
                alert,
            }
        })
        .collect()
}

fn current_stats(state: &ApiState) -> Vec<StatsRow> {
    let config = *state.alert_config.borrow();
    let view = state.view.borrow();
    stats_rows(&view.history, &config)
}

pub async fn analytics_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        rows: current_stats(&state),
    })
}

/// Render rows as CSV with a header line, even when there are no rows.
pub fn stats_csv(rows: &[StatsRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(STATS_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv: {}", e.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

pub async fn analytics_stats_csv(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let rows = current_stats(&state);
    let body = stats_csv(&rows).map_err(|e| {
        tracing::error!(error = %format!("{:#}", e), "CSV export failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "csv export failed")
    })?;
    let disposition = format!("attachment; filename=\"{}\"", STATS_CSV_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn alerts_latest(State(state): State<ApiState>) -> Json<LatestAlertResponse> {
    let (signal, alert) = {
        let view = state.view.borrow();
        (view.signal, view.latest_alert.clone())
    };
    Json(LatestAlertResponse { signal, alert })
}

pub async fn get_config(State(state): State<ApiState>) -> Json<AlertConfig> {
    Json(*state.alert_config.borrow())
}

pub async fn update_config(
    State(state): State<ApiState>,
    Json(config): Json<AlertConfig>,
) -> Result<Json<AlertConfig>, ApiError> {
    config
        .validate()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("{:#}", e)))?;
    state.alert_config.send_replace(config);
    tracing::info!(
        entry = config.entry_threshold,
        reset = config.reset_threshold,
        min_correlation = config.min_correlation,
        "Alert config updated"
    );
    Ok(Json(config))
}
