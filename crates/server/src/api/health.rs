//! Liveness and ingestion counters.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sheetflow_ingest::SourceState;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    /// RFC 3339 start time.
    pub started_at: String,
    pub transactions: u64,
    pub uptime_secs: f64,
    /// Ingestions per second since startup, two decimals.
    pub tps: String,
    #[schema(value_type = Vec<Object>)]
    pub sources: Vec<SourceState>,
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Health",
    responses((status = 200, description = "Ingestion counters and tracked sources", body = StatsResponse))
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.ingestor.stats().await;
    Json(StatsResponse {
        started_at: stats.started_at.to_rfc3339(),
        transactions: stats.transactions,
        uptime_secs: stats.uptime_secs,
        tps: format!("{:.2}", stats.tps),
        sources: stats.sources,
    })
}
