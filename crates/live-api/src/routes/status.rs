use axum::extract::State;
use axum::Json;
use serde::Serialize;

use live_core::PlatformStatus;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub started_at: String,
    pub uptime_seconds: f64,
    pub rounds_total: u64,
    pub went_live_total: u64,
    pub went_offline_total: u64,
    pub delivery_failures_total: u64,
    pub platforms: Vec<PlatformStatus>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let uptime =
        (chrono::Utc::now() - state.started_at).num_milliseconds() as f64 / 1000.0;

    Json(StatusResponse {
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: uptime,
        rounds_total: state.board.rounds_total(),
        went_live_total: state.board.went_live_total(),
        went_offline_total: state.board.went_offline_total(),
        delivery_failures_total: state.board.delivery_failures_total(),
        platforms: state.board.platforms(),
    })
}
