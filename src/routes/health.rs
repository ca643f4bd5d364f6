use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;

use crate::app_state::AppState;
use crate::metrics;
use crate::version;

#[derive(Serialize)]
pub struct LivezView {
    pub ok: bool,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub api_key_configured: bool,
    pub api_base_url: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn livez(State(state): State<AppState>) -> Json<LivezView> {
    Json(LivezView {
        ok: true,
        version: version::VERSION,
        uptime_secs: state.started_at.elapsed().as_secs(),
        api_key_configured: state.has_api_key(),
        api_base_url: state.commerce.base_url().to_string(),
    })
}

pub async fn metrics_prom() -> impl IntoResponse {
    let headers = [(header::CONTENT_TYPE, "text/plain; version=0.0.4")];
    (headers, metrics::render())
}
