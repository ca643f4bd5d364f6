use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::upstream::{CHECKOUT_API_VERSION, ORDERS_API_VERSION};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_commit: &'static str,
    pub orders_api: &'static str,
    pub checkout_api: &'static str,
    pub ts: i64,
}

async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: NAME,
        version: VERSION,
        // set by CI when available
        git_commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
        orders_api: ORDERS_API_VERSION,
        checkout_api: CHECKOUT_API_VERSION,
        ts: chrono::Utc::now().timestamp(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/version", get(get_version))
}
