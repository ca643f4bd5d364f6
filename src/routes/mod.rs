//! HTTP routes for the order proxy
//!
//! - `orders` - create/read/edit orders (`/api/orders`)
//! - `crypto` - wallet checkout helpers (`/api/crypto/*`)
//! - `health` - liveness, version and Prometheus text
//!
//! `build_app` wires them together with request limits and request-id
//! middleware; `cors_layer` is applied by the binary.

pub mod crypto;
pub mod health;
pub mod orders;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::Instrument;

use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::version;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Full proxy router with state applied
pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/orders", post(orders::create_order))
        .route(
            "/api/orders/:orderId",
            get(orders::get_order).patch(orders::edit_order),
        )
        .route("/api/crypto/create-order", post(crypto::create_crypto_order))
        .route("/api/crypto/order-status", get(crypto::order_status))
        .route("/api/crypto/process-payment", post(crypto::process_payment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_limits_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/livez", get(health::livez))
        .route("/metrics.prom", get(health::metrics_prom))
        .merge(version::router())
        .merge(api)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Content-Length based body limit plus a per-request timeout
async fn request_limits_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let body_limit = state.config.server.max_body_bytes;
    let timeout = state.config.server.read_timeout;

    if let Some(n) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if n > body_limit {
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    }

    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "request timed out");
            (StatusCode::GATEWAY_TIMEOUT, "request timed out").into_response()
        }
    }
}

/// Reuse the caller's `x-request-id` or mint one; echo it back and tag the span
async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    resp
}

/// Dev: allow any origin. Otherwise only the configured origins; none by default.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    if server.dev {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    // invalid entries are skipped
    let list: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if list.is_empty() {
        CorsLayer::new().allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckoutConfig;
    use axum::http::Method;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        // nothing listens on port 1; tests below never reach the upstream
        let cfg = CheckoutConfig::for_base_url("http://127.0.0.1:1/", "key").unwrap();
        build_app(AppState::new(cfg).unwrap())
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let resp = app()
            .oneshot(
                Request::get("/livez")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers()[REQUEST_ID_HEADER], "abc-123");
        let v = body_json(resp).await;
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["api_key_configured"], json!(true));
    }

    #[tokio::test]
    async fn order_status_without_id_is_400() {
        let resp = app()
            .oneshot(
                Request::get("/api/crypto/order-status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["message"], "Order ID is required");
        assert_eq!(v["error"], json!(true));
    }

    #[tokio::test]
    async fn process_payment_lists_missing_fields() {
        let resp = app()
            .oneshot(
                Request::post("/api/crypto/process-payment")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"orderId":"o-1","txId":"0xabc"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(
            v["message"],
            "Missing required fields: clientSecret, currency, network"
        );
    }

    #[tokio::test]
    async fn create_order_rejects_non_json() {
        let resp = app()
            .oneshot(
                Request::post("/api/orders")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn crypto_create_rejects_unknown_chain_before_upstream() {
        let resp = app()
            .oneshot(
                Request::post("/api/crypto/create-order")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"chain":"solana"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert!(v["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid chain: solana."));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut cfg = CheckoutConfig::for_base_url("http://127.0.0.1:1/", "key").unwrap();
        cfg.server.max_body_bytes = 16;
        let app = build_app(AppState::new(cfg).unwrap());
        let resp = app
            .oneshot(
                Request::post("/api/orders")
                    .header("content-type", "application/json")
                    .header("content-length", "64")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_500() {
        let resp = app()
            .oneshot(
                Request::get("/api/orders/o-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert!(v["message"].as_str().unwrap().starts_with("Failed to get order"));
    }

    #[tokio::test]
    async fn cors_preflight_returns_allow_origin_in_dev() {
        let mut cfg = CheckoutConfig::for_base_url("http://127.0.0.1:1/", "key").unwrap();
        cfg.server.dev = true;
        let layer = cors_layer(&cfg.server);
        let app = build_app(AppState::new(cfg).unwrap()).layer(layer);
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/orders")
            .header("origin", "http://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_some());
    }
}
