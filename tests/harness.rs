#![allow(dead_code)]

//! In-process stand-in for the commerce API plus a proxy bound to it.
//! Both listen on ephemeral ports; every upstream request is recorded.

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use nft_checkout::{routes, AppState, CheckoutConfig};

pub const API_KEY: &str = "test-api-key";
pub const COLLECTION_ID: &str = "col-1";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub api_key: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum ProcessReply {
    NoContent,
    Json(Value),
}

struct Failure {
    method: Method,
    path_contains: String,
    status: StatusCode,
    body: String,
}

struct MockState {
    calls: Vec<RecordedCall>,
    statuses: VecDeque<String>,
    last_status: String,
    create_status: String,
    card_keys: bool,
    process_reply: ProcessReply,
    failures: Vec<Failure>,
    raw_order: Option<Value>,
    delay: Option<Duration>,
    next_id: u32,
}

#[derive(Clone)]
pub struct MockCommerce {
    pub base_url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockCommerce {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState {
            calls: Vec::new(),
            statuses: VecDeque::new(),
            last_status: "awaiting-payment".into(),
            create_status: "awaiting-payment".into(),
            card_keys: true,
            process_reply: ProcessReply::NoContent,
            failures: Vec::new(),
            raw_order: None,
            delay: None,
            next_id: 0,
        }));
        let handler_state = state.clone();
        let app = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let state = handler_state.clone();
                async move {
                    let delay = state.lock().delay;
                    if let Some(d) = delay {
                        tokio::time::sleep(d).await;
                    }
                    handle(state, method, uri, headers, body)
                }
            },
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}/api/", addr),
            state,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// GET responses walk through `statuses`, then repeat the last one
    pub fn script_statuses(&self, statuses: &[&str]) {
        let mut g = self.state.lock();
        g.statuses = statuses.iter().map(|s| s.to_string()).collect();
        if let Some(last) = statuses.last() {
            g.last_status = last.to_string();
        }
    }

    pub fn set_create_status(&self, status: &str) {
        self.state.lock().create_status = status.into();
    }

    pub fn without_card_keys(&self) {
        self.state.lock().card_keys = false;
    }

    pub fn set_process_reply(&self, reply: ProcessReply) {
        self.state.lock().process_reply = reply;
    }

    /// GET answers with `order` verbatim instead of the generated one
    pub fn set_raw_order(&self, order: Value) {
        self.state.lock().raw_order = Some(order);
    }

    /// Hold every response for `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    pub fn fail(&self, method: Method, path_contains: &str, status: u16, body: &str) {
        self.state.lock().failures.push(Failure {
            method,
            path_contains: path_contains.into(),
            status: StatusCode::from_u16(status).unwrap(),
            body: body.into(),
        });
    }

    pub fn config(&self) -> CheckoutConfig {
        let mut cfg = CheckoutConfig::for_base_url(&self.base_url, API_KEY).unwrap();
        cfg.commerce.collection_id = COLLECTION_ID.into();
        cfg.commerce.recipient_email = "buyer@example.com".into();
        cfg.commerce.payer_address = "0xpayer".into();
        cfg
    }
}

fn order_json(id: &str, status: &str, card_keys: bool) -> Value {
    let mut prep = json!({
        "chain": "base-sepolia",
        "payerAddress": "0xpayer",
        "serializedTransaction": "0x02f8ab01",
        "paymentAddress": "0xpay"
    });
    if card_keys {
        prep["stripePublishableKey"] = json!("pk_test_1");
        prep["stripeClientSecret"] = json!("pi_1_secret_2");
    }
    json!({
        "orderId": id,
        "phase": "payment",
        "lineItems": [],
        "payment": {
            "status": status,
            "method": "base-sepolia",
            "currency": "usdc",
            "amount": "1.00",
            "preparation": prep
        }
    })
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn handle(
    state: Arc<Mutex<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let mut g = state.lock();
    g.calls.push(RecordedCall {
        method: method.clone(),
        path: path.clone(),
        api_key: header(&headers, "x-api-key"),
        authorization: header(&headers, "authorization"),
        body: serde_json::from_slice(&body).ok(),
    });

    if let Some(f) = g
        .failures
        .iter()
        .find(|f| f.method == method && path.contains(&f.path_contains))
    {
        return (f.status, f.body.clone()).into_response();
    }

    if method == Method::POST && path == "/api/2022-06-09/orders" {
        g.next_id += 1;
        let id = format!("ord-{}", g.next_id);
        let status = g.create_status.clone();
        let order = order_json(&id, &status, g.card_keys);
        return (
            StatusCode::CREATED,
            Json(json!({ "clientSecret": format!("cs-{}", id), "order": order })),
        )
            .into_response();
    }

    if let Some(rest) = path.strip_prefix("/api/2023-06-09/checkout/orders/") {
        if method == Method::POST && rest.ends_with("/process-crypto-payment") {
            return match g.process_reply.clone() {
                ProcessReply::NoContent => StatusCode::NO_CONTENT.into_response(),
                ProcessReply::Json(v) => Json(v).into_response(),
            };
        }
    }

    if let Some(id) = path.strip_prefix("/api/2022-06-09/orders/") {
        let id = id.to_string();
        if method == Method::GET {
            if let Some(order) = g.raw_order.clone() {
                return Json(order).into_response();
            }
            let status = match g.statuses.pop_front() {
                Some(s) => s,
                None => g.last_status.clone(),
            };
            return Json(order_json(&id, &status, g.card_keys)).into_response();
        }
        if method == Method::PATCH {
            let status = g.last_status.clone();
            let mut order = order_json(&id, &status, g.card_keys);
            if let Some(recipient) = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|b| b.get("recipient").cloned())
            {
                order["recipient"] = recipient;
            }
            return Json(order).into_response();
        }
    }

    (StatusCode::NOT_FOUND, Json(json!({ "error": "no route" }))).into_response()
}

/// Run the proxy against `cfg`; returns its base URL (no trailing slash)
pub async fn spawn_proxy(cfg: CheckoutConfig) -> String {
    let app = routes::build_app(AppState::new(cfg).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Mock upstream plus a proxy in front of it
pub async fn stack() -> (MockCommerce, String) {
    let mock = MockCommerce::start().await;
    let proxy = spawn_proxy(mock.config()).await;
    (mock, proxy)
}
