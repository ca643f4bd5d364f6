//! Order route handlers
//!
//! - POST /api/orders - create an order with the API key
//! - GET /api/orders/:orderId - read an order
//! - PATCH /api/orders/:orderId - edit recipient/locale/payment
//!
//! GET and PATCH forward the caller's `Authorization` header (the order's
//! client secret) when present and use the API key otherwise.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::app_state::AppState;
use crate::error::ProxyError;
use crate::metrics;
use crate::upstream::Credential;

pub(crate) fn json_body(
    endpoint: &str,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Value, ProxyError> {
    match body {
        Ok(Json(v)) if v.is_object() => Ok(v),
        Ok(_) => {
            metrics::validation_reject(endpoint);
            Err(ProxyError::Validation(
                "Request body must be a JSON object".into(),
            ))
        }
        Err(rej) => {
            metrics::validation_reject(endpoint);
            Err(ProxyError::Validation(format!(
                "Invalid JSON body: {}",
                rej.body_text()
            )))
        }
    }
}

fn forwarded_credential(headers: &HeaderMap) -> Credential {
    Credential::from_forwarded(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
}

fn require_order_id(endpoint: &str, order_id: &str) -> Result<(), ProxyError> {
    if order_id.trim().is_empty() {
        metrics::validation_reject(endpoint);
        return Err(ProxyError::Validation("Order ID is required".into()));
    }
    Ok(())
}

/// Missing `payment.method` or `lineItems` means the API would reject it anyway
fn validate_create_body(body: &Value) -> Result<(), ProxyError> {
    let mut missing = Vec::new();
    if body
        .get("payment")
        .and_then(|p| p.get("method"))
        .and_then(Value::as_str)
        .map(str::is_empty)
        .unwrap_or(true)
    {
        missing.push("payment.method");
    }
    if body.get("lineItems").map(Value::is_null).unwrap_or(true) {
        missing.push("lineItems");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        metrics::validation_reject("orders.create");
        Err(ProxyError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ProxyError> {
    let body = json_body("orders.create", body)?;
    validate_create_body(&body)?;

    let recipient = &body["recipient"];
    let currency = &body["payment"]["currency"];
    info!(
        recipient = %recipient,
        payment_method = %body["payment"]["method"],
        currency = %currency,
        "Creating order with commerce API"
    );

    let data = state.commerce.create_order(&body).await?;
    info!(
        order_id = data["order"]["orderId"].as_str().unwrap_or(""),
        "Order created successfully"
    );
    Ok((StatusCode::CREATED, Json(data)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ProxyError> {
    require_order_id("orders.get", &order_id)?;
    let cred = forwarded_credential(&headers);
    info!(order_id = %order_id, client_secret = matches!(cred, Credential::Authorization(_)), "Getting order");

    let data = state.commerce.get_order(&order_id, &cred).await?;
    info!(order_id = data["orderId"].as_str().unwrap_or(""), "Order retrieved successfully");
    Ok(Json(data))
}

pub async fn edit_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ProxyError> {
    require_order_id("orders.edit", &order_id)?;
    let body = json_body("orders.edit", body)?;
    let cred = forwarded_credential(&headers);
    let recipient = &body["recipient"];
    info!(order_id = %order_id, recipient = %recipient, "Editing order");

    let data = state.commerce.edit_order(&order_id, &body, &cred).await?;
    info!(order_id = data["orderId"].as_str().unwrap_or(""), "Order edited successfully");
    Ok(Json(data))
}
