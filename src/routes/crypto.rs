//! Crypto checkout route handlers
//!
//! - POST /api/crypto/create-order - server-built order for a wallet payment
//! - GET /api/crypto/order-status?orderId= - current payment status
//! - POST /api/crypto/process-payment - confirm a submitted transaction

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::ProxyError;
use crate::metrics;
use crate::orders::{
    collection_locator, CollectionLineItem, CreateOrderRequest, CreateOrderResponse,
    CryptoOrderDetails, CryptoOrderRequest, LineItems, OrderStatusView, PaymentMethod,
    PaymentRequest, ProcessPaymentRequest, Recipient, DEFAULT_LOCALE,
};
use crate::upstream::Credential;

pub const DEFAULT_CHAIN: &str = "ethereum-sepolia";
pub const DEFAULT_CURRENCY: &str = "usdc";

/// Pick chain/currency (with defaults) and check them against the allow lists
pub fn select_chain_currency(
    req: &CryptoOrderRequest,
    valid_chains: &[String],
    valid_currencies: &[String],
) -> Result<(String, String), ProxyError> {
    let chain = req
        .chain
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CHAIN);
    let currency = req
        .currency
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CURRENCY);

    if !valid_chains.iter().any(|c| c == chain) {
        return Err(ProxyError::Validation(format!(
            "Invalid chain: {}. Valid options are: {}",
            chain,
            valid_chains.join(", ")
        )));
    }
    if !valid_currencies.iter().any(|c| c == currency) {
        return Err(ProxyError::Validation(format!(
            "Invalid currency: {}. Valid options are: {}",
            currency,
            valid_currencies.join(", ")
        )));
    }
    Ok((chain.to_string(), currency.to_string()))
}

/// Upstream body for a server-built crypto order
pub fn build_crypto_order(
    state: &AppState,
    chain: &str,
    currency: &str,
) -> Result<CreateOrderRequest, ProxyError> {
    let method = PaymentMethod::parse(chain)
        .filter(PaymentMethod::is_crypto)
        .ok_or_else(|| {
            ProxyError::Unexpected(format!(
                "Configured chain {} is not a supported payment method",
                chain
            ))
        })?;
    let c = &state.config.commerce;
    Ok(CreateOrderRequest {
        recipient: Some(Recipient::email(c.recipient_email.clone())),
        locale: Some(DEFAULT_LOCALE.to_string()),
        payment: PaymentRequest {
            method,
            currency: Some(currency.to_string()),
            payer_address: Some(c.payer_address.clone()).filter(|a| !a.is_empty()),
            receipt_email: None,
        },
        line_items: LineItems::Collection(CollectionLineItem {
            collection_locator: collection_locator(&c.collection_id),
            call_data: None,
        }),
    })
}

pub async fn create_crypto_order(
    State(state): State<AppState>,
    body: Option<Json<CryptoOrderRequest>>,
) -> Result<Json<CryptoOrderDetails>, ProxyError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let (chain, currency) = select_chain_currency(
        &req,
        &state.config.commerce.valid_chains,
        &state.config.commerce.valid_currencies,
    )
    .inspect_err(|_| metrics::validation_reject("crypto.create-order"))?;

    info!(chain = %chain, currency = %currency, "Creating crypto order");
    let order_req = build_crypto_order(&state, &chain, &currency)?;
    let upstream_body =
        serde_json::to_value(&order_req).map_err(|e| ProxyError::Unexpected(e.to_string()))?;

    let data = state.commerce.create_order(&upstream_body).await?;
    let created: CreateOrderResponse = serde_json::from_value(data)
        .map_err(|e| ProxyError::Unexpected(format!("Failed to create order: {}", e)))?;
    let details = CryptoOrderDetails::from_create_response(created);
    info!(
        order_id = %details.order_id,
        payment_status = details.payment.as_ref().map(|p| p.status.as_str()).unwrap_or(""),
        has_serialized_tx = details.serialized_tx.is_some(),
        "Crypto order created"
    );
    Ok(Json(details))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

pub async fn order_status(
    State(state): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<OrderStatusView>, ProxyError> {
    let order_id = match q.order_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            metrics::validation_reject("crypto.order-status");
            return Err(ProxyError::Validation("Order ID is required".into()));
        }
    };

    let data = state.commerce.get_order(&order_id, &Credential::ApiKey).await?;
    let view = OrderStatusView::from_order(&data);
    info!(order_id = %order_id, status = %view.status, "Order status fetched");
    Ok(Json(view))
}

pub async fn process_payment(
    State(state): State<AppState>,
    body: Result<Json<ProcessPaymentRequest>, JsonRejection>,
) -> Result<Json<Value>, ProxyError> {
    let req = match body {
        Ok(Json(r)) => r,
        Err(rej) => {
            metrics::validation_reject("crypto.process-payment");
            return Err(ProxyError::Validation(format!(
                "Invalid JSON body: {}",
                rej.body_text()
            )));
        }
    };

    info!(
        order_id = req.order_id.as_deref().unwrap_or(""),
        tx_id = req.tx_id.as_deref().unwrap_or(""),
        currency = req.currency.as_deref().unwrap_or(""),
        network = req.network.as_deref().unwrap_or(""),
        client_secret_len = req.client_secret.as_deref().map(str::len).unwrap_or(0),
        "Processing crypto payment"
    );

    let missing = req.missing_fields();
    if !missing.is_empty() {
        warn!(missing = ?missing, "process-payment rejected");
        metrics::validation_reject("crypto.process-payment");
        return Err(ProxyError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    // missing_fields() guarantees these are present
    let order_id = req.order_id.unwrap_or_default();
    let client_secret = req.client_secret.unwrap_or_default();
    let upstream_body = json!({
        "txId": req.tx_id,
        "currency": req.currency,
        "network": req.network,
    });

    let data = state
        .commerce
        .process_crypto_payment(&order_id, &client_secret, &upstream_body)
        .await?;
    info!(order_id = %order_id, with_body = data.is_some(), "Crypto payment accepted");
    Ok(Json(data.unwrap_or_else(|| json!({ "success": true }))))
}
