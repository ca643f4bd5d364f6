//! Commerce API client used by the order proxy.
//!
//! Every call is a single request: no retries, no idempotency keys. The only
//! time bound is the client's overall timeout.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;

use crate::config::CommerceConfig;
use crate::metrics;

pub const ORDERS_API_VERSION: &str = "2022-06-09";
pub const CHECKOUT_API_VERSION: &str = "2023-06-09";

/// Credential attached to an upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Server-initiated call: `X-API-KEY` from config
    ApiKey,
    /// Client-continued call: `Authorization` value passed through untouched
    Authorization(String),
}

impl Credential {
    /// Forwarded `Authorization` header wins; otherwise fall back to the API key
    pub fn from_forwarded(header: Option<&str>) -> Self {
        match header.map(str::trim) {
            Some(v) if !v.is_empty() => Credential::Authorization(v.to_string()),
            _ => Credential::ApiKey,
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to {op}: {} {} - {body}", .status.as_u16(), .status.canonical_reason().unwrap_or(""))]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to {op}: invalid response body: {reason}")]
    Decode { op: &'static str, reason: String },
}

impl UpstreamError {
    /// Upstream body parsed as JSON when it is JSON
    pub fn details(&self) -> Option<Value> {
        match self {
            UpstreamError::Status { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

/// Thin wrapper over `reqwest::Client` bound to one API base URL and key
#[derive(Clone)]
pub struct CommerceClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl CommerceClient {
    pub fn new(cfg: &CommerceConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(cfg.http_timeout).build()?;
        Ok(Self {
            http,
            base_url: cfg.api_base_url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn orders_url(&self) -> String {
        format!("{}{}/orders", self.base_url, ORDERS_API_VERSION)
    }

    /// Order id is encoded as one path segment
    pub fn order_url(&self, order_id: &str) -> String {
        format!(
            "{}{}/orders/{}",
            self.base_url,
            ORDERS_API_VERSION,
            urlencoding::encode(order_id)
        )
    }

    pub fn process_payment_url(&self, order_id: &str) -> String {
        format!(
            "{}{}/checkout/orders/{}/process-crypto-payment",
            self.base_url,
            CHECKOUT_API_VERSION,
            urlencoding::encode(order_id)
        )
    }

    fn authorize(&self, req: RequestBuilder, cred: &Credential) -> RequestBuilder {
        match cred {
            Credential::ApiKey => req.header("X-API-KEY", &self.api_key),
            Credential::Authorization(v) => req.header(reqwest::header::AUTHORIZATION, v),
        }
    }

    /// Send, time, and fail on non-2xx with the upstream body attached
    async fn send(&self, op: &'static str, req: RequestBuilder) -> Result<Response, UpstreamError> {
        let started = Instant::now();
        let result = req.send().await;
        let elapsed = started.elapsed();
        match result {
            Ok(resp) if resp.status().is_success() => {
                metrics::observe_upstream(op, "ok", elapsed);
                Ok(resp)
            }
            Ok(resp) => {
                metrics::observe_upstream(op, "status", elapsed);
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(
                    op,
                    status = status.as_u16(),
                    reason = status.canonical_reason().unwrap_or(""),
                    body = %body,
                    "commerce API error"
                );
                Err(UpstreamError::Status { op, status, body })
            }
            Err(source) => {
                metrics::observe_upstream(op, "transport", elapsed);
                tracing::error!(op, error = %source, elapsed_ms = elapsed.as_millis() as u64, "commerce API unreachable");
                Err(UpstreamError::Transport { op, source })
            }
        }
    }

    async fn json_body(op: &'static str, resp: Response) -> Result<Value, UpstreamError> {
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport { op, source })?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
            op,
            reason: e.to_string(),
        })
    }

    /// POST /orders with the API key
    pub async fn create_order(&self, body: &Value) -> Result<Value, UpstreamError> {
        const OP: &str = "create order";
        let req = self.authorize(self.http.post(self.orders_url()), &Credential::ApiKey);
        let resp = self.send(OP, req.json(body)).await?;
        Self::json_body(OP, resp).await
    }

    /// GET /orders/:id
    pub async fn get_order(&self, order_id: &str, cred: &Credential) -> Result<Value, UpstreamError> {
        const OP: &str = "get order";
        let req = self.authorize(self.http.get(self.order_url(order_id)), cred);
        let resp = self.send(OP, req).await?;
        Self::json_body(OP, resp).await
    }

    /// PATCH /orders/:id
    pub async fn edit_order(
        &self,
        order_id: &str,
        body: &Value,
        cred: &Credential,
    ) -> Result<Value, UpstreamError> {
        const OP: &str = "edit order";
        let req = self.authorize(self.http.patch(self.order_url(order_id)), cred);
        let resp = self.send(OP, req.json(body)).await?;
        Self::json_body(OP, resp).await
    }

    /// POST checkout/orders/:id/process-crypto-payment with the client secret.
    ///
    /// `Ok(None)` when the API answers 204 or with an empty / non-JSON body.
    pub async fn process_crypto_payment(
        &self,
        order_id: &str,
        client_secret: &str,
        body: &Value,
    ) -> Result<Option<Value>, UpstreamError> {
        const OP: &str = "process payment";
        let cred = Credential::Authorization(client_secret.to_string());
        let req = self.authorize(self.http.post(self.process_payment_url(order_id)), &cred);
        let resp = self.send(OP, req.json(body)).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport { op: OP, source })?;
        Ok(serde_json::from_slice(&bytes).ok())
    }
}
