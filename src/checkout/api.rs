//! Client for the order proxy's HTTP API.
//!
//! This is what a storefront frontend calls; it never talks to the commerce
//! API directly and never holds the API key.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::error::CheckoutError;
use crate::orders::{
    CreateOrderRequest, CreateOrderResponse, CryptoOrderDetails, CryptoOrderRequest,
    EditOrderRequest, Order, OrderStatusView, ProcessPaymentRequest,
};

pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";

#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    base: String,
}

impl ProxyClient {
    pub fn new(base: impl Into<String>) -> Result<Self, CheckoutError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn order_path(order_id: &str) -> String {
        format!("/api/orders/{}", urlencoding::encode(order_id))
    }

    fn with_secret(req: RequestBuilder, client_secret: Option<&str>) -> RequestBuilder {
        match client_secret {
            Some(s) => req.header(reqwest::header::AUTHORIZATION, s),
            None => req,
        }
    }

    /// Non-2xx becomes `CheckoutError::Api` with the proxy's message
    async fn check(op: &'static str, resp: Response) -> Result<Response, CheckoutError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();
        // the proxy's message already names the operation and upstream status
        let message = body
            .as_ref()
            .and_then(|b| b.get("message").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Failed to {}: {} {}", op, status.as_u16(), text));
        Err(CheckoutError::Api {
            status: status.as_u16(),
            message,
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(op: &'static str, resp: Response) -> Result<T, CheckoutError> {
        let resp = Self::check(op, resp).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| CheckoutError::Decode {
            op,
            reason: e.to_string(),
        })
    }

    pub async fn create_order(
        &self,
        req: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, CheckoutError> {
        let resp = self.http.post(self.url("/api/orders")).json(req).send().await?;
        Self::decode("create order", resp).await
    }

    pub async fn edit_order(
        &self,
        order_id: &str,
        req: &EditOrderRequest,
        client_secret: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let req = self
            .http
            .patch(self.url(&Self::order_path(order_id)))
            .json(req);
        let resp = Self::with_secret(req, client_secret).send().await?;
        Self::decode("edit order", resp).await
    }

    pub async fn get_order(
        &self,
        order_id: &str,
        client_secret: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let req = self.http.get(self.url(&Self::order_path(order_id)));
        let resp = Self::with_secret(req, client_secret).send().await?;
        Self::decode("get order", resp).await
    }

    /// Order as raw JSON, for callers that read only part of it
    pub async fn get_order_json(
        &self,
        order_id: &str,
        client_secret: Option<&str>,
    ) -> Result<Value, CheckoutError> {
        let req = self.http.get(self.url(&Self::order_path(order_id)));
        let resp = Self::with_secret(req, client_secret).send().await?;
        Self::decode("get order", resp).await
    }

    pub async fn create_crypto_order(
        &self,
        params: &CryptoOrderRequest,
    ) -> Result<CryptoOrderDetails, CheckoutError> {
        let resp = self
            .http
            .post(self.url("/api/crypto/create-order"))
            .json(params)
            .send()
            .await?;
        Self::decode("create order", resp).await
    }

    pub async fn check_order_status(&self, order_id: &str) -> Result<OrderStatusView, CheckoutError> {
        let resp = self
            .http
            .get(self.url("/api/crypto/order-status"))
            .query(&[("orderId", order_id)])
            .send()
            .await?;
        Self::decode("check status", resp).await
    }

    pub async fn process_payment(&self, req: &ProcessPaymentRequest) -> Result<Value, CheckoutError> {
        let resp = self
            .http
            .post(self.url("/api/crypto/process-payment"))
            .json(req)
            .send()
            .await?;
        Self::decode("process payment", resp).await
    }
}
