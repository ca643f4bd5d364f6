//! Order data model shared by the proxy and the checkout client.
//!
//! Shapes mirror the commerce API's JSON (camelCase). Fields the proxy does not
//! interpret are kept in `extra` maps so nothing is dropped when a typed value
//! is re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Default locale sent with server-built orders
pub const DEFAULT_LOCALE: &str = "en-US";

/// Locator prefix for collections hosted by the commerce API
pub const COLLECTION_LOCATOR_PREFIX: &str = "crossmint:";

/// Build the collection locator for a configured collection id
pub fn collection_locator(collection_id: &str) -> String {
    format!("{}{}", COLLECTION_LOCATOR_PREFIX, collection_id)
}

// =================== Payment status ===================

/// Payment status as reported by `order.payment.status`.
///
/// `Completed` and `Failed` are terminal. Unknown strings are carried as `Other`
/// so a new upstream status never breaks polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    AwaitingPayment,
    InsufficientFunds,
    Completed,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::AwaitingPayment => "awaiting-payment",
            PaymentStatus::InsufficientFunds => "crypto-payer-insufficient-funds",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other(s) => s.as_str(),
        }
    }

    /// Placeholder for a payment that reports no status yet; never terminal
    pub fn pending() -> Self {
        PaymentStatus::Other("pending".to_string())
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "awaiting-payment" => PaymentStatus::AwaitingPayment,
            "crypto-payer-insufficient-funds" => PaymentStatus::InsufficientFunds,
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Other(s),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(s: &str) -> Self {
        PaymentStatus::from(s.to_string())
    }
}

impl From<PaymentStatus> for String {
    fn from(s: PaymentStatus) -> Self {
        match s {
            PaymentStatus::Other(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =================== Payment methods ===================

/// Payment methods accepted by the commerce API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    ArbitrumSepolia,
    BaseSepolia,
    EthereumSepolia,
    OptimismSepolia,
    Arbitrum,
    Bsc,
    Ethereum,
    Optimism,
    Solana,
    StripePaymentElement,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 10] = [
        PaymentMethod::ArbitrumSepolia,
        PaymentMethod::BaseSepolia,
        PaymentMethod::EthereumSepolia,
        PaymentMethod::OptimismSepolia,
        PaymentMethod::Arbitrum,
        PaymentMethod::Bsc,
        PaymentMethod::Ethereum,
        PaymentMethod::Optimism,
        PaymentMethod::Solana,
        PaymentMethod::StripePaymentElement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ArbitrumSepolia => "arbitrum-sepolia",
            PaymentMethod::BaseSepolia => "base-sepolia",
            PaymentMethod::EthereumSepolia => "ethereum-sepolia",
            PaymentMethod::OptimismSepolia => "optimism-sepolia",
            PaymentMethod::Arbitrum => "arbitrum",
            PaymentMethod::Bsc => "bsc",
            PaymentMethod::Ethereum => "ethereum",
            PaymentMethod::Optimism => "optimism",
            PaymentMethod::Solana => "solana",
            PaymentMethod::StripePaymentElement => "stripe-payment-element",
        }
    }

    /// True for on-chain methods (everything except the hosted card element)
    pub fn is_crypto(&self) -> bool {
        !matches!(self, PaymentMethod::StripePaymentElement)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =================== Request shapes ===================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// Delivery target: an email (custodial wallet) or an explicit wallet address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    #[serde(rename_all = "camelCase")]
    Email {
        email: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        physical_address: Option<PhysicalAddress>,
    },
    #[serde(rename_all = "camelCase")]
    Wallet {
        wallet_address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        physical_address: Option<PhysicalAddress>,
    },
}

impl Recipient {
    pub fn email(email: impl Into<String>) -> Self {
        Recipient::Email {
            email: email.into(),
            physical_address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_email: Option<String>,
}

impl PaymentRequest {
    pub fn card() -> Self {
        Self {
            method: PaymentMethod::StripePaymentElement,
            currency: None,
            payer_address: None,
            receipt_email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParameters {
    pub mode: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slippage_bps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLineItem {
    pub collection_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLineItem {
    pub token_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_parameters: Option<ExecutionParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineItems {
    Collection(CollectionLineItem),
    #[serde(rename_all = "camelCase")]
    Product {
        product_locator: String,
    },
    Token(TokenLineItem),
    Collections(Vec<CollectionLineItem>),
    Tokens(Vec<TokenLineItem>),
}

impl LineItems {
    /// Single collection item with `quantity` in its call data
    pub fn collection(collection_id: &str, quantity: u32) -> Self {
        let mut call_data = Map::new();
        call_data.insert("quantity".into(), Value::from(quantity));
        LineItems::Collection(CollectionLineItem {
            collection_locator: collection_locator(collection_id),
            call_data: Some(call_data),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub payment: PaymentRequest,
    pub line_items: LineItems,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRequest>,
}

// =================== Response shapes ===================

/// Data needed to pay: the serialized transaction for crypto, the hosted
/// element keys for card payments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPreparation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_publishable_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_client_secret: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    #[serde(default = "PaymentStatus::pending")]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation: Option<PaymentPreparation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub call_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LineItemMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Value>,
}

/// Order as returned by GET/PATCH (and nested in the create response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<OrderQuote>,
    pub payment: PaymentResponse,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    pub fn preparation(&self) -> Option<&PaymentPreparation> {
        self.payment.preparation.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub client_secret: String,
    pub order: Order,
}

// =================== Crypto proxy shapes ===================

/// Body of `POST /api/crypto/create-order`; both fields fall back to defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Normalized crypto order returned to the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoOrderDetails {
    pub order_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_tx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentResponse>,
}

impl CryptoOrderDetails {
    pub fn from_create_response(resp: CreateOrderResponse) -> Self {
        let CreateOrderResponse {
            client_secret,
            order,
        } = resp;
        let prep = order.payment.preparation.clone().unwrap_or_default();
        Self {
            order_id: order.order_id,
            client_secret,
            payment_address: prep.payment_address,
            amount: order.payment.amount.clone(),
            serialized_tx: prep.serialized_transaction,
            chain: prep.chain.or_else(|| order.payment.method.clone()),
            currency: order.payment.currency.clone(),
            payment: Some(order.payment),
        }
    }
}

/// Body of `GET /api/crypto/order-status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub status: PaymentStatus,
    /// `order.payment` exactly as the API sent it
    #[serde(default)]
    pub payment: Value,
}

impl OrderStatusView {
    /// Reads only `payment` from a raw order; the rest of the order may have
    /// any shape. A missing or non-string status reads as pending.
    pub fn from_order(order: &Value) -> Self {
        let payment = order.get("payment").cloned().unwrap_or(Value::Null);
        let status = payment
            .get("status")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PaymentStatus::from)
            .unwrap_or_else(PaymentStatus::pending);
        Self { status, payment }
    }
}

/// Body of `POST /api/crypto/process-payment`. Fields are optional so the
/// proxy can report every missing one instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

impl ProcessPaymentRequest {
    /// Names of required fields that are absent or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &Option<String>); 5] = [
            ("orderId", &self.order_id),
            ("clientSecret", &self.client_secret),
            ("txId", &self.tx_id),
            ("currency", &self.currency),
            ("network", &self.network),
        ];
        fields
            .iter()
            .filter(|(_, v)| v.as_deref().map(str::trim).unwrap_or("").is_empty())
            .map(|(name, _)| *name)
            .collect()
    }
}
