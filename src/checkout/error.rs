use serde_json::Value;
use thiserror::Error;

pub const INSUFFICIENT_FUNDS_MESSAGE: &str =
    "Insufficient funds. Please make sure you have enough ETH to cover the transaction.";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Proxy answered non-2xx; `message` already carries status and body
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("invalid response from {op}: {reason}")]
    Decode { op: &'static str, reason: String },

    #[error("Missing payment configuration")]
    MissingPaymentConfig,

    #[error("{}", INSUFFICIENT_FUNDS_MESSAGE)]
    InsufficientFunds,

    #[error("order has no serialized transaction to sign")]
    NoTransaction,

    #[error("invalid serialized transaction: {0}")]
    BadTransaction(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("payment not confirmed: {0}")]
    PaymentDeclined(String),

    #[error("cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },
}

impl CheckoutError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CheckoutError::Api { status, .. } => Some(*status),
            CheckoutError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// User-facing text for an error
pub fn describe_error(e: &CheckoutError) -> String {
    let msg = e.to_string();
    if msg.to_ascii_lowercase().contains("insufficient funds") {
        return INSUFFICIENT_FUNDS_MESSAGE.to_string();
    }
    msg
}
