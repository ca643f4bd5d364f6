//! Wallet checkout.
//!
//! `Creating → AwaitingPayment → TransactionSent → Processed`; any step can
//! land in `Error`. Signing and broadcasting belong to a `WalletConnector`.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use super::api::ProxyClient;
use super::error::{describe_error, CheckoutError};
use crate::orders::{CryptoOrderDetails, CryptoOrderRequest, PaymentStatus, ProcessPaymentRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum CryptoState {
    Creating,
    AwaitingPayment,
    TransactionSent { tx_hash: String },
    Processed,
    Error(String),
}

impl fmt::Display for CryptoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoState::Creating => f.write_str("creating"),
            CryptoState::AwaitingPayment => f.write_str("awaiting payment"),
            CryptoState::TransactionSent { .. } => f.write_str("transaction sent"),
            CryptoState::Processed => f.write_str("processed"),
            CryptoState::Error(_) => f.write_str("errored"),
        }
    }
}

/// Transaction the wallet must sign and broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTransaction {
    /// 0x-prefixed hex
    pub serialized: String,
    pub chain: Option<String>,
    pub payment_address: Option<String>,
    pub amount: Option<String>,
}

impl PreparedTransaction {
    pub fn from_details(d: &CryptoOrderDetails) -> Result<Self, CheckoutError> {
        let serialized = d
            .serialized_tx
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CheckoutError::NoTransaction)?;
        let hex = serialized
            .strip_prefix("0x")
            .ok_or_else(|| CheckoutError::BadTransaction("missing 0x prefix".into()))?;
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CheckoutError::BadTransaction("not hex".into()));
        }
        Ok(Self {
            serialized: serialized.to_string(),
            chain: d.chain.clone(),
            payment_address: d.payment_address.clone(),
            amount: d.amount.clone(),
        })
    }
}

/// Signs and submits a prepared transaction, returning its hash
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<String, CheckoutError>;
}

pub struct CryptoCheckout {
    api: ProxyClient,
    params: CryptoOrderRequest,
    state: CryptoState,
    details: Option<CryptoOrderDetails>,
    created: bool,
}

impl CryptoCheckout {
    pub fn new(api: ProxyClient, params: CryptoOrderRequest) -> Self {
        Self {
            api,
            params,
            state: CryptoState::Creating,
            details: None,
            created: false,
        }
    }

    pub fn state(&self) -> &CryptoState {
        &self.state
    }

    pub fn details(&self) -> Option<&CryptoOrderDetails> {
        self.details.as_ref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.order_id.as_str())
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match &self.state {
            CryptoState::TransactionSent { tx_hash } => Some(tx_hash),
            _ => None,
        }
    }

    fn fail(&mut self, e: CheckoutError) -> CheckoutError {
        let message = describe_error(&e);
        warn!(error = %message, "crypto checkout failed");
        self.state = CryptoState::Error(message);
        e
    }

    fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }

    /// Create the order. Only the first call on an instance does anything.
    pub async fn create_order(&mut self) -> Result<&CryptoOrderDetails, CheckoutError> {
        if self.created {
            return Err(self.invalid("create an order"));
        }
        self.created = true;

        let created = self.api.create_crypto_order(&self.params).await;
        let details = match created {
            Ok(d) => d,
            Err(e) => return Err(self.fail(e)),
        };
        info!(order_id = %details.order_id, chain = ?details.chain, "crypto order created");

        let insufficient = details
            .payment
            .as_ref()
            .map(|p| p.status == PaymentStatus::InsufficientFunds)
            .unwrap_or(false);
        if insufficient {
            self.details = Some(details);
            return Err(self.fail(CheckoutError::InsufficientFunds));
        }

        match self.api.check_order_status(&details.order_id).await {
            Ok(view) => debug!(order_id = %details.order_id, status = %view.status, "initial order status"),
            Err(e) => debug!(order_id = %details.order_id, error = %e, "initial status check failed"),
        }

        self.state = CryptoState::AwaitingPayment;
        Ok(self.details.insert(details))
    }

    /// Sign and broadcast via `wallet`, recording the returned hash
    pub async fn send_transaction<W>(&mut self, wallet: &W) -> Result<String, CheckoutError>
    where
        W: WalletConnector + ?Sized,
    {
        if self.state != CryptoState::AwaitingPayment {
            return Err(self.invalid("send a transaction"));
        }
        let prepared = match self.details.as_ref().map(PreparedTransaction::from_details) {
            Some(Ok(p)) => p,
            Some(Err(e)) => return Err(self.fail(e)),
            None => return Err(self.fail(CheckoutError::NoTransaction)),
        };
        let sent = wallet.send_transaction(&prepared).await;
        let tx_hash = match sent {
            Ok(h) => h,
            Err(e) => return Err(self.fail(e)),
        };
        info!(tx_hash = %tx_hash, "transaction sent");
        self.state = CryptoState::TransactionSent {
            tx_hash: tx_hash.clone(),
        };
        Ok(tx_hash)
    }

    /// Report the sent transaction; `on_complete` gets the order id
    pub async fn process_payment<F>(&mut self, on_complete: F) -> Result<Value, CheckoutError>
    where
        F: FnOnce(&str),
    {
        let (tx_hash, details) = match (&self.state, self.details.as_ref()) {
            (CryptoState::TransactionSent { tx_hash }, Some(d)) => (tx_hash.clone(), d.clone()),
            _ => return Err(self.invalid("process payment")),
        };
        let req = ProcessPaymentRequest {
            order_id: Some(details.order_id.clone()),
            client_secret: Some(details.client_secret.clone()),
            tx_id: Some(tx_hash),
            currency: details.currency.clone().or_else(|| self.params.currency.clone()),
            network: details.chain.clone().or_else(|| self.params.chain.clone()),
        };
        let processed = self.api.process_payment(&req).await;
        let result = match processed {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        info!(order_id = %details.order_id, "payment processed");
        self.state = CryptoState::Processed;
        on_complete(&details.order_id);
        Ok(result)
    }

    /// Full flow: create, send, process
    pub async fn run<W, F>(&mut self, wallet: &W, on_complete: F) -> Result<Value, CheckoutError>
    where
        W: WalletConnector + ?Sized,
        F: FnOnce(&str),
    {
        self.create_order().await?;
        self.send_transaction(wallet).await?;
        self.process_payment(on_complete).await
    }
}
