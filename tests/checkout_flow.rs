mod harness;

use async_trait::async_trait;
use axum::http::Method;
use harness::{stack, API_KEY};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use nft_checkout::checkout::{
    describe_error, CardCheckout, CardConfirmer, CardSession, CheckoutError, CryptoCheckout,
    CryptoState, PollOutcome, PreparedTransaction, ProxyClient, StatusPoller, WalletConnector,
    INSUFFICIENT_FUNDS_MESSAGE,
};
use nft_checkout::config::PollConfig;
use nft_checkout::orders::{CryptoOrderRequest, PaymentStatus};

struct RecordingCard {
    seen: Mutex<Option<CardSession>>,
}

#[async_trait]
impl CardConfirmer for RecordingCard {
    async fn confirm(&self, session: &CardSession) -> Result<String, CheckoutError> {
        *self.seen.lock() = Some(session.clone());
        Ok("pi_1".into())
    }
}

struct FixedWallet {
    hash: &'static str,
    seen: Mutex<Option<PreparedTransaction>>,
}

#[async_trait]
impl WalletConnector for FixedWallet {
    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<String, CheckoutError> {
        *self.seen.lock() = Some(tx.clone());
        Ok(self.hash.to_string())
    }
}

struct BrokeWallet;

#[async_trait]
impl WalletConnector for BrokeWallet {
    async fn send_transaction(&self, _tx: &PreparedTransaction) -> Result<String, CheckoutError> {
        Err(CheckoutError::Wallet(
            "insufficient funds for gas * price + value".into(),
        ))
    }
}

#[tokio::test]
async fn card_flow_uses_created_order_id_throughout() {
    let (mock, proxy) = stack().await;
    let api = ProxyClient::new(proxy).unwrap();
    let card = CardCheckout::new(api, "col-1", "buyer@example.com");
    let confirmer = RecordingCard {
        seen: Mutex::new(None),
    };
    let mut completed = None;
    let session = card
        .run(&confirmer, |id| completed = Some(id.to_string()))
        .await
        .unwrap();

    assert_eq!(session.order_id, "ord-1");
    assert_eq!(session.stripe_publishable_key, "pk_test_1");
    assert_eq!(session.stripe_client_secret, "pi_1_secret_2");
    assert_eq!(completed.as_deref(), Some("ord-1"));
    assert_eq!(confirmer.seen.lock().as_ref(), Some(&session));

    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].method, Method::POST);
    let created = calls[0].body.as_ref().unwrap();
    assert_eq!(created["payment"]["method"], "stripe-payment-element");
    assert_eq!(created["lineItems"]["collectionLocator"], "crossmint:col-1");
    assert_eq!(created["lineItems"]["callData"]["quantity"], 1);

    assert_eq!(calls[1].method, Method::PATCH);
    assert_eq!(calls[1].path, "/api/2022-06-09/orders/ord-1");
    assert_eq!(
        calls[1].body.as_ref().unwrap()["recipient"]["email"],
        "buyer@example.com"
    );
    assert_eq!(calls[2].method, Method::GET);
    assert_eq!(calls[2].path, "/api/2022-06-09/orders/ord-1");
    assert_eq!(calls[2].authorization.as_deref(), Some("cs-ord-1"));
}

#[tokio::test]
async fn card_flow_without_element_keys_fails() {
    let (mock, proxy) = stack().await;
    mock.without_card_keys();
    let card = CardCheckout::new(ProxyClient::new(proxy).unwrap(), "col-1", "a@b.c");
    let err = card.prepare().await.unwrap_err();
    assert!(matches!(err, CheckoutError::MissingPaymentConfig));
    assert_eq!(describe_error(&err), "Missing payment configuration");
}

#[tokio::test]
async fn card_flow_surfaces_upstream_failure() {
    let (mock, proxy) = stack().await;
    mock.fail(Method::PATCH, "/orders/", 422, r#"{"message":"bad email"}"#);
    let card = CardCheckout::new(ProxyClient::new(proxy).unwrap(), "col-1", "nope");
    let err = card.prepare().await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(err.to_string().starts_with("Failed to edit order: 422"));
}

#[tokio::test]
async fn crypto_flow_runs_to_processed() {
    let (mock, proxy) = stack().await;
    let api = ProxyClient::new(proxy).unwrap();
    let mut checkout = CryptoCheckout::new(
        api,
        CryptoOrderRequest {
            chain: Some("base-sepolia".into()),
            currency: Some("usdc".into()),
        },
    );
    let wallet = FixedWallet {
        hash: "0xfeed",
        seen: Mutex::new(None),
    };

    let details = checkout.create_order().await.unwrap();
    assert_eq!(details.order_id, "ord-1");
    assert_eq!(checkout.state(), &CryptoState::AwaitingPayment);

    let hash = checkout.send_transaction(&wallet).await.unwrap();
    assert_eq!(hash, "0xfeed");
    assert_eq!(checkout.tx_hash(), Some("0xfeed"));
    assert_eq!(
        wallet.seen.lock().as_ref().map(|t| t.serialized.clone()),
        Some("0x02f8ab01".to_string())
    );

    let mut done = None;
    let result = checkout
        .process_payment(|id| done = Some(id.to_string()))
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!({ "success": true }));
    assert_eq!(done.as_deref(), Some("ord-1"));
    assert_eq!(checkout.state(), &CryptoState::Processed);

    let calls = mock.calls();
    // create, informational status check, process
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].method, Method::GET);
    assert_eq!(calls[1].api_key.as_deref(), Some(API_KEY));
    let processed = &calls[2];
    assert_eq!(
        processed.path,
        "/api/2023-06-09/checkout/orders/ord-1/process-crypto-payment"
    );
    assert_eq!(processed.authorization.as_deref(), Some("cs-ord-1"));
    let sent = processed.body.as_ref().unwrap();
    assert_eq!(sent["txId"], "0xfeed");
    assert_eq!(sent["network"], "base-sepolia");
    assert_eq!(sent["currency"], "usdc");
}

#[tokio::test]
async fn insufficient_funds_on_create_stops_the_flow() {
    let (mock, proxy) = stack().await;
    mock.set_create_status("crypto-payer-insufficient-funds");
    let mut checkout = CryptoCheckout::new(
        ProxyClient::new(proxy).unwrap(),
        CryptoOrderRequest::default(),
    );
    let err = checkout.create_order().await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientFunds));
    assert_eq!(
        checkout.state(),
        &CryptoState::Error(INSUFFICIENT_FUNDS_MESSAGE.to_string())
    );
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn wallet_failure_maps_to_friendly_text() {
    let (_mock, proxy) = stack().await;
    let mut checkout = CryptoCheckout::new(
        ProxyClient::new(proxy).unwrap(),
        CryptoOrderRequest::default(),
    );
    checkout.create_order().await.unwrap();
    let err = checkout.send_transaction(&BrokeWallet).await.unwrap_err();
    assert_eq!(describe_error(&err), INSUFFICIENT_FUNDS_MESSAGE);
    assert_eq!(
        checkout.state(),
        &CryptoState::Error(INSUFFICIENT_FUNDS_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn poller_follows_order_to_completion() {
    let (mock, proxy) = stack().await;
    mock.script_statuses(&["awaiting-payment", "awaiting-payment", "completed"]);
    let api = Arc::new(ProxyClient::new(proxy).unwrap());
    let poller = StatusPoller::new(
        api,
        PollConfig {
            interval: Duration::from_millis(20),
            max_consecutive_errors: 3,
        },
    );
    let handle = poller.spawn("ord-1");
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Terminal(PaymentStatus::Completed));

    let gets = mock.calls().len();
    assert_eq!(gets, 3);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(mock.calls().len(), gets);
}

#[tokio::test]
async fn poller_gives_up_when_upstream_keeps_failing() {
    let (mock, proxy) = stack().await;
    mock.fail(Method::GET, "/orders/ord-1", 500, "boom");
    let poller = StatusPoller::new(
        Arc::new(ProxyClient::new(proxy).unwrap()),
        PollConfig {
            interval: Duration::from_millis(10),
            max_consecutive_errors: 3,
        },
    );
    let outcome = tokio::time::timeout(Duration::from_secs(5), poller.spawn("ord-1").wait())
        .await
        .unwrap();
    assert!(matches!(outcome, PollOutcome::GaveUp { .. }));
    assert_eq!(mock.calls().len(), 3);
}

#[tokio::test]
async fn poller_reads_status_from_sparse_order() {
    let (mock, proxy) = stack().await;
    mock.set_raw_order(serde_json::json!({
        "orderId": "ord-1",
        "lineItems": [{ "metadata": {} }],
        "payment": { "status": "completed" }
    }));
    let poller = StatusPoller::new(
        Arc::new(ProxyClient::new(proxy).unwrap()),
        PollConfig {
            interval: Duration::from_millis(10),
            max_consecutive_errors: 3,
        },
    );
    let outcome = tokio::time::timeout(Duration::from_secs(5), poller.spawn("ord-1").wait())
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Terminal(PaymentStatus::Completed));
    assert_eq!(mock.calls().len(), 1);
}
