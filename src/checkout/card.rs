//! Card checkout through the hosted payment element.
//!
//! create → attach recipient → read back the element keys → hand off to a
//! `CardConfirmer`. Every step after create uses the order id create returned.

use async_trait::async_trait;
use tracing::{info, warn};

use super::api::ProxyClient;
use super::error::CheckoutError;
use crate::orders::{CreateOrderRequest, EditOrderRequest, LineItems, PaymentRequest, Recipient};

/// Everything the hosted element needs to collect and confirm a card payment
#[derive(Debug, Clone, PartialEq)]
pub struct CardSession {
    pub order_id: String,
    pub client_secret: String,
    pub stripe_publishable_key: String,
    pub stripe_client_secret: String,
}

/// Collects card details and confirms the payment intent.
/// Returns the payment intent id on success.
#[async_trait]
pub trait CardConfirmer: Send + Sync {
    async fn confirm(&self, session: &CardSession) -> Result<String, CheckoutError>;
}

pub struct CardCheckout {
    api: ProxyClient,
    collection_id: String,
    recipient_email: String,
}

impl CardCheckout {
    pub fn new(
        api: ProxyClient,
        collection_id: impl Into<String>,
        recipient_email: impl Into<String>,
    ) -> Self {
        Self {
            api,
            collection_id: collection_id.into(),
            recipient_email: recipient_email.into(),
        }
    }

    /// Create the order and fetch the element keys
    pub async fn prepare(&self) -> Result<CardSession, CheckoutError> {
        let created = self
            .api
            .create_order(&CreateOrderRequest {
                recipient: None,
                locale: None,
                payment: PaymentRequest::card(),
                line_items: LineItems::collection(&self.collection_id, 1),
            })
            .await?;
        let order_id = created.order.order_id;
        let client_secret = created.client_secret;
        info!(order_id = %order_id, "card order created");

        self.api
            .edit_order(
                &order_id,
                &EditOrderRequest {
                    recipient: Some(Recipient::email(self.recipient_email.clone())),
                    ..Default::default()
                },
                Some(&client_secret),
            )
            .await?;

        let order = self.api.get_order(&order_id, Some(&client_secret)).await?;
        let prep = order.preparation();
        let publishable = prep.and_then(|p| p.stripe_publishable_key.clone());
        let intent_secret = prep.and_then(|p| p.stripe_client_secret.clone());
        match (publishable, intent_secret) {
            (Some(pk), Some(cs)) if !pk.is_empty() && !cs.is_empty() => Ok(CardSession {
                order_id,
                client_secret,
                stripe_publishable_key: pk,
                stripe_client_secret: cs,
            }),
            _ => {
                warn!(order_id = %order_id, "order has no card payment configuration");
                Err(CheckoutError::MissingPaymentConfig)
            }
        }
    }

    /// Confirm through `confirmer`; `on_complete` gets the order id on success
    pub async fn pay<C, F>(
        &self,
        session: &CardSession,
        confirmer: &C,
        on_complete: F,
    ) -> Result<String, CheckoutError>
    where
        C: CardConfirmer + ?Sized,
        F: FnOnce(&str),
    {
        let intent = confirmer.confirm(session).await?;
        info!(order_id = %session.order_id, payment_intent = %intent, "card payment confirmed");
        on_complete(&session.order_id);
        Ok(intent)
    }

    /// `prepare` then `pay`
    pub async fn run<C, F>(&self, confirmer: &C, on_complete: F) -> Result<CardSession, CheckoutError>
    where
        C: CardConfirmer + ?Sized,
        F: FnOnce(&str),
    {
        let session = self.prepare().await?;
        self.pay(&session, confirmer, on_complete).await?;
        Ok(session)
    }
}
