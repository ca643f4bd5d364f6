//! Checkout client: what a storefront runs against the order proxy.
//!
//! - `api` - typed client for the proxy endpoints
//! - `card` - hosted card element flow
//! - `crypto` - wallet flow state machine
//! - `poller` - order status polling until a terminal status

pub mod api;
pub mod card;
pub mod crypto;
pub mod error;
pub mod poller;

pub use api::{ProxyClient, DEFAULT_PROXY_URL};
pub use card::{CardCheckout, CardConfirmer, CardSession};
pub use crypto::{CryptoCheckout, CryptoState, PreparedTransaction, WalletConnector};
pub use error::{describe_error, CheckoutError, INSUFFICIENT_FUNDS_MESSAGE};
pub use poller::{
    format_status, PollEvent, PollOutcome, PollSnapshot, PollerHandle, StatusPoller, StatusReport,
    StatusSource,
};
