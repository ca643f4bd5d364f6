//! NFT storefront checkout: an order proxy in front of the commerce API plus
//! the client-side checkout flows that talk to it.

pub mod app_state;
pub mod checkout;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orders;
pub mod routes;
pub mod upstream;
pub mod version;

pub use app_state::AppState;
pub use config::CheckoutConfig;
