use std::sync::Arc;
use std::time::Instant;

use crate::config::CheckoutConfig;
use crate::upstream::CommerceClient;

/// Shared, read-only state handed to every proxy handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CheckoutConfig>,

    /// Client bound to the configured commerce API base URL and key
    pub commerce: CommerceClient,

    /// Process start, reported by `/livez`
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: CheckoutConfig) -> Result<Self, reqwest::Error> {
        let commerce = CommerceClient::new(&config.commerce)?;
        Ok(Self {
            config: Arc::new(config),
            commerce,
            started_at: Instant::now(),
        })
    }

    /// True when an API key is configured; server-initiated calls need one
    pub fn has_api_key(&self) -> bool {
        !self.config.commerce.api_key.is_empty()
    }
}
