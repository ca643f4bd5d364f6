//! Checkout configuration.
//!
//! Resolution order: built-in defaults, then `checkout.toml` (or the file named
//! by `CHECKOUT_CONFIG`), then environment variables. `.env` is loaded by the
//! binaries before resolving.

use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};
use thiserror::Error;
use url::Url;

use crate::orders::PaymentMethod;

pub const DEFAULT_API_BASE_URL: &str = "https://staging.crossmint.com/api/";
pub const DEFAULT_RECIPIENT_EMAIL: &str = "cse@paella.dev";
pub const DEFAULT_CONFIG_FILE: &str = "checkout.toml";

/// Chains the crypto create-order endpoint accepts unless configured otherwise
pub const DEFAULT_VALID_CHAINS: [&str; 2] = ["ethereum-sepolia", "base-sepolia"];
pub const DEFAULT_VALID_CURRENCIES: [&str; 2] = ["eth", "usdc"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid api base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("valid chain {0:?} is not a supported crypto payment method")]
    UnsupportedChain(String),
}

/// `[commerce]` table: credentials and defaults for the external API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommerceFile {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub recipient_email: Option<String>,
    pub payer_address: Option<String>,
    pub collection_id: Option<String>,
    pub http_timeout_ms: Option<u64>,
    pub valid_chains: Option<Vec<String>>,
    pub valid_currencies: Option<Vec<String>>,
}

/// `[server]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerFile {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
    pub read_timeout_secs: Option<u64>,
    pub cors_origins: Option<Vec<String>>,
    pub dev: Option<bool>,
}

/// `[poll]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollFile {
    pub interval_secs: Option<u64>,
    pub max_consecutive_errors: Option<u32>,
}

/// Raw file contents; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutFile {
    pub commerce: Option<CommerceFile>,
    pub server: Option<ServerFile>,
    pub poll: Option<PollFile>,
}

impl CheckoutFile {
    /// Missing file is not an error; it resolves to defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

/// Commerce API settings used by the proxy
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub api_key: String,
    /// Always ends with `/`
    pub api_base_url: String,
    pub recipient_email: String,
    pub payer_address: String,
    pub collection_id: String,
    pub http_timeout: Duration,
    pub valid_chains: Vec<String>,
    pub valid_currencies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub dev: bool,
}

/// Floor for intervals read from the file or environment
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_consecutive_errors: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub commerce: CommerceConfig,
    pub server: ServerConfig,
    pub poll: PollConfig,
}

/// First non-empty env var among `keys`
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|s| s.trim() == "1" || s.trim().eq_ignore_ascii_case("true"))
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| split_list(&raw))
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every allowed chain must map to an on-chain payment method
pub fn check_valid_chains(chains: &[String]) -> Result<(), ConfigError> {
    match chains
        .iter()
        .find(|c| !PaymentMethod::parse(c).is_some_and(|m| m.is_crypto()))
    {
        Some(bad) => Err(ConfigError::UnsupportedChain(bad.clone())),
        None => Ok(()),
    }
}

/// Validate the base URL and make sure relative joins keep its path
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| ConfigError::BaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::BaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    let mut s = parsed.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Ok(s)
}

impl CheckoutFile {
    /// File values over defaults, then environment overrides on top
    pub fn resolved(&self) -> Result<CheckoutConfig, ConfigError> {
        let mut cfg = self.resolved_without_env()?;
        let c = &mut cfg.commerce;

        if let Some(v) = env_first(&["CHECKOUT_API_KEY", "CROSSMINT_API_KEY"]) {
            c.api_key = v;
        }
        if let Some(v) = env_first(&["CHECKOUT_API_BASE_URL", "CROSSMINT_API_BASE_URL"]) {
            c.api_base_url = normalize_base_url(&v)?;
        }
        if let Some(v) = env_first(&[
            "CHECKOUT_RECIPIENT_EMAIL",
            "NEXT_PUBLIC_CROSSMINT_EMAIL",
            "CROSSMINT_EMAIL",
        ]) {
            c.recipient_email = v;
        }
        if let Some(v) = env_first(&["CHECKOUT_PAYER_ADDRESS", "CROSSMINT_PAYER_ADDRESS"]) {
            c.payer_address = v;
        }
        if let Some(v) = env_first(&[
            "CHECKOUT_COLLECTION_ID",
            "NEXT_PUBLIC_COLLECTION_ID",
            "CROSSMINT_COLLECTION_ID",
        ]) {
            c.collection_id = v;
        }
        if let Some(ms) = env_parse::<u64>("CHECKOUT_HTTP_TIMEOUT_MS") {
            c.http_timeout = Duration::from_millis(ms);
        }
        if let Some(list) = env_list("CHECKOUT_VALID_CHAINS") {
            c.valid_chains = list;
        }
        if let Some(list) = env_list("CHECKOUT_VALID_CURRENCIES") {
            c.valid_currencies = list;
        }

        let s = &mut cfg.server;
        if let Some(v) = env_first(&["CHECKOUT_BIND"]) {
            s.bind = v;
        }
        if let Some(v) = env_parse("CHECKOUT_PORT") {
            s.port = v;
        }
        if let Some(v) = env_parse("CHECKOUT_MAX_BODY_BYTES") {
            s.max_body_bytes = v;
        }
        if let Some(secs) = env_parse::<u64>("CHECKOUT_READ_TIMEOUT_SECS") {
            s.read_timeout = Duration::from_secs(secs);
        }
        if let Some(list) = env_list("CHECKOUT_CORS_ORIGINS") {
            s.cors_origins = list;
        }
        if let Some(v) = env_flag("CHECKOUT_DEV") {
            s.dev = v;
        }

        let p = &mut cfg.poll;
        if let Some(secs) = env_parse::<u64>("CHECKOUT_POLL_INTERVAL_SECS") {
            p.interval = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse("CHECKOUT_POLL_MAX_ERRORS") {
            p.max_consecutive_errors = v;
        }
        p.interval = p.interval.max(MIN_POLL_INTERVAL);

        check_valid_chains(&cfg.commerce.valid_chains)?;
        Ok(cfg)
    }
}

impl CheckoutConfig {
    /// Load `CHECKOUT_CONFIG` (or `checkout.toml`) and apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CHECKOUT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        CheckoutFile::load_from(path)?.resolved()
    }

    /// Defaults only, pointed at `api_base_url`; used by tests and embedders
    pub fn for_base_url(api_base_url: &str, api_key: &str) -> Result<Self, ConfigError> {
        let mut cfg = CheckoutFile::default().resolved_without_env()?;
        cfg.commerce.api_base_url = normalize_base_url(api_base_url)?;
        cfg.commerce.api_key = api_key.to_string();
        Ok(cfg)
    }
}

impl CheckoutFile {
    /// Resolve ignoring the environment
    pub fn resolved_without_env(&self) -> Result<CheckoutConfig, ConfigError> {
        let c = self.commerce.clone().unwrap_or_default();
        let s = self.server.clone().unwrap_or_default();
        let p = self.poll.clone().unwrap_or_default();
        let defaults = PollConfig::default();
        let cfg = CheckoutConfig {
            commerce: CommerceConfig {
                api_key: c.api_key.unwrap_or_default(),
                api_base_url: normalize_base_url(
                    c.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
                )?,
                recipient_email: c
                    .recipient_email
                    .unwrap_or_else(|| DEFAULT_RECIPIENT_EMAIL.to_string()),
                payer_address: c.payer_address.unwrap_or_default(),
                collection_id: c.collection_id.unwrap_or_default(),
                http_timeout: Duration::from_millis(c.http_timeout_ms.unwrap_or(8000)),
                valid_chains: c
                    .valid_chains
                    .unwrap_or_else(|| DEFAULT_VALID_CHAINS.iter().map(|s| s.to_string()).collect()),
                valid_currencies: c.valid_currencies.unwrap_or_else(|| {
                    DEFAULT_VALID_CURRENCIES
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
            },
            server: ServerConfig {
                bind: s.bind.unwrap_or_else(|| "127.0.0.1".to_string()),
                port: s.port.unwrap_or(3000),
                max_body_bytes: s.max_body_bytes.unwrap_or(256 * 1024),
                read_timeout: Duration::from_secs(s.read_timeout_secs.unwrap_or(10)),
                cors_origins: s.cors_origins.unwrap_or_default(),
                dev: s.dev.unwrap_or(cfg!(feature = "dev")),
            },
            poll: PollConfig {
                interval: p
                    .interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.interval)
                    .max(MIN_POLL_INTERVAL),
                max_consecutive_errors: p
                    .max_consecutive_errors
                    .unwrap_or(defaults.max_consecutive_errors),
            },
        };
        check_valid_chains(&cfg.commerce.valid_chains)?;
        Ok(cfg)
    }
}
