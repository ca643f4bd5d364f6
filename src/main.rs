use anyhow::Context;
use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nft_checkout::{routes, version, AppState, CheckoutConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // init tracing from CHECKOUT_LOG or RUST_LOG
    let filter = std::env::var("CHECKOUT_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = CheckoutConfig::load().context("loading checkout config")?;
    if config.commerce.api_key.is_empty() {
        warn!("CHECKOUT_API_KEY is not set; upstream calls will be rejected");
    }
    if config.commerce.collection_id.is_empty() {
        warn!("CHECKOUT_COLLECTION_ID is not set; crypto orders will fail upstream");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.bind, config.server.port))?;
    let cors = routes::cors_layer(&config.server);
    let api_base_url = config.commerce.api_base_url.clone();
    let dev = config.server.dev;

    let state = AppState::new(config).context("building http client")?;
    let app = routes::build_app(state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(listen = %addr, err = ?e, "failed to bind to address");
            return Err(e).context("bind");
        }
    };
    info!(
        listen = %addr,
        upstream = %api_base_url,
        dev,
        version = version::VERSION,
        "checkout proxy listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
