use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use nft_checkout::checkout::{
    describe_error, format_status, CardCheckout, CardConfirmer, CardSession, CheckoutError,
    CryptoCheckout, PollEvent, PollOutcome, PreparedTransaction, ProxyClient, StatusPoller,
    WalletConnector, DEFAULT_PROXY_URL,
};
use nft_checkout::config::PollConfig;
use nft_checkout::orders::{CryptoOrderRequest, ProcessPaymentRequest};
use nft_checkout::CheckoutConfig;

#[derive(Parser, Debug)]
#[command(name = "checkout-cli", version, about = "Drive NFT checkouts against the order proxy")]
struct Cli {
    /// Order proxy base URL
    #[arg(long, global = true, default_value = DEFAULT_PROXY_URL)]
    proxy: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Card checkout: create the order and confirm through the hosted element
    Card {
        /// Collection id (defaults to CHECKOUT_COLLECTION_ID)
        #[arg(long)]
        collection: Option<String>,

        /// Recipient email (defaults to CHECKOUT_RECIPIENT_EMAIL)
        #[arg(long)]
        email: Option<String>,

        /// Payment intent id, if already confirmed; otherwise read from stdin
        #[arg(long = "payment-intent")]
        payment_intent: Option<String>,

        /// Poll the order until it completes
        #[arg(long)]
        watch: bool,
    },

    /// Wallet checkout: create, send the transaction, report it
    Crypto {
        #[arg(long)]
        chain: Option<String>,

        #[arg(long)]
        currency: Option<String>,

        /// Hash of the broadcast transaction; otherwise read from stdin
        #[arg(long = "tx-hash")]
        tx_hash: Option<String>,

        #[arg(long)]
        watch: bool,
    },

    /// Report an already sent transaction for an order
    Pay {
        #[arg(long = "order-id")]
        order_id: String,

        #[arg(long = "client-secret")]
        client_secret: String,

        #[arg(long = "tx-id")]
        tx_id: String,

        #[arg(long, default_value = "usdc")]
        currency: String,

        #[arg(long, default_value = "ethereum-sepolia")]
        network: String,
    },

    /// Print an order's payment status once
    Status {
        #[arg(long = "order-id")]
        order_id: String,
    },

    /// Poll an order until completed/failed
    Watch {
        #[arg(long = "order-id")]
        order_id: String,

        /// Seconds between polls (defaults to CHECKOUT_POLL_INTERVAL_SECS)
        #[arg(long = "interval-secs")]
        interval_secs: Option<u64>,

        /// Consecutive failures before giving up
        #[arg(long = "max-errors")]
        max_errors: Option<u32>,
    },
}

async fn read_line(prompt: &str) -> anyhow::Result<String> {
    eprint!("{}", prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await
        .context("reading stdin")?
        .unwrap_or_default();
    Ok(line.trim().to_string())
}

/// Operator confirms in a browser and pastes the payment intent id
struct ManualCard {
    payment_intent: Option<String>,
}

#[async_trait]
impl CardConfirmer for ManualCard {
    async fn confirm(&self, session: &CardSession) -> Result<String, CheckoutError> {
        if let Some(id) = &self.payment_intent {
            return Ok(id.clone());
        }
        println!("order:            {}", session.order_id);
        println!("publishable key:  {}", session.stripe_publishable_key);
        println!("intent secret:    {}", session.stripe_client_secret);
        let id = read_line("payment intent id (empty to abort): ")
            .await
            .map_err(|e| CheckoutError::PaymentDeclined(e.to_string()))?;
        if id.is_empty() {
            return Err(CheckoutError::PaymentDeclined("aborted".into()));
        }
        Ok(id)
    }
}

/// Operator signs with an external wallet and pastes the hash
struct ManualWallet {
    tx_hash: Option<String>,
}

#[async_trait]
impl WalletConnector for ManualWallet {
    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<String, CheckoutError> {
        if let Some(h) = &self.tx_hash {
            return Ok(h.clone());
        }
        println!("chain:            {}", tx.chain.as_deref().unwrap_or("-"));
        println!("payment address:  {}", tx.payment_address.as_deref().unwrap_or("-"));
        println!("amount:           {}", tx.amount.as_deref().unwrap_or("-"));
        println!("transaction:      {}", tx.serialized);
        let hash = read_line("transaction hash (empty to abort): ")
            .await
            .map_err(|e| CheckoutError::Wallet(e.to_string()))?;
        if hash.is_empty() {
            return Err(CheckoutError::Wallet("user rejected the transaction".into()));
        }
        Ok(hash)
    }
}

async fn watch(api: ProxyClient, order_id: &str, poll: PollConfig) -> anyhow::Result<()> {
    let poller = StatusPoller::new(Arc::new(api), poll);
    println!("{}", poller.refresh_hint());
    let mut handle = poller.spawn(order_id);

    loop {
        tokio::select! {
            ev = handle.next_event() => match ev {
                Some(PollEvent::Status { status, polled_at, .. }) => {
                    println!("[{}] {}", polled_at.format("%H:%M:%S"), format_status(Some(&status)));
                }
                Some(PollEvent::Error { message, consecutive }) => {
                    eprintln!("poll failed ({}): {}", consecutive, message);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    let snap = handle.snapshot();
    match handle.wait().await {
        PollOutcome::Terminal(status) => {
            println!("final status: {} after {}s", format_status(Some(&status)), snap.elapsed_secs);
            if let Some(order) = snap.order {
                println!("{}", serde_json::to_string_pretty(&order)?);
            }
            Ok(())
        }
        PollOutcome::GaveUp { last_error } => bail!("gave up polling: {}", last_error),
        PollOutcome::Cancelled => {
            println!("cancelled");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = std::env::var("CHECKOUT_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CheckoutConfig::load().context("loading checkout config")?;
    let api = ProxyClient::new(cli.proxy.clone()).context("building http client")?;

    match cli.cmd {
        Commands::Card {
            collection,
            email,
            payment_intent,
            watch: follow,
        } => {
            let card = CardCheckout::new(
                api.clone(),
                collection.unwrap_or_else(|| config.commerce.collection_id.clone()),
                email.unwrap_or_else(|| config.commerce.recipient_email.clone()),
            );
            let session = card
                .run(&ManualCard { payment_intent }, |id| println!("payment complete for order {}", id))
                .await
                .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
            if follow {
                watch(api, &session.order_id, config.poll.clone()).await?;
            }
        }
        Commands::Crypto {
            chain,
            currency,
            tx_hash,
            watch: follow,
        } => {
            let mut checkout = CryptoCheckout::new(api.clone(), CryptoOrderRequest { chain, currency });
            let result = checkout
                .run(&ManualWallet { tx_hash }, |id| println!("payment submitted for order {}", id))
                .await
                .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if follow {
                if let Some(id) = checkout.order_id() {
                    watch(api, id, config.poll.clone()).await?;
                }
            }
        }
        Commands::Pay {
            order_id,
            client_secret,
            tx_id,
            currency,
            network,
        } => {
            let result = api
                .process_payment(&ProcessPaymentRequest {
                    order_id: Some(order_id),
                    client_secret: Some(client_secret),
                    tx_id: Some(tx_id),
                    currency: Some(currency),
                    network: Some(network),
                })
                .await
                .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Status { order_id } => {
            let view = api
                .check_order_status(&order_id)
                .await
                .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
            println!("{}", format_status(Some(&view.status)));
            println!("{}", serde_json::to_string_pretty(&view.payment)?);
        }
        Commands::Watch {
            order_id,
            interval_secs,
            max_errors,
        } => {
            let mut poll = config.poll.clone();
            if let Some(s) = interval_secs {
                poll.interval = Duration::from_secs(s.max(1));
            }
            if let Some(n) = max_errors {
                poll.max_consecutive_errors = n;
            }
            watch(api, &order_id, poll).await?;
        }
    }
    Ok(())
}
