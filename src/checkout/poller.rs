//! Order status polling.
//!
//! One spawned task per order. It polls immediately, then every `interval`
//! until the payment reaches a terminal status, the consecutive error bound is
//! hit, or the handle cancels it. Dropping the handle cancels too.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::ProxyClient;
use super::error::CheckoutError;
use crate::config::PollConfig;
use crate::orders::{OrderStatusView, PaymentStatus};

/// Floor applied to any interval handed to the poller
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// One successful status read
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: PaymentStatus,
    pub order: Value,
}

#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch_status(&self, order_id: &str) -> Result<StatusReport, CheckoutError>;
}

#[async_trait]
impl StatusSource for ProxyClient {
    async fn fetch_status(&self, order_id: &str) -> Result<StatusReport, CheckoutError> {
        // only payment.status matters here; the rest of the order is passed on as-is
        let order = self.get_order_json(order_id, None).await?;
        let status = OrderStatusView::from_order(&order).status;
        Ok(StatusReport { status, order })
    }
}

#[derive(Debug, Clone)]
pub enum PollEvent {
    Status {
        status: PaymentStatus,
        order: Value,
        polled_at: DateTime<Utc>,
    },
    Error {
        message: String,
        consecutive: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Terminal(PaymentStatus),
    GaveUp { last_error: String },
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    pub status: Option<PaymentStatus>,
    pub last_polled: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub order: Option<Value>,
    pub polls: u32,
    pub elapsed_secs: u64,
}

struct Shared {
    snapshot: PollSnapshot,
    started: Instant,
}

pub struct StatusPoller<S> {
    source: Arc<S>,
    config: PollConfig,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: Arc<S>, mut config: PollConfig) -> Self {
        config.interval = config.interval.max(MIN_INTERVAL);
        Self { source, config }
    }

    /// Interval the task actually sleeps between polls
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Text shown next to the status, derived from the poll interval
    pub fn refresh_hint(&self) -> String {
        let interval = self.config.interval;
        let every = if interval.subsec_millis() == 0 {
            match interval.as_secs() {
                1 => "second".to_string(),
                n => format!("{} seconds", n),
            }
        } else {
            format!("{} milliseconds", interval.as_millis())
        };
        format!("This page will automatically refresh every {}", every)
    }

    pub fn spawn(&self, order_id: impl Into<String>) -> PollerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared {
            snapshot: PollSnapshot::default(),
            started: Instant::now(),
        }));
        let task = tokio::spawn(run(
            self.source.clone(),
            order_id.into(),
            self.config.clone(),
            cancel_rx,
            events_tx,
            shared.clone(),
        ));
        PollerHandle {
            cancel: cancel_tx,
            task,
            events: events_rx,
            shared,
        }
    }
}

pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<PollOutcome>,
    events: mpsc::UnboundedReceiver<PollEvent>,
    shared: Arc<Mutex<Shared>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    pub fn snapshot(&self) -> PollSnapshot {
        let g = self.shared.lock();
        let mut snap = g.snapshot.clone();
        snap.elapsed_secs = g.started.elapsed().as_secs();
        snap
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to stop. A panicked task reads as cancelled.
    pub async fn wait(self) -> PollOutcome {
        let PollerHandle { cancel, task, .. } = self;
        let outcome = task.await.unwrap_or(PollOutcome::Cancelled);
        drop(cancel);
        outcome
    }
}

async fn run<S: StatusSource>(
    source: Arc<S>,
    order_id: String,
    config: PollConfig,
    mut cancel: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<PollEvent>,
    shared: Arc<Mutex<Shared>>,
) -> PollOutcome {
    // 0 would never allow a single failure; treat it as 1
    let max_errors = config.max_consecutive_errors.max(1);
    let mut consecutive = 0u32;

    loop {
        if *cancel.borrow() {
            return PollOutcome::Cancelled;
        }

        // a closed channel means the handle was dropped
        let result = tokio::select! {
            biased;
            _ = cancel.changed() => return PollOutcome::Cancelled,
            r = source.fetch_status(&order_id) => r,
        };

        match result {
            Ok(report) => {
                consecutive = 0;
                let polled_at = Utc::now();
                {
                    let mut g = shared.lock();
                    g.snapshot.status = Some(report.status.clone());
                    g.snapshot.last_polled = Some(polled_at);
                    g.snapshot.last_error = None;
                    g.snapshot.order = Some(report.order.clone());
                    g.snapshot.polls += 1;
                }
                debug!(order_id = %order_id, status = %report.status, "order status");
                let terminal = report.status.is_terminal();
                let status = report.status.clone();
                let _ = events.send(PollEvent::Status {
                    status: report.status,
                    order: report.order,
                    polled_at,
                });
                if terminal {
                    info!(order_id = %order_id, status = %status, "order reached terminal status");
                    return PollOutcome::Terminal(status);
                }
            }
            Err(e) => {
                consecutive += 1;
                let message = e.to_string();
                {
                    let mut g = shared.lock();
                    g.snapshot.last_error = Some(message.clone());
                    g.snapshot.polls += 1;
                }
                warn!(order_id = %order_id, consecutive, error = %message, "status poll failed");
                let _ = events.send(PollEvent::Error {
                    message: message.clone(),
                    consecutive,
                });
                if consecutive >= max_errors {
                    warn!(order_id = %order_id, "giving up on status polling");
                    return PollOutcome::GaveUp {
                        last_error: message,
                    };
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.changed() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

/// Display form of a status: first letter capitalized, `Checking` when unknown
pub fn format_status(status: Option<&PaymentStatus>) -> String {
    let raw = match status {
        Some(s) if !s.as_str().is_empty() => s.as_str(),
        _ => return "Checking".to_string(),
    };
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Checking".to_string(),
    }
}
