//! Prometheus collectors for the proxy.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

pub static PROM_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static PROM_UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "checkout_upstream_requests_total",
            "Commerce API calls by operation and outcome",
        ),
        &["op", "outcome"],
    )
    .expect("create upstream counter");
    // ignore error if already registered
    let _ = PROM_REGISTRY.register(Box::new(c.clone()));
    c
});

pub static PROM_UPSTREAM_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new(
            "checkout_upstream_latency_seconds",
            "Commerce API round-trip latency",
        ),
        &["op"],
    )
    .expect("create upstream histogram");
    let _ = PROM_REGISTRY.register(Box::new(h.clone()));
    h
});

pub static PROM_VALIDATION_REJECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "checkout_validation_rejects_total",
            "Requests rejected with 400 before reaching the commerce API",
        ),
        &["endpoint"],
    )
    .expect("create validation counter");
    let _ = PROM_REGISTRY.register(Box::new(c.clone()));
    c
});

pub fn observe_upstream(op: &str, outcome: &str, elapsed: Duration) {
    PROM_UPSTREAM_REQUESTS
        .with_label_values(&[op, outcome])
        .inc();
    PROM_UPSTREAM_LATENCY
        .with_label_values(&[op])
        .observe(elapsed.as_secs_f64());
}

pub fn validation_reject(endpoint: &str) {
    PROM_VALIDATION_REJECTS.with_label_values(&[endpoint]).inc();
}

/// Text exposition of every registered collector
pub fn render() -> String {
    // touch lazies so families show up before the first request
    Lazy::force(&PROM_UPSTREAM_REQUESTS);
    Lazy::force(&PROM_UPSTREAM_LATENCY);
    Lazy::force(&PROM_VALIDATION_REJECTS);

    let encoder = TextEncoder::new();
    let metric_families = PROM_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8_lossy(&buffer).into_owned()
}
