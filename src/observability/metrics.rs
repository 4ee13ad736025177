//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `external_secrets_reconciliations_total` - Total number of reconcile attempts
//! - `external_secrets_reconciliation_errors_total` - Reconcile errors by error kind
//! - `external_secrets_reconciliation_duration_seconds` - Duration of reconcile attempts
//! - `external_secrets_provider_fetches_total` - Backend reads by provider
//! - `external_secrets_provider_fetch_duration_seconds` - Duration of backend reads by provider
//! - `external_secrets_provider_errors_total` - Backend read errors by provider
//! - `external_secrets_target_writes_total` - Target Secret writes by outcome (created, updated, unchanged)
//! - `external_secrets_duration_parsing_errors_total` - Invalid `refreshInterval` values

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "external_secrets_reconciliations_total",
        "Total number of reconcile attempts",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "external_secrets_reconciliation_errors_total",
            "Total number of reconcile errors by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "external_secrets_reconciliation_duration_seconds",
            "Duration of reconcile attempts in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PROVIDER_FETCHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "external_secrets_provider_fetches_total",
            "Total number of backend reads by provider type",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_FETCHES_TOTAL metric - this should never happen")
});

static PROVIDER_FETCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "external_secrets_provider_fetch_duration_seconds",
            "Duration of backend reads in seconds by provider type",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_FETCH_DURATION metric - this should never happen")
});

static PROVIDER_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "external_secrets_provider_errors_total",
            "Total number of backend read errors by provider type",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_ERRORS_TOTAL metric - this should never happen")
});

static TARGET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "external_secrets_target_writes_total",
            "Total number of target Secret writes by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create TARGET_WRITES_TOTAL metric - this should never happen")
});

static DURATION_PARSING_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "external_secrets_duration_parsing_errors_total",
        "Total number of refreshInterval parsing failures",
    )
    .expect("Failed to create DURATION_PARSING_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the shared registry
///
/// Safe to call more than once; collectors that are already registered are skipped.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_ERRORS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(PROVIDER_FETCHES_TOTAL.clone()),
        Box::new(PROVIDER_FETCH_DURATION.clone()),
        Box::new(PROVIDER_ERRORS_TOTAL.clone()),
        Box::new(TARGET_WRITES_TOTAL.clone()),
        Box::new(DURATION_PARSING_ERRORS_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

/// Count a reconcile error under its error kind (e.g. "KeyNotFound")
pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record one successful backend read
pub fn record_provider_fetch(provider: &str, duration: f64) {
    PROVIDER_FETCHES_TOTAL.with_label_values(&[provider]).inc();
    PROVIDER_FETCH_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

pub fn increment_provider_errors(provider: &str) {
    PROVIDER_ERRORS_TOTAL.with_label_values(&[provider]).inc();
}

/// Count a target write by outcome ("created", "updated", "unchanged")
pub fn increment_target_writes(outcome: &str) {
    TARGET_WRITES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_duration_parsing_errors() {
    DURATION_PARSING_ERRORS_TOTAL.inc();
}
