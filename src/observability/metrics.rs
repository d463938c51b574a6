//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `controller_manager_operator_syncs_total` - Sync passes started
//! - `controller_manager_operator_sync_errors_total` - Sync passes that failed
//! - `controller_manager_operator_sync_duration_seconds` - Duration of sync passes
//! - `controller_manager_operator_queue_depth` - Keys waiting in the work queue
//! - `controller_manager_operator_rate_limiter_wait_seconds` - Time spent waiting for a sync token
//! - `controller_manager_operator_coalesced_notifications_total` - Change notifications that enqueued a resync, by kind
//! - `controller_manager_operator_observer_errors_total` - Observer failures, by observer

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SYNCS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "controller_manager_operator_syncs_total",
        "Total number of sync passes",
    )
    .expect("Failed to create SYNCS_TOTAL metric - this should never happen")
});

static SYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "controller_manager_operator_sync_errors_total",
        "Total number of failed sync passes",
    )
    .expect("Failed to create SYNC_ERRORS_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "controller_manager_operator_sync_duration_seconds",
            "Duration of sync passes in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "controller_manager_operator_queue_depth",
        "Number of keys waiting in the work queue",
    )
    .expect("Failed to create QUEUE_DEPTH metric - this should never happen")
});

static RATE_LIMITER_WAIT: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "controller_manager_operator_rate_limiter_wait_seconds",
            "Time spent waiting for a sync token in seconds",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 40.0, 80.0]),
    )
    .expect("Failed to create RATE_LIMITER_WAIT metric - this should never happen")
});

static COALESCED_NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "controller_manager_operator_coalesced_notifications_total",
            "Change notifications that enqueued a resync, by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create COALESCED_NOTIFICATIONS_TOTAL metric - this should never happen")
});

static OBSERVER_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "controller_manager_operator_observer_errors_total",
            "Observer failures, by observer",
        ),
        &["observer"],
    )
    .expect("Failed to create OBSERVER_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMITER_WAIT.clone()))?;
    REGISTRY.register(Box::new(COALESCED_NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBSERVER_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_syncs() {
    SYNCS_TOTAL.inc();
}

pub fn increment_sync_errors() {
    SYNC_ERRORS_TOTAL.inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(i64::try_from(depth).unwrap_or(i64::MAX));
}

pub fn observe_rate_limiter_wait(duration: f64) {
    RATE_LIMITER_WAIT.observe(duration);
}

pub fn increment_coalesced_notifications(kind: &str) {
    COALESCED_NOTIFICATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_observer_errors(observer: &str) {
    OBSERVER_ERRORS_TOTAL.with_label_values(&[observer]).inc();
}
