//! # Metrics
//!
//! Prometheus metrics for secret operations, resolution cache behaviour and
//! provider errors. Metrics live in a crate-owned registry; embedding services
//! expose them via [`gather_text`].

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

/// Crate Prometheus metrics registry
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_service_operations_total",
            "Total number of secret operations by outcome",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "secret_service_operation_duration_seconds",
            "Duration of secret operations in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static PROVIDER_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_service_provider_errors_total",
            "Total number of backing-store errors by provider and kind",
        ),
        &["provider", "kind"],
    )
    .expect("Failed to create PROVIDER_ERRORS_TOTAL metric - this should never happen")
});

static RESOLUTION_CACHE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_service_resolution_cache_total",
            "Resolution cache lookups by result (hit/miss)",
        ),
        &["result"],
    )
    .expect("Failed to create RESOLUTION_CACHE_TOTAL metric - this should never happen")
});

static CONTAINERS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_service_containers_created_total",
        "Total number of secret containers created on first write",
    )
    .expect("Failed to create CONTAINERS_CREATED_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry
///
/// Prometheus metrics are internally reference counted, so cloning them into the
/// registry is cheap.
///
/// # Errors
/// Returns an error if any metric is already registered (e.g. on a second call).
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOLUTION_CACHE_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONTAINERS_CREATED_TOTAL.clone()))?;
    Ok(())
}

/// Render every registered metric in the Prometheus text format
///
/// # Errors
/// Returns an error if encoding fails or the output is not valid UTF-8.
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_operation(operation: &str, success: bool, duration_secs: f64) {
    let result = if success { "success" } else { "error" };
    OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn increment_provider_errors(provider: &str, kind: &str) {
    PROVIDER_ERRORS_TOTAL
        .with_label_values(&[provider, kind])
        .inc();
}

pub fn record_cache_lookup(hit: bool) {
    RESOLUTION_CACHE_TOTAL
        .with_label_values(&[if hit { "hit" } else { "miss" }])
        .inc();
}

pub fn increment_containers_created() {
    CONTAINERS_CREATED_TOTAL.inc();
}
