//! # Observability
//!
//! Tracing setup and Prometheus metrics.
//!
//! ## Sub-modules
//!
//! - `metrics` - Operation, cache and provider error metrics

pub mod metrics;

use tracing::warn;

/// Install a `fmt` tracing subscriber filtered by `RUST_LOG`
///
/// Falls back to `secret_manager_service=info`. If the embedding process already
/// installed a subscriber, that one is kept.
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| crate::constants::DEFAULT_LOG_FILTER.into()),
        )
        .try_init()
    {
        warn!("Tracing subscriber already initialized, keeping existing one: {}", e);
    }
}
