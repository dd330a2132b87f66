//! # GCP Provider
//!
//! Google Cloud Secret Manager backend.
//!
//! Uses a native REST implementation that:
//! - Works directly with HTTP mock servers and emulators
//! - Uses reqwest with rustls (no OpenSSL dependencies)
//! - Authenticates via the metadata server or a static token

pub mod auth;
mod client;

pub use client::SecretManagerREST;

use crate::config::ServiceConfig;
use crate::provider::SecretStoreBackend;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Create a GCP Secret Manager backend
///
/// # Errors
/// Returns an error if credential/project discovery or client construction fails.
pub async fn create_gcp_backend(config: &ServiceConfig) -> Result<Arc<dyn SecretStoreBackend>> {
    info!("Using GCP REST client (native implementation)");
    Ok(Arc::new(SecretManagerREST::new(config).await?))
}
