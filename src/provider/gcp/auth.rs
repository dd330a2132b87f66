//! # GCP Authentication
//!
//! Bearer tokens and project discovery for the Secret Manager REST client.
//!
//! Two sources are supported:
//! - A static token (emulators, mock servers, tokens minted outside the process)
//! - The GCE metadata server (Workload Identity on GKE, Cloud Run, GCE)
//!
//! Metadata tokens are cached until shortly before they expire.

use crate::constants::TOKEN_EXPIRY_MARGIN_SECS;
use crate::provider::BackendError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: Zeroizing<String>,
    refresh_at: Instant,
}

/// Client for the GCE metadata server
pub struct MetadataServer {
    http: reqwest::Client,
    base_url: String,
    cached: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for MetadataServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataServer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MetadataServer {
    /// `host` follows the `GCE_METADATA_HOST` convention (`host[:port]`, no scheme)
    pub fn new(http: reqwest::Client, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/computeMetadata/v1")
        } else {
            format!("http://{host}/computeMetadata/v1")
        };
        Self {
            http,
            base_url,
            cached: RwLock::new(None),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await
            .map_err(|e| {
                BackendError::Unauthenticated(format!("metadata server unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unauthenticated(format!(
                "metadata server returned HTTP {status} for {path}: {body}"
            )));
        }
        Ok(response)
    }

    /// Project the workload runs in
    ///
    /// # Errors
    /// Returns `Unauthenticated` if the metadata server is unreachable or answers with an error.
    pub async fn project_id(&self) -> Result<String, BackendError> {
        let project = self
            .get("project/project-id")
            .await?
            .text()
            .await
            .map_err(|e| BackendError::Unauthenticated(format!("invalid project id: {e}")))?;
        let project = project.trim();
        if project.is_empty() {
            return Err(BackendError::Unauthenticated(
                "metadata server returned an empty project id".to_string(),
            ));
        }
        Ok(project.to_string())
    }

    /// Access token of the default service account, cached until near expiry
    ///
    /// # Errors
    /// Returns `Unauthenticated` if no token can be obtained.
    pub async fn access_token(&self) -> Result<Zeroizing<String>, BackendError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the write lock
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        debug!("Fetching access token from metadata server");
        let response: MetadataTokenResponse = self
            .get("instance/service-accounts/default/token")
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Unauthenticated(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(
            response
                .expires_in
                .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS),
        );
        let token = Zeroizing::new(response.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token)
    }
}

/// Where bearer tokens come from
pub enum TokenSource {
    Static(Zeroizing<String>),
    Metadata(MetadataServer),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(<redacted>)"),
            TokenSource::Metadata(server) => f.debug_tuple("TokenSource::Metadata").field(server).finish(),
        }
    }
}

impl TokenSource {
    /// Current bearer token
    ///
    /// # Errors
    /// Returns `Unauthenticated` if the metadata server cannot supply a token.
    pub async fn token(&self) -> Result<Zeroizing<String>, BackendError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata(server) => server.access_token().await,
        }
    }
}
