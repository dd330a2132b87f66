//! # GCP Secret Manager REST Client
//!
//! Native REST implementation of [`SecretStoreBackend`] using reqwest with rustls.
//!
//! ## Endpoints
//!
//! - `GET  /v1/projects/{project}/secrets?filter=...` - label lookup (paged)
//! - `POST /v1/projects/{project}/secrets?secretId=...` - create container
//! - `POST /v1/{secret}:addVersion` - add version
//! - `GET  /v1/{version}:access` - read version payload

pub mod requests;
pub mod responses;

use self::requests::{AddVersionRequest, CreateSecretRequest};
use self::responses::{
    classify_error, AccessSecretVersionResponse, ListSecretsResponse, SecretResource,
    SecretVersionResource,
};
use crate::config::ServiceConfig;
use crate::provider::gcp::auth::{MetadataServer, TokenSource};
use crate::provider::{
    BackendError, Container, ContainerStream, LabelFilter, SecretStoreBackend,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, Instrument};
use zeroize::Zeroizing;

/// GCP Secret Manager provider implementation
pub struct SecretManagerREST {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: TokenSource,
    page_size: u32,
}

impl std::fmt::Debug for SecretManagerREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretManagerREST")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

enum PageCursor {
    First,
    Next(String),
    Done,
}

impl SecretManagerREST {
    /// Create a new Secret Manager client
    ///
    /// Discovers the project (unless configured) and obtains a first access token
    /// so that broken credentials fail here rather than on the first request.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built, the project cannot be
    /// discovered or no access token can be obtained.
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        let project_id = match &config.project_id {
            Some(project_id) => project_id.clone(),
            None => {
                info!(
                    "No project configured, discovering from metadata server {}",
                    config.metadata_host()
                );
                MetadataServer::new(http.clone(), config.metadata_host())
                    .project_id()
                    .await
                    .context("Failed to discover GCP project id")?
            }
        };

        let tokens = match &config.access_token {
            Some(token) => {
                info!("Using static access token for GCP Secret Manager");
                TokenSource::Static(Zeroizing::new(token.clone()))
            }
            None => {
                info!("Using metadata server credentials (Workload Identity)");
                TokenSource::Metadata(MetadataServer::new(http.clone(), config.metadata_host()))
            }
        };
        tokens
            .token()
            .await
            .context("Failed to obtain GCP access token")?;

        info!(
            "GCP Secret Manager client ready: endpoint={}, project={}",
            config.endpoint(),
            project_id
        );

        Ok(Self {
            http,
            endpoint: config.endpoint().to_string(),
            project_id,
            tokens,
            page_size: config.page_size(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Parent resource for listing and creating secrets
    pub fn parent(&self) -> String {
        format!("projects/{}", self.project_id)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.endpoint, resource)
    }

    /// Render a label filter in Secret Manager list filter syntax
    ///
    /// e.g. `labels.x-secret-name="db-pass" AND labels.x-secret-stack="prod"`
    ///
    /// Values are quoted with `\` and `"` escaped, so a value can never add terms.
    pub fn render_filter(filter: &LabelFilter) -> String {
        filter
            .iter()
            .map(|(key, value)| {
                let value = value.replace('\\', "\\\\").replace('"', "\\\"");
                format!("labels.{key}=\"{value}\"")
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    BackendError::Unavailable(e.to_string())
                } else {
                    BackendError::Unexpected(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Unexpected(format!("failed to decode response: {e}")))
    }

    async fn list_page(
        &self,
        filter: &str,
        page_token: Option<&str>,
    ) -> Result<ListSecretsResponse, BackendError> {
        let mut query = vec![
            ("filter", filter.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let url = self.url(&format!("{}/secrets", self.parent()));
        self.send(self.http.get(&url).query(&query)).await
    }
}

/// Record the outcome of a REST call on its span
async fn observe<T>(
    operation: &'static str,
    resource: &str,
    call: impl std::future::Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    let span = tracing::debug_span!(
        "gcp.secretmanager.request",
        operation = operation,
        resource = resource,
        operation.success = tracing::field::Empty,
        operation.duration_ms = tracing::field::Empty,
        error.kind = tracing::field::Empty,
    );
    let span_clone = span.clone();
    let start = Instant::now();

    async move {
        let result = call.await;
        span_clone.record(
            "operation.duration_ms",
            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        span_clone.record("operation.success", result.is_ok());
        if let Err(e) = &result {
            span_clone.record("error.kind", e.as_str());
            debug!("GCP Secret Manager {} failed for {}: {}", operation, resource, e);
        }
        result
    }
    .instrument(span)
    .await
}

#[async_trait]
impl SecretStoreBackend for SecretManagerREST {
    fn provider_name(&self) -> &'static str {
        "gcp"
    }

    fn list_containers<'a>(&'a self, filter: &LabelFilter) -> ContainerStream<'a> {
        let filter = Self::render_filter(filter);
        futures::stream::unfold(PageCursor::First, move |cursor| {
            let filter = filter.clone();
            async move {
                let page_token = match cursor {
                    PageCursor::First => None,
                    PageCursor::Next(token) => Some(token),
                    PageCursor::Done => return None,
                };
                let parent = self.parent();
                let page = observe(
                    "list",
                    &parent,
                    self.list_page(&filter, page_token.as_deref()),
                )
                .await;

                match page {
                    Ok(page) => {
                        let next = match page.next_page_token {
                            Some(token) if !token.is_empty() => PageCursor::Next(token),
                            _ => PageCursor::Done,
                        };
                        let containers: Vec<Result<Container, BackendError>> =
                            page.secrets.into_iter().map(|s| Ok(s.into())).collect();
                        Some((futures::stream::iter(containers), next))
                    }
                    Err(e) => Some((futures::stream::iter(vec![Err(e)]), PageCursor::Done)),
                }
            }
        })
        .flatten()
        .boxed()
    }

    async fn create_container(
        &self,
        container_id: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Container, BackendError> {
        let parent = self.parent();
        let url = self.url(&format!("{parent}/secrets"));
        let request = self
            .http
            .post(&url)
            .query(&[("secretId", container_id)])
            .json(&CreateSecretRequest::new(labels.clone()));

        let secret: SecretResource = observe("create", &parent, self.send(request)).await?;
        Ok(secret.into())
    }

    async fn add_version(
        &self,
        container_name: &str,
        payload: &[u8],
    ) -> Result<String, BackendError> {
        let url = self.url(&format!("{container_name}:addVersion"));
        let body = AddVersionRequest::new(BASE64.encode(payload));
        let request = self.http.post(&url).json(&body);

        let version: SecretVersionResource =
            observe("add_version", container_name, self.send(request)).await?;
        Ok(version.name)
    }

    async fn access_version(
        &self,
        version_name: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        let url = self.url(&format!("{version_name}:access"));
        let request = self.http.get(&url);

        let response: AccessSecretVersionResponse =
            observe("access", version_name, self.send(request)).await?;
        BASE64
            .decode(response.payload.data.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| BackendError::Unexpected(format!("invalid payload encoding: {e}")))
    }
}
