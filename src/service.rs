//! # Secret Manager Secret Service
//!
//! [`SecretService`] implementation on top of a [`SecretStoreBackend`].
//!
//! - `put` validates, ensures the container exists (creating it on first write),
//!   appends a version and returns the provider-assigned version id
//! - `access` validates, resolves the container (never creating it) and fetches
//!   the raw payload of the requested version
//!
//! Backend failures are wrapped into [`SecretError`] with the operation name and
//! the offending secret/version as context. Nothing is retried here.

use crate::config::{load_config, ServiceConfig};
use crate::error::{ErrorCode, ErrorScope, SecretError};
use crate::observability::metrics;
use crate::provider::{gcp, SecretStoreBackend};
use crate::resolver::{version_id_from_name, ResolveError, ResourceResolver};
use crate::secret::{
    validate_new_secret, Secret, SecretAccessResponse, SecretPutResponse, SecretService,
    SecretVersion, ValidationError,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field::Empty, info_span, warn, Instrument, Span};

const PUT_OPERATION: &str = "SecretManagerSecretService.Put";
const ACCESS_OPERATION: &str = "SecretManagerSecretService.Access";

/// Secret service backed by a label-indexed secret store
#[derive(Debug)]
pub struct SecretManagerSecretService {
    resolver: ResourceResolver,
}

impl SecretManagerSecretService {
    /// Create a service for `stack` backed by GCP Secret Manager
    ///
    /// Remaining settings come from the environment (see [`load_config`]).
    /// Credentials and the project are discovered once, here.
    ///
    /// # Errors
    /// Returns an error if credential/project discovery or client construction fails.
    pub async fn new(stack: impl Into<String>) -> Result<Self> {
        let config = ServiceConfig {
            stack: stack.into(),
            ..load_config()
        };
        Self::from_config(&config).await
    }

    /// Create a service backed by GCP Secret Manager from explicit configuration
    ///
    /// # Errors
    /// Returns an error if credential/project discovery or client construction fails.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let backend = gcp::create_gcp_backend(config)
            .await
            .context("Failed to create GCP Secret Manager backend")?;
        Ok(Self::with_backend(backend, config.stack.clone()))
    }

    /// Create a service over any backend
    pub fn with_backend(backend: Arc<dyn SecretStoreBackend>, stack: impl Into<String>) -> Self {
        Self {
            resolver: ResourceResolver::new(backend, stack),
        }
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    fn backend(&self) -> &dyn SecretStoreBackend {
        self.resolver.backend().as_ref()
    }

    fn backend_failure(&self, kind: &'static str) {
        metrics::increment_provider_errors(self.backend().provider_name(), kind);
    }

    async fn put_inner(
        &self,
        scope: &ErrorScope,
        secret: Option<&Secret>,
        value: &[u8],
    ) -> Result<SecretPutResponse, SecretError> {
        let secret = validate_new_secret(secret, value)
            .map_err(|e| scope.error(ErrorCode::InvalidArgument, "invalid secret", e))?;

        let container = self
            .resolver
            .resolve_or_create(&secret.name)
            .await
            .map_err(|e| match e {
                ResolveError::InvalidArgument(_) => {
                    scope.error(ErrorCode::InvalidArgument, "invalid secret", e)
                }
                _ => scope.error(
                    ErrorCode::Internal,
                    "error ensuring secret container exists",
                    e,
                ),
            })?;

        let version_name = self
            .backend()
            .add_version(&container, value)
            .await
            .map_err(|e| {
                self.backend_failure(e.as_str());
                scope.error(ErrorCode::Internal, "failed to add new secret version", e)
            })?;

        let version = version_id_from_name(&version_name).ok_or_else(|| {
            scope.bare(
                ErrorCode::Internal,
                format!("backend returned malformed version name: {version_name}"),
            )
        })?;
        debug!("Added version {} to {}", version, container);

        Ok(SecretPutResponse {
            secret_version: SecretVersion::new(secret.name.clone(), version),
        })
    }

    async fn access_inner(
        &self,
        scope: &ErrorScope,
        secret_version: Option<&SecretVersion>,
    ) -> Result<SecretAccessResponse, SecretError> {
        let secret_version = secret_version.ok_or_else(|| {
            scope.error(
                ErrorCode::InvalidArgument,
                "invalid secret version",
                ValidationError::MissingVersion,
            )
        })?;

        let reference = self
            .resolver
            .build_version_reference(&secret_version.secret.name, &secret_version.version)
            .await
            .map_err(|e| match e {
                ResolveError::InvalidArgument(_) => {
                    scope.error(ErrorCode::InvalidArgument, "invalid secret version", e)
                }
                // Missing containers fold into Internal; the cause stays in the source chain
                _ => scope.error(ErrorCode::Internal, "failed to resolve secret", e),
            })?;

        let value = self
            .backend()
            .access_version(&reference)
            .await
            .map_err(|e| {
                self.backend_failure(e.as_str());
                scope.error(ErrorCode::Internal, "failed to access secret version", e)
            })?;

        Ok(SecretAccessResponse {
            secret_version: secret_version.clone(),
            value,
        })
    }
}

/// Record outcome on the operation span, metrics and logs
fn finish<T>(span: &Span, operation: &str, start: Instant, result: &Result<T, SecretError>) {
    let elapsed = start.elapsed();
    span.record(
        "operation.duration_ms",
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    );
    span.record("operation.success", result.is_ok());
    metrics::record_operation(operation, result.is_ok(), elapsed.as_secs_f64());

    if let Err(e) = result {
        span.record("error.code", e.code().as_str());
        match e.code() {
            ErrorCode::InvalidArgument => debug!(parent: span, "{}", e),
            _ => warn!(parent: span, error = ?e, "{}", e),
        }
    }
}

#[async_trait]
impl SecretService for SecretManagerSecretService {
    async fn put(
        &self,
        secret: Option<&Secret>,
        value: &[u8],
    ) -> Result<SecretPutResponse, SecretError> {
        let scope = ErrorScope::new(PUT_OPERATION, json!({ "secret": secret }));
        let span = info_span!(
            "secret.put",
            secret.name = secret.map_or("", |s| s.name.as_str()),
            secret.stack = %self.resolver.stack(),
            provider = self.backend().provider_name(),
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.code = Empty,
        );
        let start = Instant::now();

        let result = self
            .put_inner(&scope, secret, value)
            .instrument(span.clone())
            .await;
        finish(&span, "put", start, &result);
        result
    }

    async fn access(
        &self,
        secret_version: Option<&SecretVersion>,
    ) -> Result<SecretAccessResponse, SecretError> {
        let scope = ErrorScope::new(ACCESS_OPERATION, json!({ "version": secret_version }));
        let span = info_span!(
            "secret.access",
            secret.name = secret_version.map_or("", |sv| sv.secret.name.as_str()),
            secret.version = secret_version.map_or("", |sv| sv.version.as_str()),
            secret.stack = %self.resolver.stack(),
            provider = self.backend().provider_name(),
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.code = Empty,
        );
        let start = Instant::now();

        let result = self
            .access_inner(&scope, secret_version)
            .instrument(span.clone())
            .await;
        finish(&span, "access", start, &result);
        result
    }
}
