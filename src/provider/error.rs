//! # Backend Error Types
//!
//! Provider-agnostic classification of backing-store failures.

use thiserror::Error;

/// Failure reported by a [`SecretStoreBackend`](super::SecretStoreBackend)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Requested container or version does not exist (permanent)
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Caller identity lacks permission (permanent until IAM changes)
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Credentials missing, expired or rejected
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Backend rejected the request shape (permanent)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Quota or rate limit hit (transient)
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Network failure, timeout or backend outage (transient)
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Anything else, including undecodable responses
    #[error("unexpected backend response: {0}")]
    Unexpected(String),
}

impl BackendError {
    /// Determine if this error is transient (a retry may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::ResourceExhausted(_) | BackendError::Unavailable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendError::NotFound(_) => "not_found",
            BackendError::PermissionDenied(_) => "permission_denied",
            BackendError::Unauthenticated(_) => "unauthenticated",
            BackendError::InvalidRequest(_) => "invalid_request",
            BackendError::ResourceExhausted(_) => "resource_exhausted",
            BackendError::Unavailable(_) => "unavailable",
            BackendError::Unexpected(_) => "unexpected",
        }
    }
}
