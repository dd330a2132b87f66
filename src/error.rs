//! # Secret Service Error Types
//!
//! Caller-facing error taxonomy. Every error returned by the secret service is a
//! [`SecretError`] carrying the originating operation, an [`ErrorCode`], a human
//! readable message, a structured context payload and (usually) the underlying cause.
//!
//! The code is deliberately coarse: read-path failures all surface as
//! [`ErrorCode::Internal`]. The precise cause stays reachable through
//! [`std::error::Error::source`] and [`SecretError::is_not_found`].

use crate::provider::BackendError;
use crate::resolver::ResolveError;
use serde_json::Value;
use thiserror::Error;

/// Boxed underlying cause of a [`SecretError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error kinds exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed input: missing secret, blank name, blank value or blank version
    InvalidArgument,
    /// Requested resource does not exist
    NotFound,
    /// Any backing-store failure
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by secret service operations
#[derive(Debug, Error)]
#[error("{operation}: {code} - {message}")]
pub struct SecretError {
    operation: &'static str,
    code: ErrorCode,
    message: String,
    context: Value,
    #[source]
    source: Option<BoxError>,
}

impl SecretError {
    /// Operation that produced the error, e.g. `SecretManagerSecretService.Put`
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured context (the offending secret or version, never the value)
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Whether the root cause is a missing container or version
    ///
    /// Walks the source chain, so a `NotFound` folded into `Internal` is still
    /// distinguishable from transport or permission failures.
    pub fn is_not_found(&self) -> bool {
        if self.code == ErrorCode::NotFound {
            return true;
        }
        let mut cause = self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static));
        while let Some(err) = cause {
            if let Some(backend) = err.downcast_ref::<BackendError>() {
                return backend.is_not_found();
            }
            if let Some(resolve) = err.downcast_ref::<ResolveError>() {
                return resolve.is_not_found();
            }
            cause = err.source();
        }
        false
    }

    /// Underlying backend error, if the failure came from the backing store
    pub fn backend_error(&self) -> Option<&BackendError> {
        let mut cause = self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static));
        while let Some(err) = cause {
            if let Some(backend) = err.downcast_ref::<BackendError>() {
                return Some(backend);
            }
            if let Some(ResolveError::Backend(backend)) = err.downcast_ref::<ResolveError>() {
                return Some(backend);
            }
            cause = err.source();
        }
        None
    }
}

/// Error factory bound to one operation and its context payload
#[derive(Debug, Clone)]
pub struct ErrorScope {
    operation: &'static str,
    context: Value,
}

impl ErrorScope {
    pub fn new(operation: &'static str, context: Value) -> Self {
        Self { operation, context }
    }

    /// Build an error wrapping `source`
    pub fn error<E>(&self, code: ErrorCode, message: impl Into<String>, source: E) -> SecretError
    where
        E: Into<BoxError>,
    {
        SecretError {
            operation: self.operation,
            code,
            message: message.into(),
            context: self.context.clone(),
            source: Some(source.into()),
        }
    }

    /// Build an error with no underlying cause
    pub fn bare(&self, code: ErrorCode, message: impl Into<String>) -> SecretError {
        SecretError {
            operation: self.operation,
            code,
            message: message.into(),
            context: self.context.clone(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error as _;

    #[test]
    fn test_display_format() {
        let scope = ErrorScope::new("SecretManagerSecretService.Put", json!({"secret": {"name": "db"}}));
        let err = scope.bare(ErrorCode::InvalidArgument, "invalid secret");
        assert_eq!(
            err.to_string(),
            "SecretManagerSecretService.Put: INVALID_ARGUMENT - invalid secret"
        );
        assert_eq!(err.context()["secret"]["name"], "db");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_not_found_survives_internal_code() {
        let scope = ErrorScope::new("SecretManagerSecretService.Access", Value::Null);
        let err = scope.error(
            ErrorCode::Internal,
            "failed to access secret version",
            BackendError::NotFound("projects/p/secrets/s/versions/3".into()),
        );
        assert_eq!(err.code(), ErrorCode::Internal);
        assert!(err.is_not_found());
        assert!(matches!(err.backend_error(), Some(BackendError::NotFound(_))));
    }

    #[test]
    fn test_transport_failure_is_not_not_found() {
        let scope = ErrorScope::new("SecretManagerSecretService.Access", Value::Null);
        let err = scope.error(
            ErrorCode::Internal,
            "failed to access secret version",
            BackendError::Unavailable("connection refused".into()),
        );
        assert!(!err.is_not_found());
        assert!(err.backend_error().is_some_and(BackendError::is_transient));
    }

    #[test]
    fn test_resolve_not_found_detected() {
        let scope = ErrorScope::new("SecretManagerSecretService.Access", Value::Null);
        let err = scope.error(
            ErrorCode::Internal,
            "failed to resolve secret",
            ResolveError::NotFound {
                name: "missing".into(),
            },
        );
        assert!(err.is_not_found());
        assert!(err.backend_error().is_none());
    }
}
