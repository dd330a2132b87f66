//! # Secret Service Configuration
//!
//! Backend and scoping settings loaded from environment variables.

use super::{env_var_or_default, first_env_var};
use std::time::Duration;

/// Secret service configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Clone, Default)]
pub struct ServiceConfig {
    /// Deployment/stack identifier used to scope every secret lookup
    pub stack: String,
    /// GCP project id
    /// When `None` the project is discovered from the metadata server
    pub project_id: Option<String>,
    /// Secret Manager REST endpoint (override for emulators and mock servers)
    pub endpoint: Option<String>,
    /// GCE metadata server host
    pub metadata_host: Option<String>,
    /// Static bearer token
    /// When set, the metadata server is never asked for tokens
    pub access_token: Option<String>,
    /// HTTP request timeout (seconds)
    pub request_timeout_secs: Option<u64>,
    /// Page size used when listing containers
    pub page_size: Option<u32>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("stack", &self.stack)
            .field("project_id", &self.project_id)
            .field("endpoint", &self.endpoint)
            .field("metadata_host", &self.metadata_host)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::{DEFAULT_LIST_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS};
        Self {
            stack: std::env::var("SECRET_SERVICE_STACK").unwrap_or_default(),
            project_id: first_env_var(&["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT"]),
            endpoint: first_env_var(&["SECRET_MANAGER_ENDPOINT"]),
            metadata_host: first_env_var(&["GCE_METADATA_HOST"]),
            access_token: first_env_var(&["SECRET_MANAGER_ACCESS_TOKEN"]),
            request_timeout_secs: Some(env_var_or_default(
                "SECRET_MANAGER_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            page_size: Some(env_var_or_default(
                "SECRET_MANAGER_PAGE_SIZE",
                DEFAULT_LIST_PAGE_SIZE,
            )),
        }
    }

    /// Configuration for the given stack with every other setting defaulted
    pub fn for_stack(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_SECRET_MANAGER_ENDPOINT)
            .trim_end_matches('/')
    }

    pub fn metadata_host(&self) -> &str {
        self.metadata_host
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_METADATA_HOST)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .filter(|size| *size > 0)
            .unwrap_or(crate::constants::DEFAULT_LIST_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::for_stack("prod");
        assert_eq!(config.stack, "prod");
        assert_eq!(config.endpoint(), "https://secretmanager.googleapis.com");
        assert_eq!(config.metadata_host(), "metadata.google.internal");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.page_size(), 25);
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let config = ServiceConfig {
            endpoint: Some("http://localhost:1234/".to_string()),
            ..ServiceConfig::default()
        };
        assert_eq!(config.endpoint(), "http://localhost:1234");
    }

    #[test]
    fn test_zero_page_size_falls_back_to_default() {
        let config = ServiceConfig {
            page_size: Some(0),
            ..ServiceConfig::default()
        };
        assert_eq!(config.page_size(), 25);
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let config = ServiceConfig {
            access_token: Some("ya29.very-secret".to_string()),
            ..ServiceConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ya29"));
        assert!(rendered.contains("<redacted>"));
    }
}
