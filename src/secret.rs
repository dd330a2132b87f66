//! # Secret Types
//!
//! Caller-facing request/response types and the [`SecretService`] contract.

use crate::constants::MAX_LABEL_VALUE_LEN;
use crate::error::SecretError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Logical secret, identified by name within the service's stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
}

impl Secret {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One immutable version of a secret
///
/// `version` is provider-assigned and opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretVersion {
    pub secret: Secret,
    pub version: String,
}

impl SecretVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(name),
            version: version.into(),
        }
    }

    /// Reference to the newest version of `name`
    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, crate::constants::LATEST_VERSION_ALIAS)
    }
}

/// Result of [`SecretService::put`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPutResponse {
    pub secret_version: SecretVersion,
}

/// Result of [`SecretService::access`]
///
/// The value is zeroed on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct SecretAccessResponse {
    pub secret_version: SecretVersion,
    pub value: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SecretAccessResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretAccessResponse")
            .field("secret_version", &self.secret_version)
            .field("value", &format_args!("<{} bytes>", self.value.len()))
            .finish()
    }
}

/// Input validation failures, detected before any backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("provide non-nil secret")]
    MissingSecret,
    #[error("provide non-blank secret name")]
    BlankName,
    #[error("provide non-blank secret value")]
    BlankValue,
    #[error("provide non-nil secret version")]
    MissingVersion,
    #[error("provide non-blank version")]
    BlankVersion,
    #[error("secret name must be at most 63 lowercase letters, digits, '_' or '-'")]
    InvalidName,
    #[error("stack must be at most 63 lowercase letters, digits, '_' or '-'")]
    InvalidStack,
    #[error("version must be a single path segment")]
    MalformedVersion,
}

/// Whether `value` can be stored as a backing-store label value
///
/// Lowercase ASCII letters, digits, `_` and `-`, at most 63 characters.
pub fn is_label_value(value: &str) -> bool {
    value.len() <= MAX_LABEL_VALUE_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Whether `version` is usable as the last segment of a version resource name
pub fn is_version_segment(version: &str) -> bool {
    !version.is_empty()
        && version != "."
        && version != ".."
        && !version
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#' | '%' | ':') || c.is_whitespace() || c.is_control())
}

/// Validate the arguments of a `put` call
pub fn validate_new_secret<'a>(
    secret: Option<&'a Secret>,
    value: &[u8],
) -> Result<&'a Secret, ValidationError> {
    let secret = secret.ok_or(ValidationError::MissingSecret)?;
    if secret.name.is_empty() {
        return Err(ValidationError::BlankName);
    }
    if !is_label_value(&secret.name) {
        return Err(ValidationError::InvalidName);
    }
    if value.is_empty() {
        return Err(ValidationError::BlankValue);
    }
    Ok(secret)
}

/// Uniform secret storage contract
///
/// Implementations store opaque values as immutable versions and fetch a specific
/// version back. Callers never see which backing store is in use.
#[async_trait]
pub trait SecretService: Send + Sync {
    /// Store `value` as a new version of `secret`, creating the secret on first write
    async fn put(
        &self,
        secret: Option<&Secret>,
        value: &[u8],
    ) -> Result<SecretPutResponse, SecretError>;

    /// Fetch the payload of one version
    async fn access(
        &self,
        secret_version: Option<&SecretVersion>,
    ) -> Result<SecretAccessResponse, SecretError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_new_secret() {
        let secret = Secret::new("db-pass");
        assert_eq!(
            validate_new_secret(None, b"v"),
            Err(ValidationError::MissingSecret)
        );
        assert_eq!(
            validate_new_secret(Some(&Secret::new("")), b"v"),
            Err(ValidationError::BlankName)
        );
        assert_eq!(
            validate_new_secret(Some(&secret), b""),
            Err(ValidationError::BlankValue)
        );
        assert_eq!(validate_new_secret(Some(&secret), b"v"), Ok(&secret));
    }

    #[test]
    fn test_validate_new_secret_rejects_unlabelable_names() {
        let too_long = "a".repeat(64);
        for name in ["DB_PASSWORD", "db.pass", "db pass", "db-pass AND x", too_long.as_str()] {
            assert_eq!(
                validate_new_secret(Some(&Secret::new(name)), b"v"),
                Err(ValidationError::InvalidName),
                "{name}"
            );
        }
        let longest = Secret::new("a".repeat(63));
        assert!(validate_new_secret(Some(&longest), b"v").is_ok());
    }

    #[test]
    fn test_version_segment() {
        for version in ["1", "42", "latest"] {
            assert!(is_version_segment(version), "{version}");
        }
        for version in ["", ".", "..", "1/../x", "1?x", "1#x", "%2e%2e", "1:access", "1 2"] {
            assert!(!is_version_segment(version), "{version}");
        }
    }

    #[test]
    fn test_access_response_debug_hides_value() {
        let response = SecretAccessResponse {
            secret_version: SecretVersion::new("db-pass", "1"),
            value: Zeroizing::new(b"s3cr3t".to_vec()),
        };
        let rendered = format!("{response:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<6 bytes>"));
    }

    #[test]
    fn test_latest_alias() {
        let latest = SecretVersion::latest("api-key");
        assert_eq!(latest.secret.name, "api-key");
        assert_eq!(latest.version, "latest");
    }
}
