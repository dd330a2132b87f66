//! # Response Types
//!
//! GCP Secret Manager REST API response structures, plus the shared
//! payload/replication types also used in requests.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::provider::{BackendError, Container};

/// Replication policy of a secret
#[derive(Debug, Serialize, Deserialize)]
pub struct Replication {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic: Option<AutomaticReplication>,
}

/// Let Google choose replica locations
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "must serialize as an empty JSON object, not null"
)]
#[derive(Debug, Serialize, Deserialize)]
pub struct AutomaticReplication {}

/// Secret payload, base64-encoded on the wire
///
/// Zeroed on drop and redacted from `Debug`.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretPayload {
    pub data: String,
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPayload")
            .field("data", &"<redacted>")
            .finish()
    }
}

/// Secret (container) resource
#[derive(Debug, Deserialize)]
pub struct SecretResource {
    /// `projects/{project}/secrets/{secret}`
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl From<SecretResource> for Container {
    fn from(secret: SecretResource) -> Self {
        Container {
            name: secret.name,
            labels: secret.labels,
        }
    }
}

/// Response of `GET /v1/projects/{project}/secrets`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSecretsResponse {
    #[serde(default)]
    pub secrets: Vec<SecretResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Secret version resource, returned by `:addVersion`
#[derive(Debug, Deserialize)]
pub struct SecretVersionResource {
    /// `projects/{project}/secrets/{secret}/versions/{version}`
    pub name: String,
}

/// Response of `GET /v1/{version}:access`
#[derive(Debug, Deserialize)]
pub struct AccessSecretVersionResponse {
    #[serde(default)]
    pub name: String,
    pub payload: SecretPayload,
}

/// GCP error envelope
///
/// Format: `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
/// Reference: https://cloud.google.com/apis/design/errors
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Map a failed HTTP response to a [`BackendError`]
///
/// The canonical `status` string wins; the HTTP status code is the fallback for
/// bodies that are not GCP error envelopes (proxies, load balancers).
pub fn classify_error(http_status: StatusCode, body: &str) -> BackendError {
    let (status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), body.trim().to_string()),
    };
    let message = if message.is_empty() {
        format!("HTTP {http_status}")
    } else {
        message
    };

    match status.as_str() {
        "NOT_FOUND" => BackendError::NotFound(message),
        "PERMISSION_DENIED" => BackendError::PermissionDenied(message),
        "UNAUTHENTICATED" => BackendError::Unauthenticated(message),
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "ALREADY_EXISTS" | "OUT_OF_RANGE" => {
            BackendError::InvalidRequest(message)
        }
        "RESOURCE_EXHAUSTED" => BackendError::ResourceExhausted(message),
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" => BackendError::Unavailable(message),
        _ => match http_status {
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            StatusCode::FORBIDDEN => BackendError::PermissionDenied(message),
            StatusCode::UNAUTHORIZED => BackendError::Unauthenticated(message),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT => BackendError::InvalidRequest(message),
            StatusCode::TOO_MANY_REQUESTS => BackendError::ResourceExhausted(message),
            StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY => BackendError::Unavailable(message),
            _ => BackendError::Unexpected(format!("HTTP {http_status}: {message}")),
        },
    }
}
