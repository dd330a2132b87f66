//! # Request Types
//!
//! GCP Secret Manager REST API request structures.
//!
//! These structs represent the JSON payloads sent to the GCP Secret Manager REST
//! API v1, as documented at:
//! https://cloud.google.com/secret-manager/docs/reference/rest

use serde::Serialize;
use std::collections::BTreeMap;

use super::responses::{AutomaticReplication, Replication, SecretPayload};

/// Request body for creating a new secret
///
/// Used in `POST /v1/projects/{project}/secrets?secretId={id}`.
/// This creates the secret container only; values are added with `AddVersionRequest`.
///
/// API Reference: https://cloud.google.com/secret-manager/docs/reference/rest/v1/projects.secrets/create
#[derive(Debug, Serialize)]
pub struct CreateSecretRequest {
    /// Replication configuration for the secret
    pub replication: Replication,
    /// Labels used to find the secret again by logical name and stack
    pub labels: BTreeMap<String, String>,
}

impl CreateSecretRequest {
    /// Create a new request with automatic replication
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self {
            replication: Replication {
                automatic: Some(AutomaticReplication {}),
            },
            labels,
        }
    }
}

/// Request body for adding a new version to an existing secret
///
/// Used in `POST /v1/projects/{project}/secrets/{secret}:addVersion`.
///
/// **Important**: The payload data must be base64-encoded before sending.
///
/// API Reference: https://cloud.google.com/secret-manager/docs/reference/rest/v1/projects.secrets/addVersion
#[derive(Debug, Serialize)]
pub struct AddVersionRequest {
    /// The secret payload containing the base64-encoded secret value
    pub payload: SecretPayload,
}

impl AddVersionRequest {
    /// Create a new request with base64-encoded data
    pub fn new(data: String) -> Self {
        Self {
            payload: SecretPayload { data },
        }
    }
}
