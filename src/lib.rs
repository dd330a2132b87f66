//! # Secret Manager Service
//!
//! Provider-backed secret storage: opaque values stored as immutable, versioned
//! entries and fetched back by version id.
//!
//! ## Overview
//!
//! - **Resource resolution** - logical secret names are mapped to backing-store
//!   containers through `{name, stack}` labels, created on first write and memoized
//! - **Secret service** - `put` / `access` with a small, stable error taxonomy
//! - **Providers** - Google Cloud Secret Manager (REST) and an in-memory store
//!
//! ## Usage
//!
//! ```no_run
//! use secret_manager_service::{Secret, SecretManagerSecretService, SecretService};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let service = SecretManagerSecretService::new("prod").await?;
//! let put = service.put(Some(&Secret::new("db-pass")), b"s3cr3t").await?;
//! let access = service.access(Some(&put.secret_version)).await?;
//! assert_eq!(access.value.as_slice(), b"s3cr3t");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod provider;
pub mod resolver;
pub mod secret;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ErrorCode, SecretError};
pub use provider::{BackendError, SecretStoreBackend};
pub use resolver::{ResolveError, ResourceResolver};
pub use secret::{
    Secret, SecretAccessResponse, SecretPutResponse, SecretService, SecretVersion,
    ValidationError,
};
pub use service::SecretManagerSecretService;
