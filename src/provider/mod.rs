//! # Provider Module
//!
//! Backing-store capability consumed by the resolver and the secret service.
//!
//! A backend only has to offer three things: list containers by label filter,
//! create a container, and add/access versions by fully-qualified resource name.
//! Everything provider-specific (auth, payload encoding, filter syntax) stays
//! behind [`SecretStoreBackend`].
//!
//! ## Implementations
//!
//! - [`gcp::SecretManagerREST`] - Google Cloud Secret Manager over REST
//! - [`memory::InMemoryBackend`] - process-local store for tests and local development

pub mod error;
pub mod gcp;
pub mod memory;

pub use error::BackendError;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Container resource as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Fully-qualified resource name, e.g. `projects/123/secrets/db-pass-1a2b3c4d`
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Conjunction of `label == value` constraints
///
/// Modelled as data so every backend can render it in its own query language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    labels: BTreeMap<String, String>,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether `labels` satisfies every constraint
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }

    /// Labels a new container must carry to be found by this filter
    pub fn to_labels(&self) -> BTreeMap<String, String> {
        self.labels.clone()
    }
}

/// Lazy, finite sequence of containers produced by a listing
pub type ContainerStream<'a> = BoxStream<'a, Result<Container, BackendError>>;

/// Backing-store capability
#[async_trait]
pub trait SecretStoreBackend: Send + Sync + std::fmt::Debug {
    /// Short provider name for logs and metrics, e.g. `"gcp"`
    fn provider_name(&self) -> &'static str;

    /// List containers whose labels match `filter`
    ///
    /// Pages are fetched on demand; consumers that only need the first match
    /// never pay for the rest of the listing.
    fn list_containers<'a>(&'a self, filter: &LabelFilter) -> ContainerStream<'a>;

    /// Create a container with the given provider id and labels
    async fn create_container(
        &self,
        container_id: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Container, BackendError>;

    /// Append a version to `container_name`, returning the version's resource name
    async fn add_version(&self, container_name: &str, payload: &[u8])
        -> Result<String, BackendError>;

    /// Fetch the payload bound to a fully-qualified version name
    async fn access_version(&self, version_name: &str) -> Result<Zeroizing<Vec<u8>>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_filter_matches_all_constraints() {
        let filter = LabelFilter::new()
            .with("x-secret-name", "db-pass")
            .with("x-secret-stack", "prod");

        let mut labels = filter.to_labels();
        assert!(filter.matches(&labels));

        labels.insert("extra".to_string(), "ignored".to_string());
        assert!(filter.matches(&labels));

        labels.insert("x-secret-stack".to_string(), "dev".to_string());
        assert!(!filter.matches(&labels));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(LabelFilter::new().matches(&BTreeMap::new()));
    }
}
