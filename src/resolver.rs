//! # Resource Resolver
//!
//! Maps logical secret names to backing-store container resources.
//!
//! Containers are found through their labels (`x-secret-name`, `x-secret-stack`),
//! never through their provider id, so the same logical name in two stacks maps
//! to two different containers. Successful resolutions are memoized per resolver;
//! the cache is an accelerator only and a miss always falls back to a listing.
//!
//! ## Creation Races
//!
//! Concurrent first writes of one name inside a process are single-flighted by a
//! per-name lock. Two *processes* can still both list nothing and both create a
//! container, because list-then-create is not atomic in the backing store. Later
//! lookups then settle on whichever container the backend lists first.

use crate::constants::{
    CONTAINER_ID_SUFFIX_LEN, LABEL_SECRET_NAME, LABEL_SECRET_STACK, MAX_CONTAINER_ID_LEN,
    VERSIONS_SEGMENT,
};
use crate::observability::metrics;
use crate::provider::{BackendError, LabelFilter, SecretStoreBackend};
use crate::secret::{is_label_value, is_version_segment, ValidationError};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

/// Resolution failure
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Blank or malformed name, stack or version
    #[error("invalid secret version: {0}")]
    InvalidArgument(#[from] ValidationError),
    /// No container carries the name and stack labels
    #[error("secret not found: {name}")]
    NotFound { name: String },
    #[error("backend lookup failed: {0}")]
    Backend(#[from] BackendError),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::NotFound { .. } => true,
            ResolveError::Backend(backend) => backend.is_not_found(),
            ResolveError::InvalidArgument(_) => false,
        }
    }
}

/// Name-to-container resolver with lazy creation and memoization
pub struct ResourceResolver {
    backend: Arc<dyn SecretStoreBackend>,
    stack: String,
    cache: RwLock<HashMap<String, String>>,
    creation_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("backend", &self.backend)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl ResourceResolver {
    pub fn new(backend: Arc<dyn SecretStoreBackend>, stack: impl Into<String>) -> Self {
        Self {
            backend,
            stack: stack.into(),
            cache: RwLock::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn backend(&self) -> &Arc<dyn SecretStoreBackend> {
        &self.backend
    }

    /// Label filter identifying the container of `name` in this stack
    pub fn filter_for(&self, name: &str) -> LabelFilter {
        LabelFilter::new()
            .with(LABEL_SECRET_NAME, name)
            .with(LABEL_SECRET_STACK, self.stack.as_str())
    }

    /// Cached container for `name`, without touching the backend
    pub fn cached(&self, name: &str) -> Option<String> {
        match self.cache.read() {
            Ok(cache) => cache.get(name).cloned(),
            Err(e) => {
                warn!("Resolution cache lock poisoned, treating as miss: {}", e);
                None
            }
        }
    }

    fn remember(&self, name: &str, container: &str) {
        match self.cache.write() {
            Ok(mut cache) => {
                cache.insert(name.to_string(), container.to_string());
            }
            Err(e) => warn!("Resolution cache lock poisoned, not caching {}: {}", name, e),
        }
    }

    fn creation_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .creation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Name and stack must both be valid label values
    fn check_scope(&self, name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::BlankName);
        }
        if !is_label_value(name) {
            return Err(ValidationError::InvalidName);
        }
        if !is_label_value(&self.stack) {
            return Err(ValidationError::InvalidStack);
        }
        Ok(())
    }

    /// Resolve `name` to its container, from cache or by label lookup
    ///
    /// # Errors
    /// [`ResolveError::InvalidArgument`] when `name` or the stack cannot be a label
    /// value (before any backend call), [`ResolveError::NotFound`] when no
    /// container matches, backend failures otherwise.
    pub async fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        self.check_scope(name)?;
        if let Some(container) = self.cached(name) {
            metrics::record_cache_lookup(true);
            debug!("Resolution cache hit for secret {}", name);
            return Ok(container);
        }
        metrics::record_cache_lookup(false);
        self.lookup(name).await
    }

    async fn lookup(&self, name: &str) -> Result<String, ResolveError> {
        let span = tracing::debug_span!(
            "secret.resolve",
            secret.name = name,
            secret.stack = %self.stack,
            provider = self.backend.provider_name()
        );

        async move {
            let filter = self.filter_for(name);
            // Only the first match is consumed
            let first = self.backend.list_containers(&filter).next().await;
            match first {
                Some(Ok(container)) => {
                    debug!("Resolved secret {} to {}", name, container.name);
                    self.remember(name, &container.name);
                    Ok(container.name)
                }
                Some(Err(e)) => {
                    metrics::increment_provider_errors(self.backend.provider_name(), e.as_str());
                    Err(ResolveError::Backend(e))
                }
                None => Err(ResolveError::NotFound {
                    name: name.to_string(),
                }),
            }
        }
        .instrument(span)
        .await
    }

    /// Resolve `name`, creating a labelled container if none exists yet
    ///
    /// # Errors
    /// Backend failures while listing or creating.
    pub async fn resolve_or_create(&self, name: &str) -> Result<String, ResolveError> {
        match self.resolve(name).await {
            Err(ResolveError::NotFound { .. }) => {}
            resolved => return resolved,
        }

        let lock = self.creation_lock(name);
        let _guard = lock.lock().await;

        // Another writer may have created it while we waited
        if let Some(container) = self.cached(name) {
            return Ok(container);
        }

        let labels = self.filter_for(name).to_labels();
        let container_id = container_id(name);
        let container = match self.backend.create_container(&container_id, &labels).await {
            Ok(container) => container,
            Err(e) => {
                metrics::increment_provider_errors(self.backend.provider_name(), e.as_str());
                return Err(ResolveError::Backend(e));
            }
        };

        metrics::increment_containers_created();
        info!(
            "Created secret container {} for {} in stack {}",
            container.name, name, self.stack
        );
        self.remember(name, &container.name);
        // Later writers hit the cache; waiters still holding the lock re-check it
        self.creation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        Ok(container.name)
    }

    /// Fully-qualified reference to one version of `name`
    ///
    /// Never creates containers: an unknown name is a hard failure. `version`
    /// must be a single path segment so the reference cannot leave `container`.
    ///
    /// # Errors
    /// [`ResolveError::InvalidArgument`] for blank or malformed arguments (before
    /// any backend call), otherwise the errors of [`resolve`](Self::resolve).
    pub async fn build_version_reference(
        &self,
        name: &str,
        version: &str,
    ) -> Result<String, ResolveError> {
        if name.is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        if version.is_empty() {
            return Err(ValidationError::BlankVersion.into());
        }
        if !is_version_segment(version) {
            return Err(ValidationError::MalformedVersion.into());
        }
        let container = self.resolve(name).await?;
        Ok(format!("{container}/{VERSIONS_SEGMENT}/{version}"))
    }
}

/// Provider id for a new container holding `name`
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; a random suffix keeps ids
/// unique across stacks sharing one project.
pub fn container_id(name: &str) -> String {
    let max_prefix = MAX_CONTAINER_ID_LEN - CONTAINER_ID_SUFFIX_LEN - 1;
    let prefix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(max_prefix)
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..CONTAINER_ID_SUFFIX_LEN])
}

/// Trailing path segment of a version resource name
pub fn version_id_from_name(version_name: &str) -> Option<&str> {
    version_name
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryBackend;

    fn resolver(backend: &InMemoryBackend, stack: &str) -> ResourceResolver {
        ResourceResolver::new(Arc::new(backend.clone()), stack)
    }

    #[test]
    fn test_container_id_sanitizes_and_suffixes() {
        let id = container_id("db.pass/prod");
        assert!(id.starts_with("db_pass_prod-"));
        assert_eq!(id.len(), "db_pass_prod-".len() + 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_container_id_length_capped() {
        let id = container_id(&"a".repeat(400));
        assert_eq!(id.len(), 255);
    }

    #[test]
    fn test_version_id_from_name() {
        assert_eq!(
            version_id_from_name("projects/123/secrets/db/versions/7"),
            Some("7")
        );
        assert_eq!(version_id_from_name("7"), Some("7"));
        assert_eq!(version_id_from_name("projects/123/secrets/db/versions/"), None);
    }

    #[tokio::test]
    async fn test_resolve_unknown_name_is_not_found() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");
        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { ref name } if name == "missing"));
        assert!(resolver.cached("missing").is_none());
        assert_eq!(backend.calls().create, 0);
    }

    #[tokio::test]
    async fn test_resolve_or_create_creates_once_then_hits_cache() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");

        let first = resolver.resolve_or_create("db-pass").await.unwrap();
        let second = resolver.resolve_or_create("db-pass").await.unwrap();
        assert_eq!(first, second);

        let calls = backend.calls();
        assert_eq!(calls.create, 1);
        assert_eq!(calls.list, 1);

        let containers = backend.containers().await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].labels["x-secret-name"], "db-pass");
        assert_eq!(containers[0].labels["x-secret-stack"], "prod");
    }

    #[tokio::test]
    async fn test_existing_container_discovered_by_fresh_resolver() {
        let backend = InMemoryBackend::new("local");
        let created = resolver(&backend, "prod")
            .resolve_or_create("api-key")
            .await
            .unwrap();

        // A restarted process starts with an empty cache
        let restarted = resolver(&backend, "prod");
        assert_eq!(restarted.resolve("api-key").await.unwrap(), created);
        assert_eq!(restarted.cached("api-key"), Some(created));
    }

    #[tokio::test]
    async fn test_stacks_do_not_collide() {
        let backend = InMemoryBackend::new("local");
        let prod = resolver(&backend, "prod").resolve_or_create("db").await.unwrap();
        let dev = resolver(&backend, "dev").resolve_or_create("db").await.unwrap();
        assert_ne!(prod, dev);
        assert_eq!(backend.containers().await.len(), 2);
    }

    #[tokio::test]
    async fn test_build_version_reference() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");
        let container = resolver.resolve_or_create("db").await.unwrap();

        let reference = resolver.build_version_reference("db", "3").await.unwrap();
        assert_eq!(reference, format!("{container}/versions/3"));
    }

    #[tokio::test]
    async fn test_build_version_reference_validates_before_io() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");

        assert!(matches!(
            resolver.build_version_reference("", "1").await,
            Err(ResolveError::InvalidArgument(ValidationError::BlankName))
        ));
        assert!(matches!(
            resolver.build_version_reference("db", "").await,
            Err(ResolveError::InvalidArgument(ValidationError::BlankVersion))
        ));
        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_build_version_reference_rejects_path_segments() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");
        resolver.resolve_or_create("mine").await.unwrap();
        let calls = backend.calls();

        for version in ["1/../../../other-aaaa/versions/1", "..", ".", "1?alt=json", "1#x", "%2F"] {
            assert!(
                matches!(
                    resolver.build_version_reference("mine", version).await,
                    Err(ResolveError::InvalidArgument(ValidationError::MalformedVersion))
                ),
                "{version}"
            );
        }
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test]
    async fn test_names_and_stacks_must_be_label_values() {
        let backend = InMemoryBackend::new("local");
        let prod = resolver(&backend, "prod");

        let too_long = "a".repeat(64);
        for name in ["DB_PASSWORD", "db.pass", "db pass", too_long.as_str()] {
            assert!(
                matches!(
                    prod.resolve_or_create(name).await,
                    Err(ResolveError::InvalidArgument(ValidationError::InvalidName))
                ),
                "{name}"
            );
        }

        let bad_stack = resolver(&backend, "Prod Stack");
        assert!(matches!(
            bad_stack.resolve_or_create("db").await,
            Err(ResolveError::InvalidArgument(ValidationError::InvalidStack))
        ));
        assert!(matches!(
            bad_stack.build_version_reference("db", "1").await,
            Err(ResolveError::InvalidArgument(ValidationError::InvalidStack))
        ));

        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_creation_lock_released_after_create() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");
        for name in ["a", "b", "c"] {
            resolver.resolve_or_create(name).await.unwrap();
        }
        assert!(resolver.creation_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_version_reference_never_creates() {
        let backend = InMemoryBackend::new("local");
        let resolver = resolver(&backend, "prod");
        let err = resolver
            .build_version_reference("ghost", "1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(backend.containers().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creation_is_single_flight() {
        let backend = InMemoryBackend::new("local");
        let resolver = Arc::new(resolver(&backend, "prod"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve_or_create("shared").await })
            })
            .collect();

        let mut names = Vec::new();
        for task in tasks {
            names.push(task.await.unwrap().unwrap());
        }
        names.dedup();
        assert_eq!(names.len(), 1);
        assert_eq!(backend.calls().create, 1);
    }
}
