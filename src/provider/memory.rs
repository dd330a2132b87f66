//! # In-Memory Backend
//!
//! Process-local [`SecretStoreBackend`] following Secret Manager addressing:
//! - Container names: `projects/{project}/secrets/{id}`
//! - Version names: `projects/{project}/secrets/{id}/versions/{n}`, `n` sequential from 1
//! - `latest` resolves to the newest version
//!
//! Nothing is persisted; the store lives as long as the backend value (clones share it).

use super::{BackendError, Container, ContainerStream, LabelFilter, SecretStoreBackend};
use crate::constants::{LATEST_VERSION_ALIAS, VERSIONS_SEGMENT};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Number of calls made against each backend operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCallCounts {
    pub list: usize,
    pub create: usize,
    pub add_version: usize,
    pub access: usize,
}

impl BackendCallCounts {
    pub fn total(&self) -> usize {
        self.list + self.create + self.add_version + self.access
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    list: AtomicUsize,
    create: AtomicUsize,
    add_version: AtomicUsize,
    access: AtomicUsize,
}

struct ContainerEntry {
    name: String,
    labels: BTreeMap<String, String>,
    versions: Vec<Zeroizing<Vec<u8>>>,
}

impl ContainerEntry {
    fn to_container(&self) -> Container {
        Container {
            name: self.name.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// In-memory secret store
#[derive(Clone)]
pub struct InMemoryBackend {
    project: String,
    // Creation order is listing order
    containers: Arc<RwLock<Vec<ContainerEntry>>>,
    counters: Arc<CallCounters>,
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl InMemoryBackend {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            containers: Arc::new(RwLock::new(Vec::new())),
            counters: Arc::new(CallCounters::default()),
        }
    }

    pub fn parent(&self) -> String {
        format!("projects/{}", self.project)
    }

    /// Snapshot of every container, in creation order
    pub async fn containers(&self) -> Vec<Container> {
        self.containers
            .read()
            .await
            .iter()
            .map(ContainerEntry::to_container)
            .collect()
    }

    /// Number of versions stored under `container_name`
    pub async fn version_count(&self, container_name: &str) -> Option<usize> {
        self.containers
            .read()
            .await
            .iter()
            .find(|entry| entry.name == container_name)
            .map(|entry| entry.versions.len())
    }

    pub fn calls(&self) -> BackendCallCounts {
        BackendCallCounts {
            list: self.counters.list.load(Ordering::Relaxed),
            create: self.counters.create.load(Ordering::Relaxed),
            add_version: self.counters.add_version.load(Ordering::Relaxed),
            access: self.counters.access.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl SecretStoreBackend for InMemoryBackend {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn list_containers<'a>(&'a self, filter: &LabelFilter) -> ContainerStream<'a> {
        self.counters.list.fetch_add(1, Ordering::Relaxed);
        let filter = filter.clone();
        futures::stream::once(async move {
            self.containers
                .read()
                .await
                .iter()
                .filter(|entry| filter.matches(&entry.labels))
                .map(|entry| Ok(entry.to_container()))
                .collect::<Vec<_>>()
        })
        .flat_map(futures::stream::iter)
        .boxed()
    }

    async fn create_container(
        &self,
        container_id: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Container, BackendError> {
        self.counters.create.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}/secrets/{}", self.parent(), container_id);
        let mut containers = self.containers.write().await;
        if containers.iter().any(|entry| entry.name == name) {
            return Err(BackendError::InvalidRequest(format!(
                "secret already exists: {name}"
            )));
        }
        let entry = ContainerEntry {
            name,
            labels: labels.clone(),
            versions: Vec::new(),
        };
        let container = entry.to_container();
        containers.push(entry);
        Ok(container)
    }

    async fn add_version(
        &self,
        container_name: &str,
        payload: &[u8],
    ) -> Result<String, BackendError> {
        self.counters.add_version.fetch_add(1, Ordering::Relaxed);
        let mut containers = self.containers.write().await;
        let entry = containers
            .iter_mut()
            .find(|entry| entry.name == container_name)
            .ok_or_else(|| BackendError::NotFound(container_name.to_string()))?;
        entry.versions.push(Zeroizing::new(payload.to_vec()));
        Ok(format!(
            "{}/{}/{}",
            container_name,
            VERSIONS_SEGMENT,
            entry.versions.len()
        ))
    }

    async fn access_version(
        &self,
        version_name: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        self.counters.access.fetch_add(1, Ordering::Relaxed);
        let not_found = || BackendError::NotFound(version_name.to_string());
        let (container_name, version) = version_name
            .rsplit_once(&format!("/{VERSIONS_SEGMENT}/"))
            .ok_or_else(|| {
                BackendError::InvalidRequest(format!("malformed version name: {version_name}"))
            })?;

        let containers = self.containers.read().await;
        let entry = containers
            .iter()
            .find(|entry| entry.name == container_name)
            .ok_or_else(not_found)?;

        let payload = if version == LATEST_VERSION_ALIAS {
            entry.versions.last()
        } else {
            version
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| entry.versions.get(index))
        };
        payload.cloned().ok_or_else(not_found)
    }
}
