//! Access to the resources being paused.
//!
//! [`ResourceStore`] is the seam between the evaluation loop and the
//! control plane. Updates are conditional on `metadata.resourceVersion`: a
//! stale write fails with [`StoreError::Conflict`] instead of overwriting a
//! concurrent change.
//!
//! - [`KubeStore`]: Kubernetes API via `kube::Api<DynamicObject>`
//! - [`MemoryStore`]: in-process store with fault injection, for tests

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use pause_core::{CoreError, ManagedResource};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Identity of a resource: optional namespace plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Namespace, `None` for cluster-scoped resources.
    pub namespace: Option<String>,
    /// Resource name.
    pub name: String,
}

impl ResourceKey {
    /// Key for a cluster-scoped resource.
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key for a namespaced resource.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of an existing resource document.
    pub fn of(resource: &ManagedResource) -> Self {
        Self {
            namespace: resource.namespace().map(str::to_string),
            name: resource.name().unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Errors returned by a [`ResourceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was based on a stale resourceVersion.
    #[error("Resource version conflict")]
    Conflict,

    /// The resource disappeared between read and write.
    #[error("Resource not found")]
    NotFound,

    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The resource could not be converted.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The returned document is not a resource.
    #[error("Invalid resource: {0}")]
    InvalidResource(#[from] CoreError),

    /// The backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Boxed future returned by [`ResourceStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Read and conditionally replace resources.
pub trait ResourceStore: Send + Sync {
    /// Fetch the current version of a resource, `None` if it does not exist.
    fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ManagedResource>>;

    /// Replace a resource, conditional on its `metadata.resourceVersion`.
    ///
    /// Returns the stored resource with its new version.
    fn replace<'a>(
        &'a self,
        key: &'a ResourceKey,
        resource: &'a ManagedResource,
    ) -> StoreFuture<'a, ManagedResource>;
}

impl<S: ResourceStore + ?Sized> ResourceStore for Arc<S> {
    fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ManagedResource>> {
        (**self).get(key)
    }

    fn replace<'a>(
        &'a self,
        key: &'a ResourceKey,
        resource: &'a ManagedResource,
    ) -> StoreFuture<'a, ManagedResource> {
        (**self).replace(key, resource)
    }
}
