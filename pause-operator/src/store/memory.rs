//! In-memory resource store.
//!
//! Behaves like the API server for the operations the operator uses: every
//! write bumps `metadata.resourceVersion` and a replace carrying a stale
//! version fails with a conflict. Faults can be queued to exercise the
//! evaluation loop's error paths.

use super::{ResourceKey, ResourceStore, StoreError, StoreFuture};
use pause_core::ManagedResource;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory store with fault injection.
///
/// # Example
///
/// ```
/// use pause_core::ManagedResource;
/// use pause_operator::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// let key = store.insert(
///     ManagedResource::from_value(serde_json::json!({ "metadata": { "name": "subnet-a" } }))
///         .unwrap(),
/// );
/// assert_eq!(store.current(&key).unwrap().resource_version(), Some("1"));
/// ```
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<ResourceKey, ManagedResource>,
    version: u64,
    failing_gets: u32,
    failing_replaces: u32,
    racing_replaces: u32,
    gets: u32,
    replaces: u32,
}

impl Inner {
    fn store(&mut self, key: ResourceKey, mut resource: ManagedResource) -> ManagedResource {
        self.version += 1;
        resource.set_resource_version(self.version.to_string());
        self.objects.insert(key, resource.clone());
        resource
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource, assigning a fresh resourceVersion.
    pub fn insert(&self, resource: ManagedResource) -> ResourceKey {
        let key = ResourceKey::of(&resource);
        self.inner.lock().store(key.clone(), resource);
        key
    }

    /// Current stored copy of a resource.
    pub fn current(&self, key: &ResourceKey) -> Option<ManagedResource> {
        self.inner.lock().objects.get(key).cloned()
    }

    /// Edit a resource as another writer would, bumping its version.
    ///
    /// Returns `false` if the resource does not exist.
    pub fn modify(&self, key: &ResourceKey, edit: impl FnOnce(&mut ManagedResource)) -> bool {
        let mut inner = self.inner.lock();
        let Some(mut resource) = inner.objects.get(key).cloned() else {
            return false;
        };
        edit(&mut resource);
        inner.store(key.clone(), resource);
        true
    }

    /// Delete a resource.
    pub fn remove(&self, key: &ResourceKey) -> Option<ManagedResource> {
        self.inner.lock().objects.remove(key)
    }

    /// Fail the next `count` reads with [`StoreError::Unavailable`].
    pub fn fail_next_gets(&self, count: u32) {
        self.inner.lock().failing_gets = count;
    }

    /// Fail the next `count` writes with [`StoreError::Unavailable`].
    pub fn fail_next_replaces(&self, count: u32) {
        self.inner.lock().failing_replaces = count;
    }

    /// Let a concurrent writer bump the version just before each of the next
    /// `count` writes, so they conflict.
    pub fn race_next_replaces(&self, count: u32) {
        self.inner.lock().racing_replaces = count;
    }

    /// Number of reads served, including failed ones.
    pub fn get_count(&self) -> u32 {
        self.inner.lock().gets
    }

    /// Number of writes attempted, including failed ones.
    pub fn replace_count(&self) -> u32 {
        self.inner.lock().replaces
    }
}

impl ResourceStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ManagedResource>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.gets += 1;
            if inner.failing_gets > 0 {
                inner.failing_gets -= 1;
                return Err(StoreError::Unavailable("injected read failure".into()));
            }
            Ok(inner.objects.get(key).cloned())
        })
    }

    fn replace<'a>(
        &'a self,
        key: &'a ResourceKey,
        resource: &'a ManagedResource,
    ) -> StoreFuture<'a, ManagedResource> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.replaces += 1;
            if inner.failing_replaces > 0 {
                inner.failing_replaces -= 1;
                return Err(StoreError::Unavailable("injected write failure".into()));
            }
            if inner.racing_replaces > 0 {
                inner.racing_replaces -= 1;
                if let Some(current) = inner.objects.get(key).cloned() {
                    inner.store(key.clone(), current);
                }
            }

            let Some(current) = inner.objects.get(key) else {
                return Err(StoreError::NotFound);
            };
            if current.resource_version() != resource.resource_version() {
                return Err(StoreError::Conflict);
            }
            Ok(inner.store(key.clone(), resource.clone()))
        })
    }
}
