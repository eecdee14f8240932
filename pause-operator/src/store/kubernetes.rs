//! Kubernetes-backed resource store.

use super::{ResourceKey, ResourceStore, StoreError, StoreFuture};
use kube::api::{ApiResource, DynamicObject, PostParams};
use kube::{Api, Client};
use pause_core::ManagedResource;

/// Store reading and writing one resource kind through the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    resource: ApiResource,
}

impl KubeStore {
    /// Create a store for the given resource kind.
    pub fn new(client: Client, resource: ApiResource) -> Self {
        Self { client, resource }
    }

    /// The resource kind this store serves.
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }

    fn api(&self, key: &ResourceKey) -> Api<DynamicObject> {
        match &key.namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &self.resource),
            None => Api::all_with(self.client.clone(), &self.resource),
        }
    }
}

impl ResourceStore for KubeStore {
    fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ManagedResource>> {
        Box::pin(async move {
            match self.api(key).get_opt(&key.name).await? {
                Some(object) => Ok(Some(to_managed(&object)?)),
                None => Ok(None),
            }
        })
    }

    fn replace<'a>(
        &'a self,
        key: &'a ResourceKey,
        resource: &'a ManagedResource,
    ) -> StoreFuture<'a, ManagedResource> {
        Box::pin(async move {
            let object: DynamicObject = serde_json::from_value(resource.clone().into_value())?;
            match self
                .api(key)
                .replace(&key.name, &PostParams::default(), &object)
                .await
            {
                Ok(updated) => Ok(to_managed(&updated)?),
                Err(kube::Error::Api(response)) if response.code == 409 => Err(StoreError::Conflict),
                Err(kube::Error::Api(response)) if response.code == 404 => Err(StoreError::NotFound),
                Err(err) => Err(err.into()),
            }
        })
    }
}

fn to_managed(object: &DynamicObject) -> Result<ManagedResource, StoreError> {
    Ok(ManagedResource::from_value(serde_json::to_value(object)?)?)
}
