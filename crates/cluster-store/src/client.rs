//! Kubernetes-backed store
//!
//! Implements [`ClusterStore`] on top of `kube::Api`, one namespaced API
//! handle per call.

use crate::error::StoreError;
use crate::key::ObjectKey;
use crate::store_trait::ClusterStore;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

/// Store backed by a live API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Create a store using the given client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn key_of<K: kube::Resource>(obj: &K, kind: &str) -> Result<ObjectKey, StoreError> {
    ObjectKey::of(obj).ok_or_else(|| StoreError::Api {
        code: 422,
        reason: "Invalid".to_string(),
        message: format!("{kind} is missing a name or namespace"),
    })
}

#[async_trait::async_trait]
impl ClusterStore for KubeStore {
    async fn get_pod(&self, key: &ObjectKey) -> Result<Pod, StoreError> {
        debug!("GET pod {}", key);
        Ok(self.pods(&key.namespace).get(&key.name).await?)
    }

    async fn update_pod(&self, pod: &Pod) -> Result<Pod, StoreError> {
        let key = key_of(pod, "Pod")?;
        debug!(
            "PUT pod {} (resourceVersion {:?})",
            key,
            pod.resource_version()
        );
        Ok(self
            .pods(&key.namespace)
            .replace(&key.name, &PostParams::default(), pod)
            .await?)
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Service, StoreError> {
        debug!("GET service {}", key);
        Ok(self.services(&key.namespace).get(&key.name).await?)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, StoreError> {
        let key = key_of(service, "Service")?;
        debug!("POST service {}", key);
        Ok(self
            .services(&key.namespace)
            .create(&PostParams::default(), service)
            .await?)
    }

    async fn delete_service(&self, key: &ObjectKey) -> Result<(), StoreError> {
        debug!("DELETE service {}", key);
        self.services(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
