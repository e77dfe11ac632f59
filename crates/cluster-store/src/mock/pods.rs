//! Pod operations for MockClusterStore

use super::{MockClusterStore, lock};
use crate::error::StoreError;
use crate::key::ObjectKey;
use k8s_openapi::api::core::v1::Pod;

pub fn get_pod(store: &MockClusterStore, key: &ObjectKey) -> Result<Pod, StoreError> {
    lock(&store.pods)
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("pods \"{}\" not found", key.name)))
}

pub fn update_pod(store: &MockClusterStore, key: &ObjectKey, pod: &Pod) -> Result<Pod, StoreError> {
    let mut pods = lock(&store.pods);
    let current = pods
        .get(key)
        .ok_or_else(|| StoreError::NotFound(format!("pods \"{}\" not found", key.name)))?;

    // A write carrying a resourceVersion must match the stored one
    if let Some(expected) = pod.metadata.resource_version.as_deref() {
        if current.metadata.resource_version.as_deref() != Some(expected) {
            return Err(StoreError::Conflict(format!(
                "Operation cannot be fulfilled on pods \"{}\": the object has been modified",
                key.name
            )));
        }
    }

    let mut updated = pod.clone();
    updated.metadata.resource_version = Some(store.next_version());
    pods.insert(key.clone(), updated.clone());
    Ok(updated)
}
