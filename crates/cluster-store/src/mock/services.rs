//! Service operations for MockClusterStore

use super::{MockClusterStore, lock};
use crate::error::StoreError;
use crate::key::ObjectKey;
use k8s_openapi::api::core::v1::Service;

pub fn get_service(store: &MockClusterStore, key: &ObjectKey) -> Result<Service, StoreError> {
    lock(&store.services)
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("services \"{}\" not found", key.name)))
}

pub fn create_service(
    store: &MockClusterStore,
    key: &ObjectKey,
    service: &Service,
) -> Result<Service, StoreError> {
    let mut services = lock(&store.services);
    if services.contains_key(key) {
        return Err(StoreError::AlreadyExists(format!(
            "services \"{}\" already exists",
            key.name
        )));
    }

    let mut created = service.clone();
    created.metadata.resource_version = Some(store.next_version());
    services.insert(key.clone(), created.clone());
    Ok(created)
}

pub fn delete_service(store: &MockClusterStore, key: &ObjectKey) -> Result<(), StoreError> {
    lock(&store.services)
        .remove(key)
        .map(|_| ())
        .ok_or_else(|| StoreError::NotFound(format!("services \"{}\" not found", key.name)))
}
