//! Mock ClusterStore for unit testing
//!
//! Stores Pods and Services in memory, emulating the API server behaviour the
//! reconciler depends on: not-found and already-exists errors, optimistic
//! concurrency on `resourceVersion`, and a log of every write so tests can
//! assert on exactly which side effects happened.
//!
//! - `pods.rs` - Pod reads and updates
//! - `services.rs` - Service reads, creation and deletion

mod pods;
mod services;

use crate::error::StoreError;
use crate::key::ObjectKey;
use crate::store_trait::ClusterStore;
use k8s_openapi::api::core::v1::{Pod, Service};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Store operation, used to name writes and to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `get_pod`
    GetPod,
    /// `update_pod`
    UpdatePod,
    /// `get_service`
    GetService,
    /// `create_service`
    CreateService,
    /// `delete_service`
    DeleteService,
}

impl StoreOp {
    fn is_write(self) -> bool {
        matches!(self, Self::UpdatePod | Self::CreateService | Self::DeleteService)
    }
}

/// Mock store for testing
#[derive(Clone, Debug, Default)]
pub struct MockClusterStore {
    pub(crate) pods: Arc<Mutex<BTreeMap<ObjectKey, Pod>>>,
    pub(crate) services: Arc<Mutex<BTreeMap<ObjectKey, Service>>>,
    pub(crate) writes: Arc<Mutex<Vec<(StoreOp, ObjectKey)>>>,
    pub(crate) failures: Arc<Mutex<HashMap<StoreOp, (u16, String)>>>,
    pub(crate) next_version: Arc<Mutex<u64>>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().expect("mock store lock poisoned")
}

impl MockClusterStore {
    /// Create an empty mock store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Pod to the mock store (for test setup)
    ///
    /// # Panics
    ///
    /// Panics if the Pod has no name or namespace.
    pub fn add_pod(&self, mut pod: Pod) {
        let key = ObjectKey::of(&pod).expect("test pod needs a name and namespace");
        pod.metadata.resource_version = Some(self.next_version());
        lock(&self.pods).insert(key, pod);
    }

    /// Add a Service to the mock store (for test setup)
    ///
    /// # Panics
    ///
    /// Panics if the Service has no name or namespace.
    pub fn add_service(&self, mut service: Service) {
        let key = ObjectKey::of(&service).expect("test service needs a name and namespace");
        service.metadata.resource_version = Some(self.next_version());
        lock(&self.services).insert(key, service);
    }

    /// Remove a Pod without recording a write, as if deleted by someone else
    pub fn remove_pod(&self, key: &ObjectKey) -> Option<Pod> {
        lock(&self.pods).remove(key)
    }

    /// Remove a Service without recording a write, as if deleted out-of-band
    pub fn remove_service(&self, key: &ObjectKey) -> Option<Service> {
        lock(&self.services).remove(key)
    }

    /// Current stored copy of a Pod
    #[must_use]
    pub fn pod(&self, key: &ObjectKey) -> Option<Pod> {
        lock(&self.pods).get(key).cloned()
    }

    /// Current stored copy of a Service
    #[must_use]
    pub fn service(&self, key: &ObjectKey) -> Option<Service> {
        lock(&self.services).get(key).cloned()
    }

    /// Every write performed through the trait, in order
    #[must_use]
    pub fn writes(&self) -> Vec<(StoreOp, ObjectKey)> {
        lock(&self.writes).clone()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        lock(&self.writes).clear();
    }

    /// Make every call to `op` fail with the given API status until cleared
    pub fn fail(&self, op: StoreOp, code: u16, reason: &str) {
        lock(&self.failures).insert(op, (code, reason.to_string()));
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, op: StoreOp) {
        lock(&self.failures).remove(&op);
    }

    fn next_version(&self) -> String {
        let mut version = lock(&self.next_version);
        *version += 1;
        version.to_string()
    }

    fn check(&self, op: StoreOp, key: &ObjectKey) -> Result<(), StoreError> {
        if let Some((code, reason)) = lock(&self.failures).get(&op) {
            return Err(StoreError::from_status(
                *code,
                reason,
                format!("injected failure for {op:?} on {key}"),
            ));
        }
        Ok(())
    }

    fn record(&self, op: StoreOp, key: &ObjectKey) {
        if op.is_write() {
            lock(&self.writes).push((op, key.clone()));
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn get_pod(&self, key: &ObjectKey) -> Result<Pod, StoreError> {
        self.check(StoreOp::GetPod, key)?;
        pods::get_pod(self, key)
    }

    async fn update_pod(&self, pod: &Pod) -> Result<Pod, StoreError> {
        let key = ObjectKey::of(pod)
            .ok_or_else(|| StoreError::NotFound("pod without name".to_string()))?;
        self.check(StoreOp::UpdatePod, &key)?;
        let updated = pods::update_pod(self, &key, pod)?;
        self.record(StoreOp::UpdatePod, &key);
        Ok(updated)
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Service, StoreError> {
        self.check(StoreOp::GetService, key)?;
        services::get_service(self, key)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, StoreError> {
        let key = ObjectKey::of(service)
            .ok_or_else(|| StoreError::NotFound("service without name".to_string()))?;
        self.check(StoreOp::CreateService, &key)?;
        let created = services::create_service(self, &key, service)?;
        self.record(StoreOp::CreateService, &key);
        Ok(created)
    }

    async fn delete_service(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.check(StoreOp::DeleteService, key)?;
        services::delete_service(self, key)?;
        self.record(StoreOp::DeleteService, key);
        Ok(())
    }
}
