//! ClusterStore trait for mocking
//!
//! The concrete [`KubeStore`](crate::KubeStore) talks to the API server; tests
//! use the in-memory [`MockClusterStore`](crate::MockClusterStore).

use crate::error::StoreError;
use crate::key::ObjectKey;
use k8s_openapi::api::core::v1::{Pod, Service};

/// Object store operations used by the reconciler
///
/// Each call is a single round trip with no caching. Implementations must
/// report absence as [`StoreError::NotFound`] and duplicate creation as
/// [`StoreError::AlreadyExists`].
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// Read a Pod
    async fn get_pod(&self, key: &ObjectKey) -> Result<Pod, StoreError>;

    /// Replace a Pod with the given object
    ///
    /// The object's `resourceVersion` guards against stale writes; a mismatch
    /// is reported as [`StoreError::Conflict`].
    async fn update_pod(&self, pod: &Pod) -> Result<Pod, StoreError>;

    /// Read a Service
    async fn get_service(&self, key: &ObjectKey) -> Result<Service, StoreError>;

    /// Create a Service
    async fn create_service(&self, service: &Service) -> Result<Service, StoreError>;

    /// Delete a Service
    async fn delete_service(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
