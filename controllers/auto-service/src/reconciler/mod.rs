//! Reconciliation logic for opted-in Pods.
//!
//! Given a Pod identity, the reconciler reads the Pod fresh from the store and
//! applies the first matching row of the transition table:
//!
//! | Observed                                         | Action                                   |
//! |--------------------------------------------------|------------------------------------------|
//! | Pod not found                                    | delete the companion Service, if any     |
//! | not Running, not opted in, or not ready          | nothing                                  |
//! | eligible, `service-active=true`                  | nothing                                  |
//! | eligible, `service-active=false`                 | create Service, set `service-active=true`|
//! | eligible, `service-active` absent or unknown     | set `service-active=false`               |
//!
//! Every pass is idempotent and writes straight through to the store. Failures
//! other than not-found (on delete) and already-exists (on create) are returned
//! unchanged; the caller decides when to run the pass again.

use crate::error::ControllerError;
use crate::labels::{SERVICE_ACTIVE_LABEL, ServiceActivity, is_opted_in};
use crate::metrics::Metrics;
use crate::service::{build_service, is_pod_ready, is_pod_running, service_key_for};
use cluster_store::{ClusterStore, ObjectKey, StoreError};
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Pod is gone; its Service was removed (or was already absent)
    CleanedUp,
    /// Pod is not eligible; nothing done
    Inert,
    /// Pod already has `service-active=true`; nothing done
    Converged,
    /// `service-active=false` recorded; the next pass creates the Service
    MarkedPending,
    /// Service created and `service-active=true` recorded
    Activated,
}

impl Transition {
    /// Stable lower-case name, used as a metric label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CleanedUp => "cleaned_up",
            Self::Inert => "inert",
            Self::Converged => "converged",
            Self::MarkedPending => "marked_pending",
            Self::Activated => "activated",
        }
    }
}

/// Reconciles Pods and their companion Services.
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    ///
    /// Once `shutdown` is cancelled, in-flight and future store calls fail
    /// with [`StoreError::Cancelled`].
    pub fn new(
        store: Arc<dyn ClusterStore>,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            metrics,
            shutdown,
        }
    }

    /// Runs one reconciliation pass for the Pod identified by `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Transition, ControllerError> {
        let result = self.reconcile_pod(key).await;
        match &result {
            Ok(transition) => self.metrics.record_transition(*transition),
            Err(_) => self.metrics.record_reconcile_error(),
        }
        result
    }

    async fn reconcile_pod(&self, key: &ObjectKey) -> Result<Transition, ControllerError> {
        let pod = match self.guard(self.store.get_pod(key)).await {
            Ok(pod) => pod,
            Err(e) if e.is_not_found() => {
                info!("Pod {} no longer exists", key);
                self.clean_up_service(key).await?;
                return Ok(Transition::CleanedUp);
            }
            Err(e) => return Err(e.into()),
        };

        let labels = pod.metadata.labels.as_ref();
        if !(is_pod_running(&pod) && is_opted_in(labels) && is_pod_ready(&pod)) {
            debug!("Pod {} is not eligible for a Service", key);
            return Ok(Transition::Inert);
        }

        match ServiceActivity::from_labels(labels) {
            ServiceActivity::Active => {
                debug!("Pod {} already has an active Service", key);
                Ok(Transition::Converged)
            }
            ServiceActivity::Pending => {
                self.activate(key, pod).await?;
                Ok(Transition::Activated)
            }
            ServiceActivity::Unset => {
                self.commit_activity(pod, ServiceActivity::Pending).await?;
                info!("Pod {} marked {}=false", key, SERVICE_ACTIVE_LABEL);
                Ok(Transition::MarkedPending)
            }
        }
    }

    /// Creates the companion Service, then records `service-active=true`.
    ///
    /// The Service selects on the labels the Pod carries after this commit.
    /// An existing Service with the same name counts as created.
    async fn activate(&self, key: &ObjectKey, pod: Pod) -> Result<(), ControllerError> {
        let mut selector = pod.metadata.labels.clone().unwrap_or_default();
        ServiceActivity::Active.apply_to(&mut selector);

        let service_key = service_key_for(key);
        match build_service(key, &pod, selector) {
            Some(service) => match self.guard(self.store.create_service(&service)).await {
                Ok(_) => info!("Created Service {} for Pod {}", service_key, key),
                Err(e) if e.is_already_exists() => {
                    info!("Service {} already exists", service_key);
                }
                Err(e) => return Err(e.into()),
            },
            None => warn!(
                "Pod {} declares no ports on its first container, not creating a Service",
                key
            ),
        }

        self.commit_activity(pod, ServiceActivity::Active).await?;
        info!("Pod {} marked {}=true", key, SERVICE_ACTIVE_LABEL);
        Ok(())
    }

    async fn commit_activity(
        &self,
        mut pod: Pod,
        activity: ServiceActivity,
    ) -> Result<(), ControllerError> {
        activity.apply_to(pod.metadata.labels.get_or_insert_with(Default::default));
        self.guard(self.store.update_pod(&pod)).await?;
        Ok(())
    }

    /// Deletes the companion Service of a Pod, treating absence as success.
    ///
    /// Only the Pod's identity is needed, so this works after the Pod is gone.
    pub async fn clean_up_service(&self, pod_key: &ObjectKey) -> Result<(), ControllerError> {
        let service_key = service_key_for(pod_key);

        match self.guard(self.store.get_service(&service_key)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!("No Service {} to clean up", service_key);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        match self.guard(self.store.delete_service(&service_key)).await {
            Ok(()) => info!("Deleted Service {}", service_key),
            Err(e) if e.is_not_found() => debug!("Service {} already deleted", service_key),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Races a store call against shutdown.
    async fn guard<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(StoreError::Cancelled),
            result = call => result,
        }
    }
}
