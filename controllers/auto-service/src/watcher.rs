//! Kubernetes resource watchers.
//!
//! Two loops feed the reconciler:
//! - `watch_pods` runs a kube_runtime Controller over Pods. It serializes
//!   reconciles per Pod, requeues failures after a fixed delay and picks up
//!   every label change, which is what drives the second activation pass.
//! - `watch_pod_deletions` runs a raw watcher and hands deleted Pods to the
//!   same reconcile entry point. The Controller drops objects that leave its
//!   cache, so it never reconciles a deletion by itself.
//!
//! A re-list (for example after the watch's resourceVersion expires) sends no
//! `Delete` for Pods removed during the gap. [`PodTracker`] remembers every
//! Pod seen and, when a re-list completes, reports the ones missing from it.
//!
//! Cleanup passes run outside the Controller's per-Pod serialization, so a
//! Pod recreated under the same name may be reconciled by both at once. Every
//! write goes through the store and Pod updates carry `resourceVersion`, so
//! the loser of such a race gets a conflict and is requeued.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use cluster_store::{ObjectKey, StoreError};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube_runtime::{
    Controller, WatchStreamExt,
    controller::{Action, Config as ControllerConfig},
    watcher,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Watches Pods and triggers reconciliation.
#[derive(Debug)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    pod_api: Api<Pod>,
    concurrency: u16,
    error_requeue: Duration,
    ready: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        pod_api: Api<Pod>,
        concurrency: u16,
        error_requeue: Duration,
        ready: Arc<AtomicBool>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            pod_api,
            concurrency,
            error_requeue,
            ready,
            shutdown,
        }
    }

    /// Runs the Pod controller until shutdown.
    pub async fn watch_pods(&self) -> Result<(), ControllerError> {
        info!("Starting Pod watcher (concurrency {})", self.concurrency);

        let requeue = self.error_requeue;
        let error_policy = move |pod: Arc<Pod>, error: &ControllerError, _ctx: Arc<Reconciler>| {
            error!(
                "Reconciliation error for Pod {}: {}, retrying in {:?}",
                describe(&pod),
                error,
                requeue
            );
            Action::requeue(requeue)
        };

        let controller_config = ControllerConfig::default().concurrency(self.concurrency);

        Controller::new(self.pod_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .graceful_shutdown_on(self.shutdown.clone().cancelled_owned())
            .run(reconcile_pod, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((pod, _)) => debug!("Reconciled Pod {}", pod),
                    Err(e) => warn!("Pod controller error: {}", e),
                }
            })
            .await;

        info!("Pod watcher stopped");
        Ok(())
    }

    /// Runs the deletion watcher until shutdown.
    ///
    /// Marks the controller ready once the initial Pod list has been
    /// received. Stream errors are retried with the watcher's default backoff.
    pub async fn watch_pod_deletions(&self) -> Result<(), ControllerError> {
        info!("Starting Pod deletion watcher");

        let mut stream = Box::pin(
            watcher(self.pod_api.clone(), watcher::Config::default()).default_backoff(),
        );

        let mut tracker = PodTracker::default();
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = stream.next() => event,
            };

            match event {
                Some(Ok(event)) => {
                    match &event {
                        watcher::Event::Init => debug!("Pod deletion watcher (re)listing"),
                        watcher::Event::InitDone => {
                            info!("Pod deletion watcher list complete");
                            self.ready.store(true, Ordering::Release);
                        }
                        _ => {}
                    }
                    for key in tracker.observe(&event) {
                        info!("Pod deleted: {}", key);
                        self.spawn_cleanup(key);
                    }
                }
                Some(Err(e)) => warn!("Pod deletion watcher error: {}", e),
                None => {
                    return Err(ControllerError::Watch(
                        "Pod deletion watch stream ended".to_string(),
                    ));
                }
            }
        }

        info!("Pod deletion watcher stopped");
        Ok(())
    }

    /// Reconciles a deleted Pod, retrying after the error delay until it
    /// succeeds or shutdown begins.
    fn spawn_cleanup(&self, key: ObjectKey) {
        let reconciler = self.reconciler.clone();
        let shutdown = self.shutdown.clone();
        let requeue = self.error_requeue;

        tokio::spawn(async move {
            retry_until_done(&reconciler, &key, requeue, &shutdown).await;
        });
    }
}

/// Controller reconcile function: resolves the Pod's identity and runs one pass
async fn reconcile_pod(pod: Arc<Pod>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let key = ObjectKey::of(pod.as_ref()).ok_or_else(|| {
        ControllerError::InvalidObject(format!("Pod without name or namespace: {}", describe(&pod)))
    })?;

    let transition = reconciler.reconcile(&key).await?;
    debug!("Pod {} reconciled: {}", key, transition.as_str());
    Ok(Action::await_change())
}

async fn retry_until_done(
    reconciler: &Reconciler,
    key: &ObjectKey,
    delay: Duration,
    shutdown: &CancellationToken,
) {
    loop {
        match reconciler.reconcile(key).await {
            Ok(transition) => {
                debug!("Deleted Pod {} reconciled: {}", key, transition.as_str());
                return;
            }
            Err(ControllerError::Store(StoreError::Cancelled)) => return,
            Err(e) => warn!(
                "Cleanup for deleted Pod {} failed: {}, retrying in {:?}",
                key, e, delay
            ),
        }

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pods known to the deletion watcher.
///
/// Fed every watcher event in order; returns the Pods that must be treated as
/// deleted, either from an explicit `Delete` or because a completed re-list no
/// longer contains them.
#[derive(Debug, Default)]
struct PodTracker {
    known: HashSet<ObjectKey>,
    /// Pods seen since the last `Init`, while a list is in progress
    relisting: Option<HashSet<ObjectKey>>,
}

impl PodTracker {
    fn observe(&mut self, event: &watcher::Event<Pod>) -> Vec<ObjectKey> {
        match event {
            watcher::Event::Init => {
                self.relisting = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(pod) | watcher::Event::Apply(pod) => {
                if let Some(key) = ObjectKey::of(pod) {
                    if let Some(fresh) = self.relisting.as_mut() {
                        fresh.insert(key.clone());
                    }
                    self.known.insert(key);
                }
                Vec::new()
            }
            watcher::Event::Delete(pod) => match ObjectKey::of(pod) {
                Some(key) => {
                    self.known.remove(&key);
                    if let Some(fresh) = self.relisting.as_mut() {
                        fresh.remove(&key);
                    }
                    vec![key]
                }
                None => {
                    warn!("Ignoring deleted Pod without name or namespace");
                    Vec::new()
                }
            },
            watcher::Event::InitDone => {
                let fresh = self.relisting.take().unwrap_or_default();
                let mut gone: Vec<ObjectKey> = self.known.difference(&fresh).cloned().collect();
                gone.sort();
                self.known = fresh;
                gone
            }
        }
    }
}

fn describe(pod: &Pod) -> String {
    format!(
        "{}/{}",
        pod.metadata.namespace.as_deref().unwrap_or("<none>"),
        pod.metadata.name.as_deref().unwrap_or("<unknown>")
    )
}
