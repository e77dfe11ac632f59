//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the store,
//! reconciler, watchers and HTTP servers together and supervises them.

use crate::admission::{WebhookState, webhook_router};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{OpsState, ops_router, serve};
use crate::watcher::Watcher;
use cluster_store::KubeStore;
use futures::future::OptionFuture;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

type Task = JoinHandle<Result<(), ControllerError>>;

/// Main controller for auto-service.
#[derive(Debug)]
pub struct Controller {
    pod_watcher: Task,
    deletion_watcher: Task,
    ops_server: Task,
    webhook_server: Option<Task>,
    shutdown: CancellationToken,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(
        config: ControllerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ControllerError> {
        info!("Initializing auto-service controller");

        let kube_client = Client::try_default().await?;
        let pod_api: Api<Pod> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(KubeStore::new(kube_client)),
            metrics.clone(),
            shutdown.clone(),
        ));

        let ready = Arc::new(AtomicBool::new(false));
        let watcher = Arc::new(Watcher::new(
            reconciler,
            pod_api,
            config.concurrency,
            config.error_requeue,
            ready.clone(),
            shutdown.clone(),
        ));

        let pod_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_pods().await })
        };
        let deletion_watcher =
            tokio::spawn(async move { watcher.watch_pod_deletions().await });

        let ops_server = tokio::spawn(serve(
            "ops",
            config.ops_addr,
            ops_router(OpsState {
                metrics: metrics.clone(),
                ready,
            }),
            None,
            shutdown.clone(),
        ));

        let webhook_server = if config.enable_webhook {
            Some(tokio::spawn(serve(
                "webhook",
                config.webhook_addr,
                webhook_router(Arc::new(WebhookState::new(metrics))),
                config.webhook_tls,
                shutdown.clone(),
            )))
        } else {
            info!("Admission webhook disabled");
            None
        };

        Ok(Self {
            pod_watcher,
            deletion_watcher,
            ops_server,
            webhook_server,
            shutdown,
        })
    }

    /// Runs the controller until shutdown or until a task fails.
    ///
    /// Any task finishing ends the run; the others are then asked to stop
    /// through the shutdown token.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("auto-service controller running");

        let mut webhook: OptionFuture<_> = self.webhook_server.take().into();

        let result = tokio::select! {
            result = &mut self.pod_watcher => join("Pod watcher", result),
            result = &mut self.deletion_watcher => join("Pod deletion watcher", result),
            result = &mut self.ops_server => join("ops server", result),
            Some(result) = &mut webhook => join("webhook server", result),
        };

        self.shutdown.cancel();
        info!("auto-service controller stopped");
        result
    }
}

fn join(
    name: &str,
    result: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    result.map_err(|e| ControllerError::Watch(format!("{name} panicked: {e}")))?
}
