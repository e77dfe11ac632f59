//! Auto-Service Controller
//!
//! Gives every ready Pod labelled `auto-service=true` its own ClusterIP
//! Service named `<pod>-auto-service`, and removes that Service when the Pod
//! is deleted. Activation takes two passes tracked by the Pod's
//! `service-active` label.
//!
//! A validating admission webhook rejects Pods that are not opted in or
//! that declare no container ports.

mod admission;
mod config;
mod controller;
mod error;
mod labels;
mod metrics;
mod reconciler;
mod server;
mod service;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting auto-service controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("all namespaces")
    );
    info!(
        "  Webhook: {} on {} ({})",
        if config.enable_webhook { "enabled" } else { "disabled" },
        config.webhook_addr,
        if config.webhook_tls.is_some() { "https" } else { "http" }
    );
    info!("  Ops endpoints: {}", config.ops_addr);
    info!("  Reconcile concurrency: {}", config.concurrency);
    info!("  Error requeue: {:?}", config.error_requeue);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let controller = Controller::new(config, shutdown).await?;
    controller.run().await?;

    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Received SIGINT, shutting down");
        }
        () = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
