//! Controller-specific error types.
//!
//! This module defines error types specific to the auto-service controller
//! that are not covered by upstream library errors.

use cluster_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the auto-service controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store error (anything other than the expected not-found and
    /// already-exists outcomes)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object delivered by the watch is unusable (e.g. missing namespace)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Webhook or ops HTTP server failed
    #[error("Server error: {0}")]
    Server(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
