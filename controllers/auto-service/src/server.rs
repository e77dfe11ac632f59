//! HTTP listeners: the ops endpoints and the shared serve loop
//!
//! The ops router exposes liveness, readiness and Prometheus metrics. Both it
//! and the admission webhook are served by [`serve`], which stops accepting
//! connections once the shutdown token is cancelled.

use crate::config::TlsFiles;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// State behind the ops endpoints
#[derive(Debug, Clone)]
pub struct OpsState {
    /// Registry rendered by `/metrics`
    pub metrics: Arc<Metrics>,
    /// Set once the Pod watcher has completed its initial list
    pub ready: Arc<AtomicBool>,
}

/// Router serving `/healthz`, `/readyz` and `/metrics`
pub fn ops_router(state: OpsState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn readyz(State(state): State<OpsState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "waiting for initial Pod list")
    }
}

async fn metrics(State(state): State<OpsState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve `router` on `addr` until `shutdown` is cancelled.
///
/// With `tls` set the listener speaks HTTPS using the given PEM files,
/// otherwise plain HTTP.
pub async fn serve(
    name: &'static str,
    addr: SocketAddr,
    router: Router,
    tls: Option<TlsFiles>,
    shutdown: CancellationToken,
) -> Result<(), ControllerError> {
    match tls {
        Some(files) => {
            let tls_config = RustlsConfig::from_pem_file(&files.cert, &files.key)
                .await
                .map_err(|e| ControllerError::Server(format!("{name} TLS config error: {e}")))?;

            let handle = axum_server::Handle::new();
            let on_shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                on_shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!(%addr, "Starting {} server (https)", name);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .map_err(|e| ControllerError::Server(format!("{name} server error: {e}")))
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| ControllerError::Server(format!("{name} bind {addr}: {e}")))?;

            info!(%addr, "Starting {} server (http)", name);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .map_err(|e| ControllerError::Server(format!("{name} server error: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> OpsState {
        OpsState {
            metrics: Arc::new(Metrics::new().expect("metrics register")),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn get_path(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        let (status, body) = get_path(ops_router(state()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readyz_follows_flag() {
        let state = state();
        let (status, _) = get_path(ops_router(state.clone()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.ready.store(true, Ordering::Release);
        let (status, _) = get_path(ops_router(state), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_registry() {
        let state = state();
        state.metrics.record_admission("allow");
        let (status, body) = get_path(ops_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("auto_service_admission_total{decision=\"allow\"} 1"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
        let task = tokio::spawn(serve(
            "ops",
            addr,
            ops_router(state()),
            None,
            shutdown.clone(),
        ));

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server stops")
            .expect("task joins");
        assert!(result.is_ok());
    }
}
