//! Validating admission webhook for Pods
//!
//! Rejects Pods that are not opted in to auto-service, and opted-in Pods whose
//! first container declares no ports. The webhook never mutates the Pod.

use crate::labels::is_opted_in;
use crate::metrics::Metrics;
use crate::service::derive_ports;
use axum::{Json, Router, extract::State, routing::post};
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Path the validating webhook configuration points at
pub const VALIDATE_POD_PATH: &str = "/validate--v1-pod";

/// Reason returned for every denied Pod
pub const DENY_MESSAGE: &str = "A pod with label auto-service should have containerPort";

/// Admission verdict for a single Pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Admitted unchanged
    Allow,
    /// Denied, with the reason reported to the client
    Deny(String),
}

/// Decides whether a Pod may be admitted.
///
/// Allowed only when the Pod carries `auto-service=true` and its first
/// container declares at least one port. A Pod without containers has no
/// ports.
#[must_use]
pub fn evaluate(pod: &Pod) -> Decision {
    if is_opted_in(pod.metadata.labels.as_ref()) && !derive_ports(pod).is_empty() {
        Decision::Allow
    } else {
        Decision::Deny(DENY_MESSAGE.to_string())
    }
}

/// Shared state for webhook handlers
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// Admission decisions are counted here
    pub metrics: Arc<Metrics>,
}

impl WebhookState {
    /// Create webhook state around the shared metrics
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

/// Router serving the Pod validation endpoint
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_POD_PATH, post(validate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle a validating admission review for a Pod
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(review(&state.metrics, body).into_review())
}

/// Turn an admission review into a response.
///
/// A review that cannot be understood is answered straight away and is never
/// evaluated as if it carried an empty Pod.
pub fn review(metrics: &Metrics, body: AdmissionReview<DynamicObject>) -> AdmissionResponse {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "Failed to parse admission request");
            metrics.record_admission("invalid");
            return AdmissionResponse::invalid(e.to_string());
        }
    };

    let pod = match decode_pod(&req) {
        Ok(pod) => pod,
        Err(reason) => {
            warn!(uid = %req.uid, %reason, "Rejecting undecodable admission request");
            metrics.record_admission("invalid");
            return AdmissionResponse::from(&req).deny(reason);
        }
    };

    let name = pod
        .metadata
        .name
        .as_deref()
        .or(pod.metadata.generate_name.as_deref())
        .unwrap_or_default();

    match evaluate(&pod) {
        Decision::Allow => {
            debug!(uid = %req.uid, pod = %name, operation = ?req.operation, "Allowing Pod");
            metrics.record_admission("allow");
            AdmissionResponse::from(&req)
        }
        Decision::Deny(reason) => {
            info!(uid = %req.uid, pod = %name, operation = ?req.operation, "Denying Pod: {}", reason);
            metrics.record_admission("deny");
            AdmissionResponse::from(&req).deny(reason)
        }
    }
}

fn decode_pod(req: &AdmissionRequest<DynamicObject>) -> Result<Pod, String> {
    let object = req
        .object
        .as_ref()
        .ok_or_else(|| "admission request carries no object".to_string())?;
    let value = serde_json::to_value(object).map_err(|e| format!("failed to decode Pod: {e}"))?;
    serde_json::from_value(value).map_err(|e| format!("failed to decode Pod: {e}"))
}
