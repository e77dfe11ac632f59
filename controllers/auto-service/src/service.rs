//! Companion Service derivation.
//!
//! Everything here is a pure function of a Pod: the Service's identity, its
//! ports, and the full object the reconciler creates. The Service refers back
//! to its Pod only through the naming convention, never an owner reference.

use crate::labels::AUTO_SERVICE_LABEL;
use cluster_store::ObjectKey;
use k8s_openapi::api::core::v1::{Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Suffix appended to the Pod name to name its Service
pub const SERVICE_NAME_SUFFIX: &str = "-auto-service";

const POD_RUNNING: &str = "Running";
const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Identity of the companion Service of a Pod
#[must_use]
pub fn service_key_for(pod: &ObjectKey) -> ObjectKey {
    ObjectKey::new(
        pod.namespace.clone(),
        format!("{}{}", pod.name, SERVICE_NAME_SUFFIX),
    )
}

/// One Service port derived from a container port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPort {
    /// Port exposed by the Service
    pub port: i32,
    /// Numeric container port traffic is sent to (always equal to `port`)
    pub target_port: i32,
    /// Protocol as declared on the container, `None` if unset
    pub protocol: Option<String>,
}

/// Ports for the companion Service, from the Pod's first container only
///
/// Order follows the container's declaration. A Pod without containers or
/// whose first container declares no ports yields an empty list.
#[must_use]
pub fn derive_ports(pod: &Pod) -> Vec<DerivedPort> {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .and_then(|container| container.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| DerivedPort {
                    port: p.container_port,
                    target_port: p.container_port,
                    protocol: p.protocol.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Convert derived ports into `ServicePort`s
///
/// The API server requires every port of a multi-port Service to be named,
/// so those get `<protocol>-<port>`; a lone port stays unnamed.
#[must_use]
pub fn to_service_ports(ports: &[DerivedPort]) -> Vec<ServicePort> {
    let named = ports.len() > 1;
    ports
        .iter()
        .map(|p| ServicePort {
            name: named.then(|| {
                let protocol = p.protocol.as_deref().unwrap_or("TCP");
                format!("{}-{}", protocol.to_ascii_lowercase(), p.port)
            }),
            port: p.port,
            target_port: Some(IntOrString::Int(p.target_port)),
            protocol: p.protocol.clone(),
            ..Default::default()
        })
        .collect()
}

/// Whether every container reports ready; vacuously true with no statuses
#[must_use]
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_none_or(|statuses| statuses.iter().all(|c| c.ready))
}

/// Whether the Pod's phase is `Running`
#[must_use]
pub fn is_pod_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == POD_RUNNING)
}

/// Build the companion Service for a Pod
///
/// `selector` is the label set the Pod carries once this pass commits.
/// Returns `None` when the Pod declares no ports, in which case no Service
/// is created at all.
#[must_use]
pub fn build_service(
    pod_key: &ObjectKey,
    pod: &Pod,
    selector: BTreeMap<String, String>,
) -> Option<Service> {
    let ports = derive_ports(pod);
    if ports.is_empty() {
        return None;
    }

    let key = service_key_for(pod_key);
    Some(Service {
        metadata: ObjectMeta {
            name: Some(key.name),
            namespace: Some(key.namespace),
            labels: Some(BTreeMap::from([(
                AUTO_SERVICE_LABEL.to_string(),
                "true".to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(to_service_ports(&ports)),
            selector: Some(selector),
            type_: Some(SERVICE_TYPE_CLUSTER_IP.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_service_key_uses_hyphenated_suffix() {
        let key = service_key_for(&ObjectKey::new("apps", "demo-pod"));
        assert_eq!(key, ObjectKey::new("apps", "demo-pod-auto-service"));
    }

    #[test]
    fn test_derive_single_port() {
        let pod = PodBuilder::new("default", "single").port(80, Some("TCP")).build();
        assert_eq!(
            derive_ports(&pod),
            vec![DerivedPort {
                port: 80,
                target_port: 80,
                protocol: Some("TCP".to_string()),
            }]
        );
    }

    #[test]
    fn test_derive_multiple_ports_keeps_order() {
        let pod = PodBuilder::new("default", "multi")
            .port(80, Some("TCP"))
            .port(443, Some("TCP"))
            .build();
        let triples: Vec<_> = derive_ports(&pod)
            .into_iter()
            .map(|p| (p.port, p.target_port, p.protocol))
            .collect();
        assert_eq!(
            triples,
            vec![
                (80, 80, Some("TCP".to_string())),
                (443, 443, Some("TCP".to_string())),
            ]
        );
    }

    #[test]
    fn test_derive_no_ports() {
        let pod = PodBuilder::new("default", "none").build();
        assert!(derive_ports(&pod).is_empty());

        let pod = Pod::default();
        assert!(derive_ports(&pod).is_empty());
    }

    #[test]
    fn test_only_first_container_counts() {
        let pod = PodBuilder::new("default", "sidecar")
            .port(8080, Some("TCP"))
            .sidecar_port(9090)
            .build();
        let ports = derive_ports(&pod);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8080);
    }

    #[test]
    fn test_service_port_names_only_when_multiple() {
        let single = to_service_ports(&[DerivedPort {
            port: 80,
            target_port: 80,
            protocol: None,
        }]);
        assert_eq!(single[0].name, None);
        assert_eq!(single[0].target_port, Some(IntOrString::Int(80)));

        let multi = to_service_ports(&[
            DerivedPort {
                port: 80,
                target_port: 80,
                protocol: Some("TCP".to_string()),
            },
            DerivedPort {
                port: 53,
                target_port: 53,
                protocol: Some("UDP".to_string()),
            },
        ]);
        assert_eq!(multi[0].name.as_deref(), Some("tcp-80"));
        assert_eq!(multi[1].name.as_deref(), Some("udp-53"));
    }

    #[test]
    fn test_readiness() {
        let pod = PodBuilder::new("default", "p").build();
        assert!(is_pod_ready(&pod), "no statuses is vacuously ready");

        let pod = PodBuilder::new("default", "p").ready(&[true, true]).build();
        assert!(is_pod_ready(&pod));

        let pod = PodBuilder::new("default", "p").ready(&[true, false]).build();
        assert!(!is_pod_ready(&pod));
    }

    #[test]
    fn test_running_phase() {
        assert!(is_pod_running(&PodBuilder::new("default", "p").phase("Running").build()));
        assert!(!is_pod_running(&PodBuilder::new("default", "p").phase("Pending").build()));
        assert!(!is_pod_running(&PodBuilder::new("default", "p").build()));
    }

    #[test]
    fn test_build_service_shape() {
        let pod = PodBuilder::new("apps", "web")
            .label("app", "web")
            .port(80, Some("TCP"))
            .build();
        let key = ObjectKey::new("apps", "web");
        let selector = BTreeMap::from([("app".to_string(), "web".to_string())]);

        let svc = build_service(&key, &pod, selector.clone()).expect("pod has ports");
        assert_eq!(svc.metadata.name.as_deref(), Some("web-auto-service"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("apps"));

        let spec = svc.spec.expect("spec");
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.selector, Some(selector));
        assert_eq!(spec.ports.map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_build_service_skipped_without_ports() {
        let pod = PodBuilder::new("apps", "web").build();
        assert!(build_service(&ObjectKey::new("apps", "web"), &pod, BTreeMap::new()).is_none());
    }
}
