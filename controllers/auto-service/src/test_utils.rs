//! Test utilities for unit testing the reconciler and webhook
//!
//! This module provides helpers for creating test Pods.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, ContainerStatus, Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Builder for test Pods
#[derive(Clone)]
pub struct PodBuilder {
    namespace: String,
    name: String,
    labels: BTreeMap<String, String>,
    ports: Vec<ContainerPort>,
    sidecar_ports: Vec<ContainerPort>,
    phase: Option<String>,
    ready: Option<Vec<bool>>,
}

impl PodBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels: BTreeMap::new(),
            ports: Vec::new(),
            sidecar_ports: Vec::new(),
            phase: None,
            ready: None,
        }
    }

    /// A Running, ready Pod labelled `auto-service=true` exposing port 80
    pub fn eligible(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name)
            .label("app", name)
            .label("auto-service", "true")
            .port(80, Some("TCP"))
            .phase("Running")
            .ready(&[true])
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn port(mut self, port: i32, protocol: Option<&str>) -> Self {
        self.ports.push(ContainerPort {
            container_port: port,
            protocol: protocol.map(str::to_string),
            ..Default::default()
        });
        self
    }

    /// Port on a second container, which the controller must ignore
    pub fn sidecar_port(mut self, port: i32) -> Self {
        self.sidecar_ports.push(ContainerPort {
            container_port: port,
            ..Default::default()
        });
        self
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    pub fn ready(mut self, ready: &[bool]) -> Self {
        self.ready = Some(ready.to_vec());
        self
    }

    pub fn build(self) -> Pod {
        let mut containers = vec![Container {
            name: "main".to_string(),
            image: Some("nginx:alpine".to_string()),
            ports: Some(self.ports),
            ..Default::default()
        }];
        if !self.sidecar_ports.is_empty() {
            containers.push(Container {
                name: "sidecar".to_string(),
                ports: Some(self.sidecar_ports),
                ..Default::default()
            });
        }

        let container_statuses = self.ready.map(|ready| {
            ready
                .iter()
                .enumerate()
                .map(|(i, ready)| ContainerStatus {
                    name: format!("c{i}"),
                    ready: *ready,
                    ..Default::default()
                })
                .collect()
        });

        Pod {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                labels: (!self.labels.is_empty()).then_some(self.labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers,
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: self.phase,
                container_statuses,
                ..Default::default()
            }),
        }
    }
}
