// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the kube-rs tenant facade.

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use crate::labels::{CLUSTER_ID_LABEL, VERSION_LABEL};
    use crate::tenant::client::*;
    use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeSpec as K8sNodeSpec, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(ready: &str, unschedulable: Option<bool>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("x7k2p-worker-000001".to_string()),
                labels: Some(BTreeMap::from([(
                    "kubernetes.io/role".to_string(),
                    "worker".to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(K8sNodeSpec {
                unschedulable,
                ..Default::default()
            }),
            status: Some(NodeStatus {
                conditions: Some(vec![
                    NodeCondition {
                        type_: "MemoryPressure".to_string(),
                        status: "False".to_string(),
                        ..Default::default()
                    },
                    NodeCondition {
                        type_: "Ready".to_string(),
                        status: ready.to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        }
    }

    fn azure_config() -> AzureConfig {
        let mut cr = AzureConfig::new(
            "x7k2p",
            AzureConfigSpec {
                cluster: ClusterSpec {
                    id: "x7k2p".to_string(),
                    api_domain: "api.x7k2p.example.com".to_string(),
                    masters: vec![],
                    workers: vec![],
                },
                azure: AzureSpec::default(),
                version_bundle: VersionBundle {
                    version: "4.2.0".to_string(),
                },
            },
        );
        cr.metadata.namespace = Some("default".to_string());
        cr
    }

    #[test]
    fn test_tenant_node_from_ready_node() {
        let tenant = tenant_node_from(&node("True", None));
        assert_eq!(tenant.name, "x7k2p-worker-000001");
        assert!(tenant.ready);
        assert!(!tenant.unschedulable);
        assert_eq!(tenant.role(), Some("worker"));
    }

    #[test]
    fn test_tenant_node_from_cordoned_not_ready_node() {
        let tenant = tenant_node_from(&node("Unknown", Some(true)));
        assert!(!tenant.ready);
        assert!(tenant.unschedulable);
    }

    #[test]
    fn test_tenant_node_from_empty_node() {
        let tenant = tenant_node_from(&Node::default());
        assert!(tenant.name.is_empty());
        assert!(!tenant.ready);
        assert!(tenant.labels.is_empty());
    }

    #[test]
    fn test_build_drainer_config() {
        let drainer = build_drainer_config(&azure_config(), "x7k2p-worker-000001");

        assert_eq!(drainer.metadata.name.as_deref(), Some("x7k2p-worker-000001"));
        assert_eq!(drainer.metadata.namespace.as_deref(), Some("x7k2p"));
        let labels = drainer.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[CLUSTER_ID_LABEL], "x7k2p");
        assert_eq!(labels[VERSION_LABEL], "4.2.0");

        assert_eq!(drainer.spec.guest.cluster.id, "x7k2p");
        assert_eq!(drainer.spec.guest.cluster.api.domain, "api.x7k2p.example.com");
        assert_eq!(drainer.node_name(), "x7k2p-worker-000001");
        assert!(drainer.status.is_none());
    }
}
