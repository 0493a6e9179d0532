// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) consumed by the operator.
//!
//! # Resource Types
//!
//! - [`AzureConfig`] - Desired Azure configuration of one tenant cluster. The
//!   operator owns the `instance` entry of its `status.cluster.resources` list.
//! - [`DrainerConfig`] - Request for an external drainer controller to cordon
//!   and evict one tenant node before its VM is removed.
//!
//! # Example: Describing a Tenant Cluster
//!
//! ```rust,no_run
//! use azure_operator::crd::{AzureConfigSpec, AzureSpec, ClusterSpec, NodeSpec, VersionBundle, VirtualNetwork};
//!
//! let spec = AzureConfigSpec {
//!     cluster: ClusterSpec {
//!         id: "x7k2p".to_string(),
//!         api_domain: "api.x7k2p.k8s.example.com".to_string(),
//!         masters: vec![NodeSpec::with_vm_size("Standard_D4s_v3")],
//!         workers: vec![NodeSpec::with_vm_size("Standard_D4s_v3"); 3],
//!     },
//!     azure: AzureSpec {
//!         virtual_network: VirtualNetwork {
//!             cidr: "10.1.0.0/16".to_string(),
//!             master_subnet_cidr: "10.1.0.0/24".to_string(),
//!             worker_subnet_cidr: "10.1.1.0/24".to_string(),
//!         },
//!     },
//!     version_bundle: VersionBundle { version: "4.2.0".to_string() },
//! };
//! ```

use crate::constants::{
    CLUSTER_CONDITION_CREATING, CONDITION_STATUS_TRUE, DRAINER_CONDITION_DRAINED,
    DRAINER_CONDITION_TIMEOUT,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// AzureConfig
// ============================================================================

/// Desired Azure infrastructure of a tenant cluster.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "provider.giantswarm.io",
    version = "v1alpha1",
    kind = "AzureConfig",
    namespaced,
    doc = "AzureConfig describes the Azure infrastructure of a tenant Kubernetes cluster: master and worker scale sets, networking and the release version the nodes must run."
)]
#[kube(status = "AzureConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct AzureConfigSpec {
    /// Tenant cluster topology.
    pub cluster: ClusterSpec,

    /// Azure specific settings.
    pub azure: AzureSpec,

    /// Release the cluster's nodes must be provisioned with.
    pub version_bundle: VersionBundle,
}

/// Tenant cluster topology.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster ID. Also used as the Azure resource group name and the
    /// namespace holding the cluster's secrets and drainer configs.
    pub id: String,

    /// Domain of the tenant Kubernetes API.
    #[serde(default)]
    pub api_domain: String,

    /// One entry per master node.
    #[serde(default)]
    pub masters: Vec<NodeSpec>,

    /// One entry per worker node. The length is the desired worker count.
    #[serde(default)]
    pub workers: Vec<NodeSpec>,
}

/// Shape of a single VM.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Azure VM size, e.g. `Standard_D4s_v3`.
    pub vm_size: String,

    /// Size of the docker data disk.
    #[serde(
        default,
        rename = "dockerVolumeSizeGB",
        skip_serializing_if = "Option::is_none"
    )]
    pub docker_volume_size_gb: Option<i32>,

    /// Size of the kubelet data disk.
    #[serde(
        default,
        rename = "kubeletVolumeSizeGB",
        skip_serializing_if = "Option::is_none"
    )]
    pub kubelet_volume_size_gb: Option<i32>,
}

impl NodeSpec {
    /// Node with the given VM size and default disks.
    #[must_use]
    pub fn with_vm_size(vm_size: &str) -> Self {
        Self {
            vm_size: vm_size.to_string(),
            ..Default::default()
        }
    }
}

/// Azure specific settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureSpec {
    /// Virtual network layout.
    pub virtual_network: VirtualNetwork,
}

/// Virtual network layout of the cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    /// CIDR of the whole virtual network.
    pub cidr: String,

    /// CIDR of the master subnet.
    pub master_subnet_cidr: String,

    /// CIDR of the worker subnet.
    pub worker_subnet_cidr: String,
}

/// Release version reference.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct VersionBundle {
    /// Release version, e.g. `4.2.0`.
    pub version: String,
}

/// Status of an `AzureConfig`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct AzureConfigStatus {
    /// Cluster level status shared by all controllers acting on the resource.
    #[serde(default)]
    pub cluster: ClusterStatus,
}

/// Cluster level status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct ClusterStatus {
    /// Lifecycle conditions (`Creating`, `Created`, `Updating`, `Updated`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,

    /// Per-resource bookkeeping. Each controller resource owns one entry by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceStatus>,
}

/// Cluster lifecycle condition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Condition type.
    pub r#type: String,

    /// "True", "False" or "Unknown".
    pub status: String,

    /// RFC3339 timestamp of the last status change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Named bookkeeping entry inside `status.cluster.resources`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct ResourceStatus {
    /// Name of the owning controller resource.
    pub name: String,

    /// Key/value pairs stored as conditions.
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// A `{type, status}` pair persisted by a controller resource.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct StatusCondition {
    /// Key.
    pub r#type: String,

    /// Value.
    pub status: String,
}

impl AzureConfig {
    /// Tenant cluster ID.
    #[must_use]
    pub fn cluster_id(&self) -> &str {
        &self.spec.cluster.id
    }

    /// Azure resource group holding the cluster's resources.
    #[must_use]
    pub fn resource_group(&self) -> &str {
        &self.spec.cluster.id
    }

    /// Release version the nodes must run.
    #[must_use]
    pub fn desired_version(&self) -> &str {
        &self.spec.version_bundle.version
    }

    /// Desired number of worker VMs.
    #[must_use]
    pub fn worker_count(&self) -> i64 {
        i64::try_from(self.spec.cluster.workers.len()).unwrap_or(i64::MAX)
    }

    /// Whether the cluster controller still reports the cluster as being created.
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            status.cluster.conditions.iter().any(|condition| {
                condition.r#type == CLUSTER_CONDITION_CREATING
                    && condition.status == CONDITION_STATUS_TRUE
            })
        })
    }

    /// `namespace/name` used in log lines.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}

// ============================================================================
// DrainerConfig
// ============================================================================

/// Drain request for one tenant node.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.giantswarm.io",
    version = "v1alpha1",
    kind = "DrainerConfig",
    namespaced,
    doc = "DrainerConfig asks the node drainer to cordon a tenant node and evict its workloads. The drainer reports the outcome through the Drained and Timeout conditions."
)]
#[kube(status = "DrainerConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct DrainerConfigSpec {
    /// Tenant cluster and node to drain.
    pub guest: DrainerGuest,

    /// Release version of the operator that requested the drain.
    #[serde(default)]
    pub version_bundle: VersionBundle,
}

/// Target of a drain request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct DrainerGuest {
    /// Tenant cluster reference.
    pub cluster: DrainerGuestCluster,

    /// Node reference.
    pub node: DrainerGuestNode,
}

/// Tenant cluster reference of a drain request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct DrainerGuestCluster {
    /// Cluster ID.
    pub id: String,

    /// Tenant API endpoint.
    pub api: DrainerGuestClusterApi,
}

/// Tenant API endpoint of a drain request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct DrainerGuestClusterApi {
    /// API domain.
    pub domain: String,
}

/// Node reference of a drain request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct DrainerGuestNode {
    /// Kubernetes node name.
    pub name: String,
}

/// Status written by the drainer controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct DrainerConfigStatus {
    /// `Drained` and `Timeout` conditions.
    #[serde(default)]
    pub conditions: Vec<DrainerCondition>,
}

/// Drainer condition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrainerCondition {
    /// Condition type.
    pub r#type: String,

    /// "True" or "False".
    pub status: String,

    /// RFC3339 timestamp of the last heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<String>,

    /// RFC3339 timestamp of the last status change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl DrainerConfigStatus {
    fn has_condition(&self, condition_type: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.r#type == condition_type && c.status == CONDITION_STATUS_TRUE)
    }

    /// The node has been drained.
    #[must_use]
    pub fn has_drained_condition(&self) -> bool {
        self.has_condition(DRAINER_CONDITION_DRAINED)
    }

    /// The drainer gave up on the node.
    #[must_use]
    pub fn has_timeout_condition(&self) -> bool {
        self.has_condition(DRAINER_CONDITION_TIMEOUT)
    }
}

impl DrainerConfig {
    /// Name of the node this drain request targets.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.spec.guest.node.name
    }

    /// The drainer reported the node drained.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(DrainerConfigStatus::has_drained_condition)
    }

    /// Whether the drainer timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(DrainerConfigStatus::has_timeout_condition)
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
