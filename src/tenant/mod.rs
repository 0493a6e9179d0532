// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tenant cluster facade.
//!
//! The instance reconciler needs three things from Kubernetes besides the
//! `AzureConfig` itself:
//!
//! - the nodes of the tenant cluster (readiness, cordon state and the release
//!   version label), through [`TenantCluster`];
//! - a client for a given tenant cluster, through [`TenantClusterFactory`];
//! - `DrainerConfig` objects on the control plane cluster, through
//!   [`DrainerApi`].
//!
//! [`client`] holds the kube-rs implementations.

pub mod client;

pub use client::{KubeDrainerApi, KubeTenantClusterFactory};

use crate::constants::INSTANCE_SUFFIX_WIDTH;
use crate::crd::{AzureConfig, DrainerConfig};
use crate::errors::{Error, Result};
use crate::labels::{NODE_ROLE_LABEL, VERSION_LABEL};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Node role inside a tenant cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => crate::labels::ROLE_MASTER,
            Self::Worker => crate::labels::ROLE_WORKER,
        }
    }

    /// Name of the scale set holding the nodes of this role.
    #[must_use]
    pub fn vmss_name(self, cluster_id: &str) -> String {
        format!("{cluster_id}-{}", self.as_str())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the reconciler knows about a tenant node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TenantNode {
    pub name: String,
    /// `Ready` condition is `True`.
    pub ready: bool,
    /// Node is cordoned.
    pub unschedulable: bool,
    pub labels: BTreeMap<String, String>,
}

impl TenantNode {
    /// Value of the `kubernetes.io/role` label.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.labels.get(NODE_ROLE_LABEL).map(String::as_str)
    }

    /// Release version the node was provisioned with.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.labels.get(VERSION_LABEL).map(String::as_str)
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role.as_str())
    }
}

/// Map node name to the release version label, for nodes that carry one.
#[must_use]
pub fn node_versions(nodes: &[TenantNode]) -> BTreeMap<String, String> {
    nodes
        .iter()
        .filter_map(|node| {
            node.version()
                .map(|version| (node.name.clone(), version.to_string()))
        })
        .collect()
}

/// Kubernetes API of one tenant cluster.
#[async_trait::async_trait]
pub trait TenantCluster: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<TenantNode>>;

    /// Mark the node unschedulable.
    async fn cordon_node(&self, name: &str) -> Result<()>;
}

/// Builds [`TenantCluster`] clients.
#[async_trait::async_trait]
pub trait TenantClusterFactory: Send + Sync {
    /// Client for the tenant cluster described by `cr`.
    ///
    /// Fails with [`Error::TenantClusterUnavailable`] while the cluster's
    /// credentials are not published yet.
    async fn for_cluster(&self, cr: &AzureConfig) -> Result<Arc<dyn TenantCluster>>;

    /// Forget any cached client for the cluster.
    async fn invalidate(&self, _cluster_id: &str) {}
}

/// `DrainerConfig` objects on the control plane cluster.
#[async_trait::async_trait]
pub trait DrainerApi: Send + Sync {
    /// All drainer configs of the cluster.
    async fn list(&self, cluster_id: &str) -> Result<Vec<DrainerConfig>>;

    /// Request a drain of the node. Creating an existing request is not an error.
    async fn create(&self, cr: &AzureConfig, node_name: &str) -> Result<()>;

    /// Fails with [`Error::DrainerConfigNotFound`] when there is nothing to delete.
    async fn delete(&self, cluster_id: &str, node_name: &str) -> Result<()>;
}

/// Render a number in lowercase base 36.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Kubernetes node name of a scale set instance.
///
/// Azure names scale set VMs `<computer name prefix><base36 instance id>`
/// with the suffix zero-padded to six characters. The computer name prefix
/// is `<cluster id>-<role>-`.
///
/// # Errors
///
/// Returns [`Error::InvalidInstanceId`] if `instance_id` is not a decimal number.
pub fn instance_node_name(cluster_id: &str, role: Role, instance_id: &str) -> Result<String> {
    let id: u64 = instance_id
        .parse()
        .map_err(|_| Error::InvalidInstanceId(instance_id.to_string()))?;

    Ok(format!(
        "{cluster_id}-{role}-{:0>width$}",
        to_base36(id),
        width = INSTANCE_SUFFIX_WIDTH
    ))
}
