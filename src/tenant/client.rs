// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! kube-rs implementations of the tenant cluster facade.

use super::{DrainerApi, TenantCluster, TenantClusterFactory, TenantNode};
use crate::constants::{KUBECONFIG_SECRET_KEY, KUBECONFIG_SECRET_SUFFIX};
use crate::crd::{
    AzureConfig, DrainerConfig, DrainerConfigSpec, DrainerGuest, DrainerGuestCluster,
    DrainerGuestClusterApi, DrainerGuestNode, VersionBundle,
};
use crate::errors::{is_kube_status, Error, Result};
use crate::labels::{CLUSTER_ID_LABEL, K8S_MANAGED_BY, MANAGED_BY_AZURE_OPERATOR, VERSION_LABEL};
use k8s_openapi::api::core::v1::{Node, Secret};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Convert a Kubernetes node into a [`TenantNode`].
#[must_use]
pub fn tenant_node_from(node: &Node) -> TenantNode {
    let ready = node
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        });

    TenantNode {
        name: node.metadata.name.clone().unwrap_or_default(),
        ready,
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|spec| spec.unschedulable)
            .unwrap_or(false),
        labels: node.metadata.labels.clone().unwrap_or_default(),
    }
}

/// Tenant cluster reached through its admin kubeconfig.
pub struct KubeTenantCluster {
    cluster_id: String,
    client: Client,
}

impl KubeTenantCluster {
    /// Anything but an API status means the endpoint could not be reached.
    fn classify(&self, err: kube::Error) -> Error {
        match err {
            api @ kube::Error::Api(_) => Error::Kube(api),
            other => Error::TenantClusterUnavailable {
                cluster_id: self.cluster_id.clone(),
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
impl TenantCluster for KubeTenantCluster {
    async fn list_nodes(&self) -> Result<Vec<TenantNode>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| self.classify(e))?;

        debug!(
            cluster_id = %self.cluster_id,
            count = nodes.items.len(),
            "Listed tenant nodes"
        );
        Ok(nodes.items.iter().map(tenant_node_from).collect())
    }

    async fn cordon_node(&self, name: &str) -> Result<()> {
        let api: Api<Node> = Api::all(self.client.clone());
        let patch = json!({ "spec": { "unschedulable": true } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| self.classify(e))?;

        info!(cluster_id = %self.cluster_id, node = name, "Cordoned tenant node");
        Ok(())
    }
}

/// Builds tenant clients from the `<cluster_id>-kubeconfig` secret and caches them.
pub struct KubeTenantClusterFactory {
    client: Client,
    cache: RwLock<HashMap<String, Arc<dyn TenantCluster>>>,
}

impl KubeTenantClusterFactory {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn build(&self, cluster_id: &str) -> Result<KubeTenantCluster> {
        let unavailable = |reason: String| Error::TenantClusterUnavailable {
            cluster_id: cluster_id.to_string(),
            reason,
        };

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), cluster_id);
        let secret_name = format!("{cluster_id}-{KUBECONFIG_SECRET_SUFFIX}");
        let secret = secrets
            .get_opt(&secret_name)
            .await?
            .ok_or_else(|| unavailable(format!("secret '{secret_name}' not found")))?;

        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
            .ok_or_else(|| {
                unavailable(format!(
                    "secret '{secret_name}' has no '{KUBECONFIG_SECRET_KEY}' key"
                ))
            })?;
        let yaml = std::str::from_utf8(&raw.0)
            .map_err(|e| unavailable(format!("kubeconfig is not UTF-8: {e}")))?;

        let kubeconfig =
            Kubeconfig::from_yaml(yaml).map_err(|e| unavailable(e.to_string()))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let client = Client::try_from(config).map_err(|e| unavailable(e.to_string()))?;

        info!(cluster_id = cluster_id, "Built tenant cluster client");
        Ok(KubeTenantCluster {
            cluster_id: cluster_id.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl TenantClusterFactory for KubeTenantClusterFactory {
    async fn for_cluster(&self, cr: &AzureConfig) -> Result<Arc<dyn TenantCluster>> {
        let cluster_id = cr.cluster_id();

        if let Some(cached) = self.cache.read().await.get(cluster_id) {
            return Ok(cached.clone());
        }

        let tenant: Arc<dyn TenantCluster> = Arc::new(self.build(cluster_id).await?);
        self.cache
            .write()
            .await
            .insert(cluster_id.to_string(), tenant.clone());
        Ok(tenant)
    }

    async fn invalidate(&self, cluster_id: &str) {
        if self.cache.write().await.remove(cluster_id).is_some() {
            warn!(cluster_id = cluster_id, "Dropped cached tenant cluster client");
        }
    }
}

/// Desired `DrainerConfig` for a node of the cluster.
#[must_use]
pub fn build_drainer_config(cr: &AzureConfig, node_name: &str) -> DrainerConfig {
    let mut drainer = DrainerConfig::new(
        node_name,
        DrainerConfigSpec {
            guest: DrainerGuest {
                cluster: DrainerGuestCluster {
                    id: cr.cluster_id().to_string(),
                    api: DrainerGuestClusterApi {
                        domain: cr.spec.cluster.api_domain.clone(),
                    },
                },
                node: DrainerGuestNode {
                    name: node_name.to_string(),
                },
            },
            version_bundle: VersionBundle {
                version: cr.desired_version().to_string(),
            },
        },
    );

    let mut labels = BTreeMap::new();
    labels.insert(CLUSTER_ID_LABEL.to_string(), cr.cluster_id().to_string());
    labels.insert(VERSION_LABEL.to_string(), cr.desired_version().to_string());
    labels.insert(
        K8S_MANAGED_BY.to_string(),
        MANAGED_BY_AZURE_OPERATOR.to_string(),
    );

    drainer.metadata.namespace = Some(cr.cluster_id().to_string());
    drainer.metadata.labels = Some(labels);
    drainer
}

/// `DrainerConfig` access on the control plane cluster.
pub struct KubeDrainerApi {
    client: Client,
}

impl KubeDrainerApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, cluster_id: &str) -> Api<DrainerConfig> {
        Api::namespaced(self.client.clone(), cluster_id)
    }
}

#[async_trait::async_trait]
impl DrainerApi for KubeDrainerApi {
    async fn list(&self, cluster_id: &str) -> Result<Vec<DrainerConfig>> {
        let params = ListParams::default().labels(&format!("{CLUSTER_ID_LABEL}={cluster_id}"));
        let list = self.api(cluster_id).list(&params).await?;
        Ok(list.items)
    }

    async fn create(&self, cr: &AzureConfig, node_name: &str) -> Result<()> {
        let drainer = build_drainer_config(cr, node_name);
        match self
            .api(cr.cluster_id())
            .create(&PostParams::default(), &drainer)
            .await
        {
            Ok(_) => {
                info!(
                    cluster_id = cr.cluster_id(),
                    node = node_name,
                    "Created drainer config"
                );
                Ok(())
            }
            Err(e) if is_kube_status(&e, 409) => {
                debug!(
                    cluster_id = cr.cluster_id(),
                    node = node_name,
                    "Drainer config already exists"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, cluster_id: &str, node_name: &str) -> Result<()> {
        match self
            .api(cluster_id)
            .delete(node_name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!(
                    cluster_id = cluster_id,
                    node = node_name,
                    "Deleted drainer config"
                );
                Ok(())
            }
            Err(e) if is_kube_status(&e, 404) => Err(Error::DrainerConfigNotFound {
                namespace: cluster_id.to_string(),
                name: node_name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
