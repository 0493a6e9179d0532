// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired ARM deployment of a tenant cluster.
//!
//! The main deployment creates the cluster's virtual network and the master
//! and worker scale sets from a versioned template. The template is addressed
//! by link so that every operator release ships its own.

use crate::azure::{DeploymentMode, DeploymentParameter, DeploymentProperties, TemplateLink};
use crate::constants::{
    IGNITION_SECRET_MASTER_KEY, IGNITION_SECRET_SUFFIX, IGNITION_SECRET_WORKER_KEY,
    KUBERNETES_API_SECURE_PORT, TEMPLATE_CONTENT_VERSION,
};
use crate::crd::AzureConfig;
use crate::errors::{Error, Result};
use crate::tenant::Role;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::debug;

/// Blob URLs of the master and worker ignition configs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnitionUrls {
    pub master: String,
    pub worker: String,
}

/// Where the ignition blob URLs of a cluster are published.
#[async_trait::async_trait]
pub trait IgnitionSource: Send + Sync {
    /// Fails with [`Error::IgnitionBlobNotFound`] until both URLs exist.
    async fn ignition_urls(&self, cr: &AzureConfig) -> Result<IgnitionUrls>;
}

/// Reads the URLs from the `<cluster_id>-ignition` secret.
pub struct KubeIgnitionSource {
    client: Client,
}

impl KubeIgnitionSource {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IgnitionSource for KubeIgnitionSource {
    async fn ignition_urls(&self, cr: &AzureConfig) -> Result<IgnitionUrls> {
        let cluster_id = cr.cluster_id();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), cluster_id);
        let secret = secrets
            .get_opt(&format!("{cluster_id}-{IGNITION_SECRET_SUFFIX}"))
            .await?;

        let data = secret.and_then(|s| s.data).unwrap_or_default();
        let url = |role: Role, key: &str| -> Result<String> {
            data.get(key)
                .and_then(|value| String::from_utf8(value.0.clone()).ok())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::IgnitionBlobNotFound {
                    cluster_id: cluster_id.to_string(),
                    role: role.to_string(),
                })
        };

        Ok(IgnitionUrls {
            master: url(Role::Master, IGNITION_SECRET_MASTER_KEY)?,
            worker: url(Role::Worker, IGNITION_SECRET_WORKER_KEY)?,
        })
    }
}

/// Builds the main deployment for a cluster.
#[derive(Clone, Debug)]
pub struct DeploymentBuilder {
    template_base_uri: String,
    operator_version: String,
}

impl DeploymentBuilder {
    #[must_use]
    pub fn new(template_base_uri: &str, operator_version: &str) -> Self {
        Self {
            template_base_uri: template_base_uri.trim_end_matches('/').to_string(),
            operator_version: operator_version.to_string(),
        }
    }

    /// Link to the template of this operator release.
    #[must_use]
    pub fn template_uri(&self) -> String {
        format!("{}/{}/main.json", self.template_base_uri, self.operator_version)
    }

    /// Deployment the cluster should currently have.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::IgnitionBlobNotFound`] from `ignition` and
    /// serialization failures of the node specs.
    pub async fn desired(
        &self,
        cr: &AzureConfig,
        ignition: &dyn IgnitionSource,
    ) -> Result<DeploymentProperties> {
        let urls = ignition.ignition_urls(cr).await?;
        self.build(cr, &urls)
    }

    /// Deployment for the given ignition URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if the node specs cannot be serialized.
    pub fn build(&self, cr: &AzureConfig, ignition: &IgnitionUrls) -> Result<DeploymentProperties> {
        let network = &cr.spec.azure.virtual_network;
        let mut parameters = BTreeMap::new();
        let mut add = |name: &str, value: serde_json::Value| {
            parameters.insert(name.to_string(), DeploymentParameter::new(value));
        };

        add("clusterID", cr.cluster_id().into());
        add("azureOperatorVersion", self.operator_version.clone().into());
        add("versionBundleVersion", cr.desired_version().into());
        add("masterNodes", serde_json::to_value(&cr.spec.cluster.masters)?);
        add("workerNodes", serde_json::to_value(&cr.spec.cluster.workers)?);
        add("workerCount", cr.worker_count().into());
        add("vnetCidr", network.cidr.clone().into());
        add("masterSubnetCidr", network.master_subnet_cidr.clone().into());
        add("workerSubnetCidr", network.worker_subnet_cidr.clone().into());
        add("kubernetesAPISecurePort", KUBERNETES_API_SECURE_PORT.into());
        add("masterCloudConfigData", ignition.master.clone().into());
        add("workerCloudConfigData", ignition.worker.clone().into());

        debug!(
            cluster_id = cr.cluster_id(),
            parameters = parameters.len(),
            "Built desired deployment"
        );

        Ok(DeploymentProperties {
            template: None,
            template_link: Some(TemplateLink {
                uri: self.template_uri(),
                content_version: TEMPLATE_CONTENT_VERSION.to_string(),
            }),
            parameters,
            mode: DeploymentMode::Incremental,
            provisioning_state: None,
        })
    }
}

#[cfg(test)]
#[path = "deployment_tests.rs"]
mod deployment_tests;
