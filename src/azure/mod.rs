// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager facade.
//!
//! The instance reconciler talks to Azure exclusively through the [`AzureApi`]
//! trait so transitions can be exercised against in-memory fakes.
//! [`ArmClient`] is the production implementation on top of the ARM REST API.
//!
//! Long-running ARM operations (deployments, reimages, scale changes) are only
//! *started* here. Callers observe their progress on later reconcile passes
//! through [`AzureApi::get_deployment`] and [`VmssInstance::provisioning_state`].

pub mod arm;

pub use arm::{ArmClient, AzureCredentials};

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// ARM provisioning state of a deployment, scale set or scale set instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Creating,
    Updating,
    Running,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
    /// Any state this operator does not know about. Treated as in progress.
    #[serde(other)]
    Unknown,
}

impl ProvisioningState {
    /// ARM will not change this state without a new request.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The resource needs a fresh request to make progress.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }
}

/// The parts of a scale set the reconciler looks at.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualMachineScaleSet {
    pub name: String,
    /// Number of instances the scale set is asked to run.
    pub capacity: i64,
    pub provisioning_state: ProvisioningState,
}

/// A single VM of a scale set.
#[derive(Clone, Debug, PartialEq)]
pub struct VmssInstance {
    /// Decimal instance ID, unique within the scale set.
    pub instance_id: String,
    pub name: String,
    /// `false` when the instance still runs an older scale set model.
    pub latest_model_applied: bool,
    pub provisioning_state: ProvisioningState,
}

/// ARM deployment mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    #[default]
    Incremental,
    Complete,
}

/// Remote template reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateLink {
    pub uri: String,
    pub content_version: String,
}

/// One ARM deployment parameter, `{"value": ...}` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentParameter {
    pub value: Value,
}

impl DeploymentParameter {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Deployment properties, as submitted and as reported back by ARM.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    /// Inline template. Mutually exclusive with `template_link`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_link: Option<TemplateLink>,

    #[serde(default)]
    pub parameters: BTreeMap<String, DeploymentParameter>,

    #[serde(default)]
    pub mode: DeploymentMode,

    /// Only present on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}

/// An ARM deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub name: String,
    pub properties: DeploymentProperties,
}

impl Deployment {
    /// Provisioning state, `Unknown` when ARM did not report one.
    #[must_use]
    pub fn provisioning_state(&self) -> ProvisioningState {
        self.properties
            .provisioning_state
            .clone()
            .unwrap_or(ProvisioningState::Unknown)
    }
}

/// Operations the instance reconciler needs from Azure.
///
/// Lookups of missing objects return the matching not-found error
/// ([`crate::errors::Error::VmssNotFound`], [`crate::errors::Error::DeploymentNotFound`]).
#[async_trait::async_trait]
pub trait AzureApi: Send + Sync {
    async fn get_vmss(&self, resource_group: &str, name: &str) -> Result<VirtualMachineScaleSet>;

    async fn delete_vmss(&self, resource_group: &str, name: &str) -> Result<()>;

    async fn list_vmss_instances(&self, resource_group: &str, name: &str)
        -> Result<Vec<VmssInstance>>;

    /// Change the number of instances of a scale set.
    async fn update_vmss_capacity(
        &self,
        resource_group: &str,
        name: &str,
        capacity: i64,
    ) -> Result<()>;

    /// Apply the latest scale set model to the given instances.
    async fn update_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()>;

    /// Re-provision the OS disk of the given instances.
    async fn reimage_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()>;

    /// Remove the given instances from the scale set.
    async fn delete_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()>;

    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment>;

    /// Submit a deployment. Returns once ARM accepted it, not once it finished.
    async fn create_or_update_deployment(
        &self,
        resource_group: &str,
        name: &str,
        properties: &DeploymentProperties,
    ) -> Result<()>;
}
