// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persisted reconciler state on the `AzureConfig` status.
//!
//! The instance reconciler has no memory between passes other than what it
//! writes here: the current stage and the checksums of the last submitted
//! deployment. They live as conditions of the `instance` entry of
//! `status.cluster.resources`:
//!
//! ```yaml
//! status:
//!   cluster:
//!     resources:
//!     - name: instance
//!       conditions:
//!       - type: Stage
//!         status: DeploymentCompleted
//!       - type: DeploymentTemplateChecksum
//!         status: 3f1c...
//! ```
//!
//! Other resource entries belong to other controllers and are never touched.

use super::retry::retry_on_conflict;
use crate::constants::INSTANCE_RESOURCE_NAME;
use crate::crd::{AzureConfig, AzureConfigStatus, StatusCondition};
use crate::errors::{Error, Result};
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Conditions of one resource entry, keyed by type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConditionTable {
    conditions: BTreeMap<String, String>,
}

impl ConditionTable {
    #[must_use]
    pub fn from_conditions(conditions: &[StatusCondition]) -> Self {
        Self {
            conditions: conditions
                .iter()
                .map(|c| (c.r#type.clone(), c.status.clone()))
                .collect(),
        }
    }

    /// Value of the condition, `""` when absent.
    #[must_use]
    pub fn get(&self, condition_type: &str) -> &str {
        self.conditions
            .get(condition_type)
            .map_or("", String::as_str)
    }
}

/// Conditions of the `instance` entry.
#[must_use]
pub fn instance_conditions(status: Option<&AzureConfigStatus>) -> ConditionTable {
    status
        .and_then(|s| {
            s.cluster
                .resources
                .iter()
                .find(|r| r.name == INSTANCE_RESOURCE_NAME)
        })
        .map(|r| ConditionTable::from_conditions(&r.conditions))
        .unwrap_or_default()
}

/// `status.cluster.resources` of a raw status, empty when absent.
#[must_use]
pub fn raw_resources(status: Option<&Value>) -> Vec<Value> {
    status
        .and_then(|s| s.pointer("/cluster/resources"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Set one condition of the `instance` entry in a raw resources list,
/// creating the entry if needed.
///
/// Works on JSON values so that keys this operator does not model survive the
/// write, both on foreign entries and on existing conditions.
///
/// Returns whether the list changed.
pub fn set_instance_condition(resources: &mut Vec<Value>, condition_type: &str, value: &str) -> bool {
    let index = match resources
        .iter()
        .position(|r| r.get("name").and_then(Value::as_str) == Some(INSTANCE_RESOURCE_NAME))
    {
        Some(index) => index,
        None => {
            resources.push(json!({ "name": INSTANCE_RESOURCE_NAME, "conditions": [] }));
            resources.len() - 1
        }
    };

    let entry = &mut resources[index];
    if !entry.get("conditions").is_some_and(Value::is_array) {
        entry["conditions"] = json!([]);
    }
    let Some(conditions) = entry["conditions"].as_array_mut() else {
        return false;
    };

    let existing = conditions
        .iter_mut()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type));
    match existing {
        Some(condition) if condition.get("status").and_then(Value::as_str) == Some(value) => false,
        Some(condition) => {
            condition["status"] = Value::String(value.to_string());
            true
        }
        None => {
            conditions.push(json!({ "type": condition_type, "status": value }));
            true
        }
    }
}

/// Reads and writes reconciler state of an `AzureConfig`.
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Stored value, `""` when never written.
    async fn get(&self, cr: &AzureConfig, condition_type: &str) -> Result<String>;

    async fn set(&self, cr: &AzureConfig, condition_type: &str, value: &str) -> Result<()>;
}

/// [`StatusStore`] backed by the Kubernetes API.
///
/// Both operations read the live object rather than the controller's cache so
/// a pass always sees what the previous pass wrote.
pub struct KubeStatusStore {
    client: Client,
}

impl KubeStatusStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, cr: &AzureConfig) -> Api<AzureConfig> {
        Api::namespaced(self.client.clone(), &cr.namespace().unwrap_or_default())
    }

    /// Untyped view of the same resource, so writes keep unmodelled status keys.
    fn raw_api(&self, cr: &AzureConfig) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &cr.namespace().unwrap_or_default(),
            &ApiResource::erase::<AzureConfig>(&()),
        )
    }
}

#[async_trait::async_trait]
impl StatusStore for KubeStatusStore {
    async fn get(&self, cr: &AzureConfig, condition_type: &str) -> Result<String> {
        let current = self.api(cr).get(&cr.name_any()).await?;
        Ok(instance_conditions(current.status.as_ref())
            .get(condition_type)
            .to_string())
    }

    async fn set(&self, cr: &AzureConfig, condition_type: &str, value: &str) -> Result<()> {
        let api = self.raw_api(cr);
        let name = cr.name_any();

        retry_on_conflict(
            || async {
                let current = api.get(&name).await?;
                let resource_version = current.resource_version().ok_or_else(|| {
                    Error::ExecutionFailed(format!("{name} has no resource version"))
                })?;

                let mut resources = raw_resources(current.data.get("status"));
                if !set_instance_condition(&mut resources, condition_type, value) {
                    return Ok(());
                }

                // Only the resources list is sent. Cluster conditions belong to
                // other controllers and are left alone.
                let patch = json!({
                    "metadata": { "resourceVersion": resource_version },
                    "status": { "cluster": { "resources": resources } }
                });
                api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;

                debug!(
                    azure_config = %name,
                    condition = condition_type,
                    value = value,
                    "Updated instance status"
                );
                Ok(())
            },
            "update instance status",
        )
        .await
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
