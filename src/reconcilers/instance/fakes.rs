// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory stand-ins for Azure, tenant clusters, drainer configs, ignition
//! and the status store, used by the instance reconciler tests.

use crate::azure::{
    AzureApi, Deployment, DeploymentProperties, ProvisioningState, VirtualMachineScaleSet,
    VmssInstance,
};
use crate::constants::{CONDITION_STATUS_TRUE, DRAINER_CONDITION_DRAINED, DRAINER_CONDITION_TIMEOUT};
use crate::context::Context;
use crate::crd::{
    AzureConfig, AzureConfigSpec, AzureSpec, ClusterCondition, ClusterSpec, DrainerCondition,
    DrainerConfig, DrainerConfigStatus, NodeSpec, VersionBundle, VirtualNetwork,
};
use crate::deployment::{DeploymentBuilder, IgnitionSource, IgnitionUrls};
use crate::errors::{Error, Result};
use crate::labels::{NODE_ROLE_LABEL, VERSION_LABEL};
use crate::reconcilers::status::StatusStore;
use crate::tenant::client::build_drainer_config;
use crate::tenant::{
    instance_node_name, DrainerApi, Role, TenantCluster, TenantClusterFactory, TenantNode,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER_ID: &str = "x7k2p";
pub const OLD_VERSION: &str = "4.1.0";
pub const NEW_VERSION: &str = "4.2.0";

// ============================================================================
// Builders
// ============================================================================

/// `AzureConfig` with one master and `workers` workers on `version`.
pub fn create_test_azure_config(workers: usize, version: &str) -> AzureConfig {
    let mut cr = AzureConfig::new(
        CLUSTER_ID,
        AzureConfigSpec {
            cluster: ClusterSpec {
                id: CLUSTER_ID.to_string(),
                api_domain: format!("api.{CLUSTER_ID}.k8s.example.com"),
                masters: vec![NodeSpec::with_vm_size("Standard_D4s_v3")],
                workers: vec![NodeSpec::with_vm_size("Standard_D4s_v3"); workers],
            },
            azure: AzureSpec {
                virtual_network: VirtualNetwork {
                    cidr: "10.1.0.0/16".to_string(),
                    master_subnet_cidr: "10.1.0.0/24".to_string(),
                    worker_subnet_cidr: "10.1.1.0/24".to_string(),
                },
            },
            version_bundle: VersionBundle {
                version: version.to_string(),
            },
        },
    );
    cr.metadata.namespace = Some("default".to_string());
    cr
}

/// Mark the cluster as still being created.
pub fn with_creating_condition(mut cr: AzureConfig) -> AzureConfig {
    let mut status = cr.status.unwrap_or_default();
    status.cluster.conditions.push(ClusterCondition {
        r#type: "Creating".to_string(),
        status: CONDITION_STATUS_TRUE.to_string(),
        last_transition_time: None,
    });
    cr.status = Some(status);
    cr
}

pub fn create_test_instance(id: &str, latest_model_applied: bool) -> VmssInstance {
    VmssInstance {
        instance_id: id.to_string(),
        name: format!("{CLUSTER_ID}_{id}"),
        latest_model_applied,
        provisioning_state: ProvisioningState::Succeeded,
    }
}

pub fn create_test_vmss(name: &str, capacity: i64) -> VirtualMachineScaleSet {
    VirtualMachineScaleSet {
        name: name.to_string(),
        capacity,
        provisioning_state: ProvisioningState::Succeeded,
    }
}

/// Tenant node of the scale set instance `id`.
pub fn create_test_node(role: Role, id: &str, version: &str, ready: bool) -> TenantNode {
    let mut labels = BTreeMap::new();
    labels.insert(NODE_ROLE_LABEL.to_string(), role.as_str().to_string());
    labels.insert(VERSION_LABEL.to_string(), version.to_string());
    TenantNode {
        name: instance_node_name(CLUSTER_ID, role, id).unwrap(),
        ready,
        unschedulable: false,
        labels,
    }
}

pub fn test_ignition_urls() -> IgnitionUrls {
    IgnitionUrls {
        master: "https://x7k2pignition.blob.core.windows.net/ignition/master?sig=first".to_string(),
        worker: "https://x7k2pignition.blob.core.windows.net/ignition/worker?sig=first".to_string(),
    }
}

pub fn test_deployment_builder() -> DeploymentBuilder {
    DeploymentBuilder::new("https://templates.example.com/azure-operator", "5.0.0")
}

// ============================================================================
// Azure
// ============================================================================

#[derive(Default)]
pub struct FakeAzureState {
    pub vmss: BTreeMap<String, VirtualMachineScaleSet>,
    pub instances: BTreeMap<String, Vec<VmssInstance>>,
    pub deployment: Option<Deployment>,
    pub submitted: Vec<DeploymentProperties>,
    /// One line per mutating call, e.g. `reimage x7k2p-master 0`.
    pub calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeAzure {
    pub state: Mutex<FakeAzureState>,
}

impl FakeAzure {
    pub fn add_vmss(&self, role: Role, instances: Vec<VmssInstance>) {
        let name = role.vmss_name(CLUSTER_ID);
        let capacity = i64::try_from(instances.len()).unwrap();
        let mut state = self.state.lock().unwrap();
        state.vmss.insert(name.clone(), create_test_vmss(&name, capacity));
        state.instances.insert(name, instances);
    }

    pub fn set_capacity(&self, role: Role, capacity: i64) {
        let name = role.vmss_name(CLUSTER_ID);
        let mut state = self.state.lock().unwrap();
        state.vmss.get_mut(&name).unwrap().capacity = capacity;
    }

    pub fn set_deployment_state(&self, provisioning_state: ProvisioningState) {
        let mut state = self.state.lock().unwrap();
        let deployment = state.deployment.as_mut().unwrap();
        deployment.properties.provisioning_state = Some(provisioning_state);
    }

    pub fn remove_deployment(&self) {
        self.state.lock().unwrap().deployment = None;
    }

    pub fn instances(&self, role: Role) -> Vec<VmssInstance> {
        let state = self.state.lock().unwrap();
        state
            .instances
            .get(&role.vmss_name(CLUSTER_ID))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn submitted(&self) -> Vec<DeploymentProperties> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn vmss_not_found(resource_group: &str, name: &str) -> Error {
        Error::VmssNotFound {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AzureApi for FakeAzure {
    async fn get_vmss(&self, resource_group: &str, name: &str) -> Result<VirtualMachineScaleSet> {
        let state = self.state.lock().unwrap();
        state
            .vmss
            .get(name)
            .cloned()
            .ok_or_else(|| Self::vmss_not_found(resource_group, name))
    }

    async fn delete_vmss(&self, resource_group: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.vmss.remove(name).is_none() {
            return Err(Self::vmss_not_found(resource_group, name));
        }
        state.instances.remove(name);
        state.calls.push(format!("delete_vmss {name}"));
        Ok(())
    }

    async fn list_vmss_instances(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Vec<VmssInstance>> {
        let state = self.state.lock().unwrap();
        if !state.vmss.contains_key(name) {
            return Err(Self::vmss_not_found(resource_group, name));
        }
        Ok(state.instances.get(name).cloned().unwrap_or_default())
    }

    async fn update_vmss_capacity(
        &self,
        resource_group: &str,
        name: &str,
        capacity: i64,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let vmss = state
            .vmss
            .get_mut(name)
            .ok_or_else(|| Self::vmss_not_found(resource_group, name))?;
        vmss.capacity = capacity;
        state.calls.push(format!("capacity {name} {capacity}"));
        Ok(())
    }

    async fn update_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let instances = state
            .instances
            .get_mut(vmss)
            .ok_or_else(|| Self::vmss_not_found(resource_group, vmss))?;
        for instance in instances
            .iter_mut()
            .filter(|i| instance_ids.contains(&i.instance_id))
        {
            instance.latest_model_applied = true;
        }
        state
            .calls
            .push(format!("update {vmss} {}", instance_ids.join(",")));
        Ok(())
    }

    async fn reimage_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.vmss.contains_key(vmss) {
            return Err(Self::vmss_not_found(resource_group, vmss));
        }
        state
            .calls
            .push(format!("reimage {vmss} {}", instance_ids.join(",")));
        Ok(())
    }

    async fn delete_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let instances = state
            .instances
            .get_mut(vmss)
            .ok_or_else(|| Self::vmss_not_found(resource_group, vmss))?;
        instances.retain(|i| !instance_ids.contains(&i.instance_id));
        state
            .calls
            .push(format!("delete {vmss} {}", instance_ids.join(",")));
        Ok(())
    }

    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment> {
        let state = self.state.lock().unwrap();
        state
            .deployment
            .clone()
            .filter(|d| d.name == name)
            .ok_or_else(|| Error::DeploymentNotFound {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            })
    }

    async fn create_or_update_deployment(
        &self,
        _resource_group: &str,
        name: &str,
        properties: &DeploymentProperties,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut accepted = properties.clone();
        accepted.provisioning_state = Some(ProvisioningState::Accepted);
        state.deployment = Some(Deployment {
            name: name.to_string(),
            properties: accepted,
        });
        state.submitted.push(properties.clone());
        state.calls.push(format!("deploy {name}"));
        Ok(())
    }
}

// ============================================================================
// Tenant cluster
// ============================================================================

#[derive(Default)]
pub struct FakeTenantCluster {
    pub nodes: Mutex<Vec<TenantNode>>,
    pub cordoned: Mutex<Vec<String>>,
}

impl FakeTenantCluster {
    pub fn add_node(&self, node: TenantNode) {
        self.nodes.lock().unwrap().push(node);
    }

    pub fn set_ready(&self, name: &str, ready: bool) {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.iter_mut().find(|n| n.name == name) {
            node.ready = ready;
        }
    }

    /// Relabel the node as provisioned with `version`.
    pub fn set_version(&self, name: &str, version: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.iter_mut().find(|n| n.name == name) {
            node.labels
                .insert(VERSION_LABEL.to_string(), version.to_string());
        }
    }

    pub fn cordoned(&self) -> Vec<String> {
        self.cordoned.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TenantCluster for FakeTenantCluster {
    async fn list_nodes(&self) -> Result<Vec<TenantNode>> {
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn cordon_node(&self, name: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.iter_mut().find(|n| n.name == name) {
            node.unschedulable = true;
        }
        self.cordoned.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTenants {
    pub cluster: Arc<FakeTenantCluster>,
    pub unavailable: AtomicBool,
    pub invalidated: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl TenantClusterFactory for FakeTenants {
    async fn for_cluster(&self, cr: &AzureConfig) -> Result<Arc<dyn TenantCluster>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::TenantClusterUnavailable {
                cluster_id: cr.cluster_id().to_string(),
                reason: "kubeconfig secret not found".to_string(),
            });
        }
        let cluster: Arc<dyn TenantCluster> = self.cluster.clone();
        Ok(cluster)
    }

    async fn invalidate(&self, cluster_id: &str) {
        self.invalidated
            .lock()
            .unwrap()
            .push(cluster_id.to_string());
    }
}

// ============================================================================
// Drainer configs
// ============================================================================

#[derive(Default)]
pub struct FakeDrainers {
    pub configs: Mutex<Vec<DrainerConfig>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeDrainers {
    pub fn nodes(&self) -> Vec<String> {
        self.configs
            .lock()
            .unwrap()
            .iter()
            .map(|dc| dc.node_name().to_string())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Report the drain of `node` as finished.
    pub fn mark_drained(&self, node: &str) {
        self.set_condition(node, DRAINER_CONDITION_DRAINED);
    }

    pub fn mark_timed_out(&self, node: &str) {
        self.set_condition(node, DRAINER_CONDITION_TIMEOUT);
    }

    fn set_condition(&self, node: &str, condition_type: &str) {
        let mut configs = self.configs.lock().unwrap();
        let dc = configs
            .iter_mut()
            .find(|dc| dc.node_name() == node)
            .unwrap();
        dc.status = Some(DrainerConfigStatus {
            conditions: vec![DrainerCondition {
                r#type: condition_type.to_string(),
                status: CONDITION_STATUS_TRUE.to_string(),
                ..Default::default()
            }],
        });
    }
}

#[async_trait::async_trait]
impl DrainerApi for FakeDrainers {
    async fn list(&self, _cluster_id: &str) -> Result<Vec<DrainerConfig>> {
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn create(&self, cr: &AzureConfig, node_name: &str) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        if !configs.iter().any(|dc| dc.node_name() == node_name) {
            configs.push(build_drainer_config(cr, node_name));
        }
        Ok(())
    }

    async fn delete(&self, cluster_id: &str, node_name: &str) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        let before = configs.len();
        configs.retain(|dc| dc.node_name() != node_name);
        if configs.len() == before {
            return Err(Error::DrainerConfigNotFound {
                namespace: cluster_id.to_string(),
                name: node_name.to_string(),
            });
        }
        self.deleted.lock().unwrap().push(node_name.to_string());
        Ok(())
    }
}

// ============================================================================
// Ignition and status
// ============================================================================

pub struct FakeIgnition {
    pub urls: Mutex<Option<IgnitionUrls>>,
}

impl Default for FakeIgnition {
    fn default() -> Self {
        Self {
            urls: Mutex::new(Some(test_ignition_urls())),
        }
    }
}

#[async_trait::async_trait]
impl IgnitionSource for FakeIgnition {
    async fn ignition_urls(&self, cr: &AzureConfig) -> Result<IgnitionUrls> {
        self.urls
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::IgnitionBlobNotFound {
                cluster_id: cr.cluster_id().to_string(),
                role: Role::Master.to_string(),
            })
    }
}

/// Status store for a single resource.
#[derive(Default)]
pub struct MemoryStatusStore {
    pub values: Mutex<BTreeMap<String, String>>,
    pub fail_writes: AtomicBool,
}

impl MemoryStatusStore {
    pub fn value(&self, condition_type: &str) -> String {
        self.values
            .lock()
            .unwrap()
            .get(condition_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put(&self, condition_type: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(condition_type.to_string(), value.to_string());
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, _cr: &AzureConfig, condition_type: &str) -> Result<String> {
        Ok(self.value(condition_type))
    }

    async fn set(&self, cr: &AzureConfig, condition_type: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Conflict(cr.cluster_id().to_string()));
        }
        self.put(condition_type, value);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// All fakes plus a [`Context`] wired to them.
pub struct Harness {
    pub azure: Arc<FakeAzure>,
    pub tenants: Arc<FakeTenants>,
    pub drainers: Arc<FakeDrainers>,
    pub ignition: Arc<FakeIgnition>,
    pub status: Arc<MemoryStatusStore>,
    pub ctx: Arc<Context>,
}

impl Harness {
    pub fn new() -> Self {
        let azure = Arc::new(FakeAzure::default());
        let tenants = Arc::new(FakeTenants::default());
        let drainers = Arc::new(FakeDrainers::default());
        let ignition = Arc::new(FakeIgnition::default());
        let status = Arc::new(MemoryStatusStore::default());

        let ctx = Arc::new(Context {
            azure: azure.clone(),
            tenants: tenants.clone(),
            drainers: drainers.clone(),
            ignition: ignition.clone(),
            status: status.clone(),
            deployments: test_deployment_builder(),
        });

        Self {
            azure,
            tenants,
            drainers,
            ignition,
            status,
            ctx,
        }
    }

    pub fn nodes(&self) -> &FakeTenantCluster {
        &self.tenants.cluster
    }
}
