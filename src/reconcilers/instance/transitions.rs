// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transition functions of the instance upgrade protocol.
//!
//! Each function performs at most one round of API calls and returns the next
//! stage. Waiting for Azure or the tenant cluster is expressed by returning the
//! current stage; the controller requeues and the next pass looks again.
//!
//! A node recycle goes through these stages:
//!
//! ```text
//! DeploymentUninitialized -> DeploymentInitialized -> ProvisioningSuccessful
//!   -> ClusterUpgradeRequirementCheck -> MasterInstancesUpgrading
//!   -> WaitForMastersToBecomeReady -> ScaleUpWorkerVMSS -> CordonOldWorkers
//!   -> WaitForWorkersToBecomeReady -> DrainOldWorkerNodes
//!   -> TerminateOldWorkerInstances -> ScaleDownWorkerVMSS -> DeploymentCompleted
//! ```

use super::stage::Stage;
use super::state_machine::StateMachine;
use super::working_set::{next_instance, WorkingSetExt};
use crate::azure::{VirtualMachineScaleSet, VmssInstance};
use crate::checksum::{parameters_checksum, template_checksum};
use crate::constants::{
    CONDITION_PARAMETERS_CHECKSUM, CONDITION_TEMPLATE_CHECKSUM, MAIN_DEPLOYMENT_NAME,
};
use crate::context::Context;
use crate::crd::AzureConfig;
use crate::errors::{Error, ErrorKind, Result};
use crate::tenant::{instance_node_name, node_versions, Role, TenantNode};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Instance upgrade state machine with one transition per [`Stage`].
#[must_use]
pub fn build_state_machine(ctx: Arc<Context>) -> StateMachine<AzureConfig, Stage> {
    let mut machine: StateMachine<AzureConfig, Stage> = StateMachine::new();

    for stage in Stage::ALL {
        let ctx = ctx.clone();
        machine.register(stage, move |cr, current| {
            let ctx = ctx.clone();
            let current = *current;
            async move { run(&ctx, cr, current).await }.boxed()
        });
    }

    machine
}

/// Run the transition of `current`.
///
/// Not-found errors mean a prerequisite is not there yet. They keep the
/// resource in its current stage instead of failing the reconciliation.
///
/// # Errors
///
/// Propagates every error that is not of the not-found class.
pub async fn run(ctx: &Context, cr: &AzureConfig, current: Stage) -> Result<Stage> {
    let result = match current {
        Stage::DeploymentUninitialized => deployment_uninitialized(ctx, cr).await,
        Stage::DeploymentInitialized => deployment_initialized(ctx, cr).await,
        Stage::ProvisioningSuccessful => Ok(Stage::ClusterUpgradeRequirementCheck),
        Stage::ClusterUpgradeRequirementCheck => cluster_upgrade_requirement_check(ctx, cr).await,
        Stage::MasterInstancesUpgrading => master_instances_upgrading(ctx, cr).await,
        Stage::WaitForMastersToBecomeReady => wait_for_masters_to_become_ready(ctx, cr).await,
        Stage::ScaleUpWorkerVMSS => scale_up_worker_vmss(ctx, cr).await,
        Stage::CordonOldWorkers => cordon_old_workers(ctx, cr).await,
        Stage::WaitForWorkersToBecomeReady => wait_for_workers_to_become_ready(ctx, cr).await,
        Stage::DrainOldWorkerNodes => drain_old_worker_nodes(ctx, cr).await,
        Stage::TerminateOldWorkerInstances => terminate_old_worker_instances(ctx, cr).await,
        Stage::ScaleDownWorkerVMSS => scale_down_worker_vmss(ctx, cr).await,
        Stage::DeploymentCompleted => deployment_completed(ctx, cr).await,
    };

    match result {
        Err(e) if e.is_not_found() => {
            if e.is(ErrorKind::TenantClusterUnavailable) {
                ctx.tenants.invalidate(cr.cluster_id()).await;
            }
            info!(
                azure_config = %cr.key(),
                stage = %current,
                reason = %e,
                "Prerequisite not available yet, staying in stage"
            );
            Ok(current)
        }
        other => other,
    }
}

async fn deployment_uninitialized(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let desired = ctx.deployments.desired(cr, ctx.ignition.as_ref()).await?;
    let template = template_checksum(&desired)?;
    let parameters = parameters_checksum(&desired)?;

    ctx.azure
        .create_or_update_deployment(cr.resource_group(), MAIN_DEPLOYMENT_NAME, &desired)
        .await?;

    ctx.status
        .set(cr, CONDITION_TEMPLATE_CHECKSUM, &template)
        .await?;
    ctx.status
        .set(cr, CONDITION_PARAMETERS_CHECKSUM, &parameters)
        .await?;

    info!(
        azure_config = %cr.key(),
        deployment = MAIN_DEPLOYMENT_NAME,
        template_checksum = %template,
        parameters_checksum = %parameters,
        "Submitted main deployment"
    );
    Ok(Stage::DeploymentInitialized)
}

async fn deployment_initialized(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let deployment = ctx
        .azure
        .get_deployment(cr.resource_group(), MAIN_DEPLOYMENT_NAME)
        .await?;
    let state = deployment.provisioning_state();

    if state.is_succeeded() {
        return Ok(Stage::ProvisioningSuccessful);
    }
    if state.is_failed() {
        warn!(
            azure_config = %cr.key(),
            state = ?state,
            "Main deployment failed, resubmitting"
        );
        return Ok(Stage::DeploymentUninitialized);
    }

    debug!(azure_config = %cr.key(), state = ?state, "Main deployment in progress");
    Ok(Stage::DeploymentInitialized)
}

async fn cluster_upgrade_requirement_check(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    if cr.is_creating() {
        info!(azure_config = %cr.key(), "Cluster is being created, no upgrade needed");
        return Ok(Stage::DeploymentCompleted);
    }

    let desired = cr.worker_count();
    let workers = list_instances_or_empty(ctx, cr, Role::Worker).await?;
    let masters = list_instances_or_empty(ctx, cr, Role::Master).await?;
    let stale = masters
        .iter()
        .chain(workers.iter())
        .filter(|i| !i.latest_model_applied)
        .count();

    if let Some(vmss) = get_vmss(ctx, cr, Role::Worker).await? {
        let instances = i64::try_from(workers.len()).unwrap_or(i64::MAX);
        if vmss.capacity != desired || instances != desired {
            // The checksums of this deployment are already stored, so leaving
            // for DeploymentCompleted would never bring stale instances back.
            if stale > 0 {
                info!(
                    azure_config = %cr.key(),
                    capacity = vmss.capacity,
                    instances = instances,
                    desired = desired,
                    stale_instances = stale,
                    "Worker scale set is scaling, waiting before the upgrade"
                );
                return Ok(Stage::ClusterUpgradeRequirementCheck);
            }

            info!(
                azure_config = %cr.key(),
                capacity = vmss.capacity,
                instances = instances,
                desired = desired,
                "Worker scale set is scaling, no upgrade needed"
            );
            return Ok(Stage::DeploymentCompleted);
        }
    }

    if stale > 0 {
        info!(
            azure_config = %cr.key(),
            stale_instances = stale,
            "Instances run an old model, starting upgrade"
        );
        return Ok(Stage::MasterInstancesUpgrading);
    }

    Ok(Stage::DeploymentCompleted)
}

async fn master_instances_upgrading(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let cluster_id = cr.cluster_id();
    let vmss = Role::Master.vmss_name(cluster_id);

    let masters = list_instances_or_empty(ctx, cr, Role::Master).await?;
    let nodes = ctx.tenants.for_cluster(cr).await?.list_nodes().await?;
    let drainer_configs = ctx.drainers.list(cluster_id).await?;

    let ws = next_instance(
        &masters,
        &drainer_configs,
        &node_versions(&nodes),
        cr.desired_version(),
        |instance| instance_node_name(cluster_id, Role::Master, &instance.instance_id),
    )?;

    if let Some(ws) = &ws {
        if let Some(instance) = ws.instance_to_update() {
            info!(azure_config = %cr.key(), instance = %instance.name, "Updating master instance");
            ctx.azure
                .update_instances(cr.resource_group(), &vmss, &[instance.instance_id.clone()])
                .await?;
        }

        if let Some(instance) = ws.instance_to_drain() {
            let node = instance_node_name(cluster_id, Role::Master, &instance.instance_id)?;
            info!(azure_config = %cr.key(), node = %node, "Draining master node");
            ctx.drainers.create(cr, &node).await?;
        }

        if let Some(instance) = ws.instance_to_reimage() {
            let node = instance_node_name(cluster_id, Role::Master, &instance.instance_id)?;
            info!(azure_config = %cr.key(), instance = %instance.name, "Reimaging master instance");
            ctx.azure
                .reimage_instances(cr.resource_group(), &vmss, &[instance.instance_id.clone()])
                .await?;
            delete_drainer_config(ctx, cluster_id, &node).await?;
        }

        if let Some(instance) = ws.instance_already_being_updated() {
            debug!(
                azure_config = %cr.key(),
                instance = %instance.name,
                "Master instance is being updated"
            );
        }
    }

    if ws.is_wip() {
        return Ok(Stage::MasterInstancesUpgrading);
    }

    info!(azure_config = %cr.key(), "All master instances upgraded");
    Ok(Stage::WaitForMastersToBecomeReady)
}

async fn wait_for_masters_to_become_ready(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let nodes = role_nodes(ctx, cr, Role::Master).await?;

    if !nodes.is_empty() && nodes.iter().all(|n| n.ready) {
        info!(azure_config = %cr.key(), masters = nodes.len(), "All masters are ready");
        return Ok(Stage::ScaleUpWorkerVMSS);
    }

    debug!(
        azure_config = %cr.key(),
        ready = nodes.iter().filter(|n| n.ready).count(),
        total = nodes.len(),
        "Waiting for masters to become ready"
    );
    Ok(Stage::WaitForMastersToBecomeReady)
}

async fn scale_up_worker_vmss(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let capacity = cr.worker_count().saturating_mul(2);
    ctx.azure
        .update_vmss_capacity(
            cr.resource_group(),
            &Role::Worker.vmss_name(cr.cluster_id()),
            capacity,
        )
        .await?;

    info!(azure_config = %cr.key(), capacity = capacity, "Scaled up worker scale set");
    Ok(Stage::CordonOldWorkers)
}

async fn cordon_old_workers(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let old_nodes = stale_worker_nodes(ctx, cr).await?;
    let tenant = ctx.tenants.for_cluster(cr).await?;
    let workers: Vec<TenantNode> = tenant
        .list_nodes()
        .await?
        .into_iter()
        .filter(|n| n.has_role(Role::Worker))
        .collect();

    let ready_new = workers
        .iter()
        .filter(|n| n.ready && !old_nodes.contains(&n.name))
        .count();
    if ready_new < old_nodes.len() {
        debug!(
            azure_config = %cr.key(),
            ready_new = ready_new,
            old = old_nodes.len(),
            "Waiting for new workers before cordoning"
        );
        return Ok(Stage::CordonOldWorkers);
    }

    let mut cordoned = 0;
    for node in workers
        .iter()
        .filter(|n| old_nodes.contains(&n.name) && !n.unschedulable)
    {
        tenant.cordon_node(&node.name).await?;
        cordoned += 1;
    }

    if cordoned > 0 {
        info!(azure_config = %cr.key(), cordoned = cordoned, "Cordoned old workers");
        return Ok(Stage::CordonOldWorkers);
    }

    Ok(Stage::WaitForWorkersToBecomeReady)
}

async fn wait_for_workers_to_become_ready(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let nodes = role_nodes(ctx, cr, Role::Worker).await?;

    if !nodes.is_empty() && nodes.iter().all(|n| n.ready) {
        info!(azure_config = %cr.key(), workers = nodes.len(), "All workers are ready");
        return Ok(Stage::DrainOldWorkerNodes);
    }

    debug!(
        azure_config = %cr.key(),
        ready = nodes.iter().filter(|n| n.ready).count(),
        total = nodes.len(),
        "Waiting for workers to become ready"
    );
    Ok(Stage::WaitForWorkersToBecomeReady)
}

async fn drain_old_worker_nodes(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let cluster_id = cr.cluster_id();
    let old_nodes = stale_worker_nodes(ctx, cr).await?;
    let drainer_configs = ctx.drainers.list(cluster_id).await?;

    let mut pending = 0;
    for node in &old_nodes {
        match drainer_configs.iter().find(|dc| dc.node_name() == node) {
            None => {
                ctx.drainers.create(cr, node).await?;
                pending += 1;
            }
            Some(dc) if dc.is_drained() => {}
            Some(dc) if dc.is_timed_out() => {
                warn!(azure_config = %cr.key(), node = %node, "Drain timed out, retrying");
                delete_drainer_config(ctx, cluster_id, node).await?;
                pending += 1;
            }
            Some(_) => pending += 1,
        }
    }

    if pending > 0 {
        debug!(
            azure_config = %cr.key(),
            pending = pending,
            total = old_nodes.len(),
            "Waiting for old workers to drain"
        );
        return Ok(Stage::DrainOldWorkerNodes);
    }

    info!(azure_config = %cr.key(), drained = old_nodes.len(), "Old workers drained");
    Ok(Stage::TerminateOldWorkerInstances)
}

async fn terminate_old_worker_instances(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let cluster_id = cr.cluster_id();
    let vmss = Role::Worker.vmss_name(cluster_id);

    let workers = match ctx
        .azure
        .list_vmss_instances(cr.resource_group(), &vmss)
        .await
    {
        Ok(workers) => workers,
        Err(e) if e.is(ErrorKind::VmssNotFound) => {
            warn!(azure_config = %cr.key(), "Worker scale set not found, restarting upgrade");
            return Ok(Stage::DeploymentUninitialized);
        }
        Err(e) => return Err(e),
    };

    let stale: Vec<&VmssInstance> = workers.iter().filter(|i| !i.latest_model_applied).collect();
    if !stale.is_empty() {
        let ids: Vec<String> = stale.iter().map(|i| i.instance_id.clone()).collect();
        ctx.azure
            .delete_instances(cr.resource_group(), &vmss, &ids)
            .await?;
        info!(azure_config = %cr.key(), instances = ?ids, "Deleted old worker instances");
    }

    for instance in stale {
        let node = instance_node_name(cluster_id, Role::Worker, &instance.instance_id)?;
        delete_drainer_config(ctx, cluster_id, &node).await?;
    }

    Ok(Stage::ScaleDownWorkerVMSS)
}

async fn scale_down_worker_vmss(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    let capacity = cr.worker_count();
    ctx.azure
        .update_vmss_capacity(
            cr.resource_group(),
            &Role::Worker.vmss_name(cr.cluster_id()),
            capacity,
        )
        .await?;

    info!(azure_config = %cr.key(), capacity = capacity, "Scaled down worker scale set");
    Ok(Stage::DeploymentCompleted)
}

async fn deployment_completed(ctx: &Context, cr: &AzureConfig) -> Result<Stage> {
    // Clusters whose workers moved out of the built-in scale set keep an empty
    // one around until it is removed here. Once it is gone there is nothing
    // left for this reconciler to watch.
    let Some(vmss) = get_vmss(ctx, cr, Role::Worker).await? else {
        debug!(azure_config = %cr.key(), "Worker scale set not found, nothing to do");
        return Ok(Stage::DeploymentCompleted);
    };
    if vmss.capacity == 0 && cr.spec.cluster.workers.is_empty() {
        ctx.azure
            .delete_vmss(cr.resource_group(), &vmss.name)
            .await?;
        info!(azure_config = %cr.key(), vmss = %vmss.name, "Deleted empty legacy worker scale set");
        return Ok(Stage::DeploymentCompleted);
    }

    let deployment = match ctx
        .azure
        .get_deployment(cr.resource_group(), MAIN_DEPLOYMENT_NAME)
        .await
    {
        Ok(deployment) => deployment,
        Err(e) if e.is(ErrorKind::DeploymentNotFound) => {
            info!(azure_config = %cr.key(), "Main deployment missing, redeploying");
            return Ok(Stage::DeploymentUninitialized);
        }
        Err(e) => return Err(e),
    };

    let state = deployment.provisioning_state();
    if !state.is_final() {
        debug!(azure_config = %cr.key(), state = ?state, "Main deployment in progress");
        return Ok(Stage::DeploymentCompleted);
    }
    if state.is_failed() {
        warn!(azure_config = %cr.key(), state = ?state, "Main deployment failed, redeploying");
        return Ok(Stage::DeploymentUninitialized);
    }

    let desired = ctx.deployments.desired(cr, ctx.ignition.as_ref()).await?;
    let stored_template = ctx.status.get(cr, CONDITION_TEMPLATE_CHECKSUM).await?;
    let stored_parameters = ctx.status.get(cr, CONDITION_PARAMETERS_CHECKSUM).await?;

    if template_checksum(&desired)? != stored_template
        || parameters_checksum(&desired)? != stored_parameters
    {
        info!(azure_config = %cr.key(), "Desired deployment changed, starting upgrade");
        return Ok(Stage::DeploymentUninitialized);
    }

    Ok(Stage::DeploymentCompleted)
}

/// Scale set of the role, `None` when it does not exist.
async fn get_vmss(
    ctx: &Context,
    cr: &AzureConfig,
    role: Role,
) -> Result<Option<VirtualMachineScaleSet>> {
    match ctx
        .azure
        .get_vmss(cr.resource_group(), &role.vmss_name(cr.cluster_id()))
        .await
    {
        Ok(vmss) => Ok(Some(vmss)),
        Err(e) if e.is(ErrorKind::VmssNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Instances of the role's scale set. A missing scale set has none.
async fn list_instances_or_empty(
    ctx: &Context,
    cr: &AzureConfig,
    role: Role,
) -> Result<Vec<VmssInstance>> {
    match ctx
        .azure
        .list_vmss_instances(cr.resource_group(), &role.vmss_name(cr.cluster_id()))
        .await
    {
        Ok(instances) => Ok(instances),
        Err(e) if e.is(ErrorKind::VmssNotFound) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Node names of worker instances that run an old model.
async fn stale_worker_nodes(ctx: &Context, cr: &AzureConfig) -> Result<BTreeSet<String>> {
    let workers = ctx
        .azure
        .list_vmss_instances(cr.resource_group(), &Role::Worker.vmss_name(cr.cluster_id()))
        .await?;

    workers
        .iter()
        .filter(|i| !i.latest_model_applied)
        .map(|i| instance_node_name(cr.cluster_id(), Role::Worker, &i.instance_id))
        .collect()
}

async fn role_nodes(ctx: &Context, cr: &AzureConfig, role: Role) -> Result<Vec<TenantNode>> {
    let nodes = ctx.tenants.for_cluster(cr).await?.list_nodes().await?;
    Ok(nodes.into_iter().filter(|n| n.has_role(role)).collect())
}

async fn delete_drainer_config(ctx: &Context, cluster_id: &str, node: &str) -> Result<()> {
    match ctx.drainers.delete(cluster_id, node).await {
        Err(Error::DrainerConfigNotFound { .. }) | Ok(()) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "transitions_tests.rs"]
mod transitions_tests;
