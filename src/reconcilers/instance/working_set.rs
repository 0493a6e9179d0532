// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-pass selection of the scale set instance to work on.
//!
//! A rolling upgrade touches at most one instance per reconcile pass. The
//! selection is rebuilt from live data on every pass and never persisted.

use crate::azure::VmssInstance;
use crate::crd::DrainerConfig;
use crate::errors::{Error, Result};
use std::collections::BTreeMap;

/// What to do with which instance during this pass.
///
/// `Option<WorkingSet>` is the value callers pass around: `None` means there
/// is no work left. The `with_*` builders of [`WorkingSetExt`] accept `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkingSet {
    instance_to_update: Option<VmssInstance>,
    instance_to_drain: Option<VmssInstance>,
    instance_to_reimage: Option<VmssInstance>,
    instance_already_being_updated: Option<VmssInstance>,
}

impl WorkingSet {
    /// Instance that still runs an old scale set model.
    #[must_use]
    pub fn instance_to_update(&self) -> Option<&VmssInstance> {
        self.instance_to_update.as_ref()
    }

    /// Instance whose node must be drained before it is reimaged.
    #[must_use]
    pub fn instance_to_drain(&self) -> Option<&VmssInstance> {
        self.instance_to_drain.as_ref()
    }

    /// Instance whose node is drained and can be reimaged.
    #[must_use]
    pub fn instance_to_reimage(&self) -> Option<&VmssInstance> {
        self.instance_to_reimage.as_ref()
    }

    /// Instance with an operation in flight. Nothing to do but wait.
    #[must_use]
    pub fn instance_already_being_updated(&self) -> Option<&VmssInstance> {
        self.instance_already_being_updated.as_ref()
    }
}

/// Builders and predicates on `Option<WorkingSet>`.
pub trait WorkingSetExt {
    #[must_use]
    fn with_instance_to_update(self, instance: VmssInstance) -> Self;
    #[must_use]
    fn with_instance_to_drain(self, instance: VmssInstance) -> Self;
    #[must_use]
    fn with_instance_to_reimage(self, instance: VmssInstance) -> Self;
    #[must_use]
    fn with_instance_already_being_updated(self, instance: VmssInstance) -> Self;

    /// More upgrade work remains.
    fn is_wip(&self) -> bool;
}

impl WorkingSetExt for Option<WorkingSet> {
    fn with_instance_to_update(self, instance: VmssInstance) -> Self {
        let mut ws = self.unwrap_or_default();
        ws.instance_to_update = Some(instance);
        Some(ws)
    }

    fn with_instance_to_drain(self, instance: VmssInstance) -> Self {
        let mut ws = self.unwrap_or_default();
        ws.instance_to_drain = Some(instance);
        Some(ws)
    }

    fn with_instance_to_reimage(self, instance: VmssInstance) -> Self {
        let mut ws = self.unwrap_or_default();
        ws.instance_to_reimage = Some(instance);
        Some(ws)
    }

    fn with_instance_already_being_updated(self, instance: VmssInstance) -> Self {
        let mut ws = self.unwrap_or_default();
        ws.instance_already_being_updated = Some(instance);
        Some(ws)
    }

    fn is_wip(&self) -> bool {
        self.as_ref().is_some_and(|ws| {
            ws.instance_to_update.is_some()
                || ws.instance_to_drain.is_some()
                || ws.instance_to_reimage.is_some()
                || ws.instance_already_being_updated.is_some()
        })
    }
}

/// Pick the next instance of a role to work on.
///
/// Instances are visited in increasing numeric ID order. The first rule that
/// matches any instance wins:
///
/// 1. an instance with an operation in flight is already being updated;
/// 2. an instance not running the latest model is updated;
/// 3. an instance whose node reports an old version and has no drainer config
///    is drained;
/// 4. an instance whose node reports an old version and whose drainer config
///    is `Drained` or `Timeout` is reimaged; a pending drain counts as already
///    being updated.
///
/// Nodes missing from `node_versions` are not considered outdated.
///
/// # Errors
///
/// Returns [`Error::InvalidInstanceId`] if an instance ID is not a decimal
/// number, or any error of `instance_name`.
pub fn next_instance<F>(
    instances: &[VmssInstance],
    drainer_configs: &[DrainerConfig],
    node_versions: &BTreeMap<String, String>,
    desired_version: &str,
    instance_name: F,
) -> Result<Option<WorkingSet>>
where
    F: Fn(&VmssInstance) -> Result<String>,
{
    let mut ordered = instances
        .iter()
        .map(|instance| {
            instance
                .instance_id
                .parse::<u64>()
                .map(|id| (id, instance))
                .map_err(|_| Error::InvalidInstanceId(instance.instance_id.clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    ordered.sort_by_key(|(id, _)| *id);
    let ordered: Vec<&VmssInstance> = ordered.into_iter().map(|(_, i)| i).collect();

    let ws: Option<WorkingSet> = None;

    if let Some(instance) = ordered
        .iter()
        .find(|i| !i.provisioning_state.is_final())
    {
        return Ok(ws.with_instance_already_being_updated((*instance).clone()));
    }

    if let Some(instance) = ordered.iter().find(|i| !i.latest_model_applied) {
        return Ok(ws.with_instance_to_update((*instance).clone()));
    }

    // Node name, drainer config and instance of every outdated node.
    let mut outdated = Vec::new();
    for instance in &ordered {
        let name = instance_name(instance)?;
        let is_outdated = node_versions
            .get(&name)
            .is_some_and(|version| version != desired_version);
        if is_outdated {
            let drainer = drainer_configs.iter().find(|dc| dc.node_name() == name);
            outdated.push((*instance, drainer));
        }
    }

    if let Some((instance, _)) = outdated.iter().find(|(_, dc)| dc.is_none()) {
        return Ok(ws.with_instance_to_drain((*instance).clone()));
    }

    if let Some((instance, _)) = outdated
        .iter()
        .find(|(_, dc)| dc.is_some_and(|dc| dc.is_drained() || dc.is_timed_out()))
    {
        return Ok(ws.with_instance_to_reimage((*instance).clone()));
    }

    if let Some((instance, _)) = outdated.first() {
        return Ok(ws.with_instance_already_being_updated((*instance).clone()));
    }

    Ok(None)
}

#[cfg(test)]
#[path = "working_set_tests.rs"]
mod working_set_tests;
