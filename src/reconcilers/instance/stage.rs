// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Stages of the instance upgrade protocol.

use crate::errors::Error;
use std::fmt;
use std::str::FromStr;

/// Position of one `AzureConfig` in the upgrade protocol.
///
/// Persisted as the `Stage` condition of the `instance` status entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// No deployment submitted yet, or the upgrade restarts.
    DeploymentUninitialized,
    /// Deployment submitted, waiting for ARM.
    DeploymentInitialized,
    ProvisioningSuccessful,
    /// Decide between a node recycle and nothing.
    ClusterUpgradeRequirementCheck,
    /// One master at a time.
    MasterInstancesUpgrading,
    WaitForMastersToBecomeReady,
    /// Double the worker capacity.
    ScaleUpWorkerVMSS,
    CordonOldWorkers,
    WaitForWorkersToBecomeReady,
    DrainOldWorkerNodes,
    TerminateOldWorkerInstances,
    /// Back to the desired worker capacity.
    ScaleDownWorkerVMSS,
    /// Steady state. Left only when drift is detected.
    DeploymentCompleted,
}

impl Stage {
    /// Every stage, in protocol order.
    pub const ALL: [Stage; 13] = [
        Stage::DeploymentUninitialized,
        Stage::DeploymentInitialized,
        Stage::ProvisioningSuccessful,
        Stage::ClusterUpgradeRequirementCheck,
        Stage::MasterInstancesUpgrading,
        Stage::WaitForMastersToBecomeReady,
        Stage::ScaleUpWorkerVMSS,
        Stage::CordonOldWorkers,
        Stage::WaitForWorkersToBecomeReady,
        Stage::DrainOldWorkerNodes,
        Stage::TerminateOldWorkerInstances,
        Stage::ScaleDownWorkerVMSS,
        Stage::DeploymentCompleted,
    ];

    /// Stage of a resource that has no persisted stage yet.
    pub const INITIAL: Stage = Stage::DeploymentUninitialized;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeploymentUninitialized => "DeploymentUninitialized",
            Self::DeploymentInitialized => "DeploymentInitialized",
            Self::ProvisioningSuccessful => "ProvisioningSuccessful",
            Self::ClusterUpgradeRequirementCheck => "ClusterUpgradeRequirementCheck",
            Self::MasterInstancesUpgrading => "MasterInstancesUpgrading",
            Self::WaitForMastersToBecomeReady => "WaitForMastersToBecomeReady",
            Self::ScaleUpWorkerVMSS => "ScaleUpWorkerVMSS",
            Self::CordonOldWorkers => "CordonOldWorkers",
            Self::WaitForWorkersToBecomeReady => "WaitForWorkersToBecomeReady",
            Self::DrainOldWorkerNodes => "DrainOldWorkerNodes",
            Self::TerminateOldWorkerInstances => "TerminateOldWorkerInstances",
            Self::ScaleDownWorkerVMSS => "ScaleDownWorkerVMSS",
            Self::DeploymentCompleted => "DeploymentCompleted",
        }
    }

    /// Parse a persisted stage. An empty string means no stage yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutionFailed`] for unknown stage names.
    pub fn from_persisted(value: &str) -> Result<Self, Error> {
        if value.is_empty() {
            return Ok(Self::INITIAL);
        }
        value.parse()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::ExecutionFailed(format!("unknown stage '{s}'")))
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod stage_tests;
