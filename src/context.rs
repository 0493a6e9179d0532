// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the instance reconciler.
//!
//! Every reconcile pass receives the same `Arc<Context>`. It holds the
//! collaborators the upgrade protocol talks to, each behind a trait so tests
//! can swap in in-memory fakes:
//!
//! - [`AzureApi`] for scale sets and ARM deployments
//! - [`TenantClusterFactory`] for tenant cluster nodes
//! - [`DrainerApi`] for `DrainerConfig` objects
//! - [`IgnitionSource`] for the ignition blob URLs
//! - [`StatusStore`] for the persisted stage and checksums
//!
//! Nothing in here is mutable except the tenant client cache, which guards
//! itself.

use crate::azure::AzureApi;
use crate::deployment::{DeploymentBuilder, IgnitionSource, KubeIgnitionSource};
use crate::reconcilers::status::{KubeStatusStore, StatusStore};
use crate::tenant::{DrainerApi, KubeDrainerApi, KubeTenantClusterFactory, TenantClusterFactory};
use kube::Client;
use std::sync::Arc;

/// Collaborators of the instance reconciler.
#[derive(Clone)]
pub struct Context {
    pub azure: Arc<dyn AzureApi>,

    pub tenants: Arc<dyn TenantClusterFactory>,

    pub drainers: Arc<dyn DrainerApi>,

    pub ignition: Arc<dyn IgnitionSource>,

    pub status: Arc<dyn StatusStore>,

    /// Builds the desired main deployment.
    pub deployments: DeploymentBuilder,
}

impl Context {
    /// Context wired to the control plane cluster behind `client`.
    #[must_use]
    pub fn from_client(
        client: &Client,
        azure: Arc<dyn AzureApi>,
        deployments: DeploymentBuilder,
    ) -> Self {
        Self {
            azure,
            tenants: Arc::new(KubeTenantClusterFactory::new(client.clone())),
            drainers: Arc::new(KubeDrainerApi::new(client.clone())),
            ignition: Arc::new(KubeIgnitionSource::new(client.clone())),
            status: Arc::new(KubeStatusStore::new(client.clone())),
            deployments,
        }
    }
}
