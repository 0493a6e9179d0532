// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Azure Operator - Tenant Cluster Upgrades on Azure
//!
//! A Kubernetes operator that keeps the Azure infrastructure of tenant
//! clusters in line with their `AzureConfig` resources and rolls master and
//! worker scale set instances when the cluster is upgraded.
//!
//! ## Overview
//!
//! Each reconcile pass advances one `AzureConfig` by a single step of a
//! persisted state machine:
//!
//! - submit the cluster's main ARM deployment and wait for it
//! - decide whether the scale sets need a node recycle
//! - upgrade masters one instance at a time (update, drain, reimage)
//! - rotate workers by scaling up, cordoning, draining and deleting old instances
//! - watch for drift between the desired and the submitted deployment
//!
//! ## Modules
//!
//! - [`crd`] - `AzureConfig` and `DrainerConfig` resource types
//! - [`reconcilers`] - Instance reconciler, status bookkeeping and retries
//! - [`azure`] - Azure Resource Manager facade and REST client
//! - [`tenant`] - Tenant cluster nodes and drainer configs
//! - [`deployment`] - Desired main ARM deployment
//! - [`checksum`] - Drift detection checksums
//! - [`context`] - Collaborators shared by reconcile passes
//! - [`config`] - Command line and environment configuration
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_operator::crd::AzureConfig;
//! use azure_operator::reconcilers::instance::Stage;
//!
//! fn describe(cr: &AzureConfig, stage: Stage) -> String {
//!     format!("{} is in stage {stage}", cr.cluster_id())
//! }
//! ```

pub mod azure;
pub mod checksum;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod deployment;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod tenant;
