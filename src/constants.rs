// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Azure operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group of the `AzureConfig` CRD
pub const PROVIDER_API_GROUP: &str = "provider.giantswarm.io";

/// API group of the `DrainerConfig` CRD
pub const CORE_API_GROUP: &str = "core.giantswarm.io";

/// API version shared by both CRD groups
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version of `DrainerConfig`
pub const CORE_API_GROUP_VERSION: &str = "core.giantswarm.io/v1alpha1";

/// Kind name for `AzureConfig` resource
pub const KIND_AZURE_CONFIG: &str = "AzureConfig";

/// Kind name for `DrainerConfig` resource
pub const KIND_DRAINER_CONFIG: &str = "DrainerConfig";

// ============================================================================
// Status Constants
// ============================================================================

/// Name of the `status.cluster.resources[]` entry owned by the instance reconciler
pub const INSTANCE_RESOURCE_NAME: &str = "instance";

/// Condition type holding the current upgrade stage
pub const CONDITION_STAGE: &str = "Stage";

/// Condition type holding the checksum of the last submitted ARM template
pub const CONDITION_TEMPLATE_CHECKSUM: &str = "DeploymentTemplateChecksum";

/// Condition type holding the checksum of the last submitted ARM parameters
pub const CONDITION_PARAMETERS_CHECKSUM: &str = "DeploymentParametersChecksum";

/// Cluster condition set by the cluster controller while the cluster is being created
pub const CLUSTER_CONDITION_CREATING: &str = "Creating";

/// Condition status value for true conditions
pub const CONDITION_STATUS_TRUE: &str = "True";

/// `DrainerConfig` status condition set once the node has been drained
pub const DRAINER_CONDITION_DRAINED: &str = "Drained";

/// `DrainerConfig` status condition set once draining gave up
pub const DRAINER_CONDITION_TIMEOUT: &str = "Timeout";

// ============================================================================
// Azure Constants
// ============================================================================

/// Name of the ARM deployment carrying the cluster's main template
pub const MAIN_DEPLOYMENT_NAME: &str = "cluster-main-template";

/// Content version sent with every template link
pub const TEMPLATE_CONTENT_VERSION: &str = "1.0.0.0";

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Default Azure AD login endpoint
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// API version used for `Microsoft.Compute` requests
pub const COMPUTE_API_VERSION: &str = "2019-07-01";

/// API version used for `Microsoft.Resources` requests
pub const RESOURCES_API_VERSION: &str = "2019-05-01";

/// Port of the tenant Kubernetes API server
pub const KUBERNETES_API_SECURE_PORT: u16 = 443;

/// Refresh an access token this many seconds before it expires
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// Width of the base-36 instance suffix in VMSS computer names
pub const INSTANCE_SUFFIX_WIDTH: usize = 6;

// ============================================================================
// Secret Constants
// ============================================================================

/// Suffix of the secret holding a tenant cluster's kubeconfig
pub const KUBECONFIG_SECRET_SUFFIX: &str = "kubeconfig";

/// Key inside the kubeconfig secret
pub const KUBECONFIG_SECRET_KEY: &str = "kubeConfig";

/// Suffix of the secret holding the uploaded ignition blob URLs
pub const IGNITION_SECRET_SUFFIX: &str = "ignition";

/// Key of the master ignition blob URL inside the ignition secret
pub const IGNITION_SECRET_MASTER_KEY: &str = "master";

/// Key of the worker ignition blob URL inside the ignition secret
pub const IGNITION_SECRET_WORKER_KEY: &str = "worker";

// ============================================================================
// Controller Constants
// ============================================================================

/// Requeue interval while an upgrade is in progress
pub const REQUEUE_IN_PROGRESS_SECS: u64 = 30;

/// Requeue interval once the cluster is in its steady state
pub const REQUEUE_STEADY_SECS: u64 = 300;

/// Requeue interval after a failed reconciliation
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Worker thread count for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Lease duration for leader election
pub const LEASE_DURATION_SECS: u64 = 15;

/// Grace period for leader election renewals
pub const LEASE_GRACE_SECS: u64 = 5;

/// Default address of the Prometheus metrics endpoint
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:8080";
