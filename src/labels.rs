// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used across the instance reconciler.
//!
//! Tenant nodes and `DrainerConfig` resources are matched on these labels, so
//! they must stay in sync with the components that write them.

// ============================================================================
// Kubernetes Standard Labels
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on resources created by this operator
pub const MANAGED_BY_AZURE_OPERATOR: &str = "azure-operator";

/// Role label set by the kubelet on every tenant node
pub const NODE_ROLE_LABEL: &str = "kubernetes.io/role";

// ============================================================================
// Giant Swarm Labels
// ============================================================================

/// Label identifying which tenant cluster a resource belongs to
pub const CLUSTER_ID_LABEL: &str = "giantswarm.io/cluster";

/// Label carrying the release version a node was provisioned with
pub const VERSION_LABEL: &str = "azure-operator.giantswarm.io/version";

// ============================================================================
// Role Values
// ============================================================================

/// Role value for master nodes
pub const ROLE_MASTER: &str = "master";

/// Role value for worker nodes
pub const ROLE_WORKER: &str = "worker";
