// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Azure operator.
//!
//! Every fallible operation in the library returns [`Error`]. Callers branch on
//! the error's [`ErrorKind`] rather than on concrete variants:
//!
//! - **not-found** kinds (`VmssNotFound`, `DeploymentNotFound`,
//!   `DrainerConfigNotFound`, `TenantClusterUnavailable`, `IgnitionBlobNotFound`)
//!   mean "retry on the next reconcile pass" and are never escalated.
//! - **execution-failed** kinds (`ExecutionFailed`, `InvalidInstanceId`,
//!   `InvalidConfig`) are programming or data-integrity errors surfaced as a
//!   failed reconciliation.
//! - everything else is a transient API error propagated to the controller's
//!   retry/backoff.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of error kinds. Each variant of [`Error`] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A virtual machine scale set does not exist
    VmssNotFound,
    /// An ARM deployment does not exist
    DeploymentNotFound,
    /// A `DrainerConfig` does not exist
    DrainerConfigNotFound,
    /// No client for the tenant cluster API can be built yet
    TenantClusterUnavailable,
    /// The ignition blob URLs have not been published yet
    IgnitionBlobNotFound,
    /// The state machine was asked to run or produce an unregistered stage
    ExecutionFailed,
    /// A VMSS instance ID is not a decimal number
    InvalidInstanceId,
    /// Operator or resource configuration is unusable
    InvalidConfig,
    /// Optimistic concurrency conflict on a status update
    Conflict,
    /// Azure Resource Manager returned an error response
    Azure,
    /// Transport level failure talking to Azure
    Http,
    /// Kubernetes API failure
    Kube,
    /// A payload could not be encoded or decoded
    Serialization,
}

/// Errors raised by the operator library.
#[derive(Error, Debug)]
pub enum Error {
    /// Scale set not found (HTTP 404 from Azure)
    #[error("virtual machine scale set '{name}' not found in resource group '{resource_group}'")]
    VmssNotFound {
        /// Resource group that was searched
        resource_group: String,
        /// Scale set name
        name: String,
    },

    /// Deployment not found (HTTP 404 from Azure)
    #[error("deployment '{name}' not found in resource group '{resource_group}'")]
    DeploymentNotFound {
        /// Resource group that was searched
        resource_group: String,
        /// Deployment name
        name: String,
    },

    /// `DrainerConfig` not found (HTTP 404 from the Kubernetes API)
    #[error("drainer config '{namespace}/{name}' not found")]
    DrainerConfigNotFound {
        /// Namespace of the drainer config
        namespace: String,
        /// Name of the drainer config
        name: String,
    },

    /// Tenant cluster API client could not be built
    #[error("tenant cluster '{cluster_id}' API is not available: {reason}")]
    TenantClusterUnavailable {
        /// Cluster ID
        cluster_id: String,
        /// Why the client is unavailable
        reason: String,
    },

    /// Ignition blob URL not yet published
    #[error("ignition blob for role '{role}' of cluster '{cluster_id}' not found")]
    IgnitionBlobNotFound {
        /// Cluster ID
        cluster_id: String,
        /// Node role (`master` or `worker`)
        role: String,
    },

    /// State machine execution failed
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Malformed VMSS instance ID
    #[error("invalid instance id '{0}': expected a decimal number")]
    InvalidInstanceId(String),

    /// Invalid configuration
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Optimistic concurrency conflict
    #[error("conflict updating '{0}': object has been modified")]
    Conflict(String),

    /// Error response from Azure Resource Manager
    #[error("azure request {operation} failed with HTTP {status}: {message}")]
    Azure {
        /// Human readable operation, e.g. `get vmss`
        operation: String,
        /// HTTP status code
        status: u16,
        /// Error message returned by ARM
        message: String,
    },

    /// Transport failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Kubernetes API failure
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// JSON encoding or decoding failure
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VmssNotFound { .. } => ErrorKind::VmssNotFound,
            Self::DeploymentNotFound { .. } => ErrorKind::DeploymentNotFound,
            Self::DrainerConfigNotFound { .. } => ErrorKind::DrainerConfigNotFound,
            Self::TenantClusterUnavailable { .. } => ErrorKind::TenantClusterUnavailable,
            Self::IgnitionBlobNotFound { .. } => ErrorKind::IgnitionBlobNotFound,
            Self::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            Self::InvalidInstanceId(_) => ErrorKind::InvalidInstanceId,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Azure { .. } => ErrorKind::Azure,
            Self::Http(_) => ErrorKind::Http,
            Self::Kube(_) => ErrorKind::Kube,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this error is of the given kind.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// Whether this error means "the thing is not there yet, try again later".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::VmssNotFound
                | ErrorKind::DeploymentNotFound
                | ErrorKind::DrainerConfigNotFound
                | ErrorKind::TenantClusterUnavailable
                | ErrorKind::IgnitionBlobNotFound
        )
    }

    /// Whether this error is a programming or data-integrity failure.
    #[must_use]
    pub fn is_execution_failed(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ExecutionFailed | ErrorKind::InvalidInstanceId | ErrorKind::InvalidConfig
        )
    }

    /// Whether this error is an optimistic concurrency conflict, either our own
    /// `Conflict` or an HTTP 409 from the Kubernetes API.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Kube(err) => is_kube_status(err, 409),
            _ => false,
        }
    }

    /// Stable label for metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::VmssNotFound
            | ErrorKind::DeploymentNotFound
            | ErrorKind::DrainerConfigNotFound
            | ErrorKind::TenantClusterUnavailable
            | ErrorKind::IgnitionBlobNotFound => "not_found",
            ErrorKind::ExecutionFailed | ErrorKind::InvalidInstanceId | ErrorKind::InvalidConfig => {
                "execution_failed"
            }
            ErrorKind::Conflict => "conflict",
            ErrorKind::Azure | ErrorKind::Http => "azure_error",
            ErrorKind::Kube => "api_error",
            ErrorKind::Serialization => "serialization_error",
        }
    }
}

/// Whether a kube error is an API error with the given HTTP status code.
#[must_use]
pub fn is_kube_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(status) if status.code == code)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
