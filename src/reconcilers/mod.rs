// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `AzureConfig` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `AzureConfig` changes via the Kubernetes API
//! 2. **Reconcile** - Advance the cluster one step through the upgrade protocol
//! 3. **Status** - Persist the reached stage on the resource
//!
//! # Modules
//!
//! - [`instance`] - Master and worker scale set upgrades
//! - [`status`] - Stage and checksum bookkeeping on the status subresource
//! - [`retry`] - Backoff for optimistic concurrency conflicts

pub mod instance;
pub mod retry;
pub mod status;

pub use instance::{InstanceReconciler, ReconcileOutcome};
