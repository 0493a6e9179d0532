// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance reconciler of `AzureConfig` resources.
//!
//! Rolls the master and worker scale sets of a tenant cluster through the
//! upgrade protocol described in [`transitions`]. Every reconcile pass:
//!
//! 1. reads the persisted [`Stage`] (absent means [`Stage::INITIAL`]);
//! 2. runs exactly one transition of the state machine;
//! 3. persists the resulting stage if it changed and asks for a quick requeue.
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_operator::context::Context;
//! use azure_operator::crd::AzureConfig;
//! use azure_operator::reconcilers::instance::{InstanceReconciler, ReconcileOutcome};
//! use std::sync::Arc;
//!
//! async fn reconcile(ctx: Arc<Context>, cr: AzureConfig) -> anyhow::Result<()> {
//!     let reconciler = InstanceReconciler::new(ctx);
//!     match reconciler.ensure_created(&cr).await? {
//!         ReconcileOutcome::Requeue => println!("upgrade in progress"),
//!         ReconcileOutcome::Continue => println!("cluster is up to date"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod stage;
pub mod state_machine;
pub mod transitions;
pub mod working_set;

#[cfg(test)]
pub(crate) mod fakes;

pub use stage::Stage;
pub use state_machine::StateMachine;
pub use working_set::{next_instance, WorkingSet, WorkingSetExt};

use crate::constants::CONDITION_STAGE;
use crate::context::Context;
use crate::crd::AzureConfig;
use crate::errors::Result;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, info};

/// What the controller should do after a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing in flight. Check again on the regular interval.
    Continue,
    /// The upgrade moved or is waiting on something. Come back soon.
    Requeue,
}

/// Drives one `AzureConfig` through the upgrade protocol.
pub struct InstanceReconciler {
    ctx: Arc<Context>,
    machine: StateMachine<AzureConfig, Stage>,
}

impl InstanceReconciler {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        let machine = transitions::build_state_machine(ctx.clone());
        Self { ctx, machine }
    }

    /// Run one step of the upgrade protocol.
    ///
    /// # Errors
    ///
    /// Returns an error when the persisted stage is unknown, when a transition
    /// fails with anything but a not-found error, or when the new stage cannot
    /// be persisted. The stage is left untouched in all of these cases.
    pub async fn ensure_created(&self, cr: &AzureConfig) -> Result<ReconcileOutcome> {
        let persisted = self.ctx.status.get(cr, CONDITION_STAGE).await?;
        let current = Stage::from_persisted(&persisted)?;

        let next = self.machine.execute(cr, &current).await?;

        if next != current {
            self.ctx.status.set(cr, CONDITION_STAGE, next.as_str()).await?;
            metrics::record_stage_transition(cr.cluster_id(), current.as_str(), next.as_str());
            info!(
                azure_config = %cr.key(),
                from = %current,
                to = %next,
                "Stage transition"
            );
            return Ok(ReconcileOutcome::Requeue);
        }

        debug!(azure_config = %cr.key(), stage = %current, "Stage unchanged");
        if current == Stage::DeploymentCompleted {
            Ok(ReconcileOutcome::Continue)
        } else {
            Ok(ReconcileOutcome::Requeue)
        }
    }
}
