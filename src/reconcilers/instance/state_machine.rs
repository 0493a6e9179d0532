// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Table driven state machine.
//!
//! A [`StateMachine`] maps every known state to an async transition function.
//! [`StateMachine::execute`] runs exactly one transition and validates both
//! ends of it: the state it starts from and the state it returns must be
//! registered. A table with a typo'd target state therefore fails on first use
//! instead of wedging the resource in a state nothing handles.

use crate::errors::{Error, Result};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Transition function: `(resource, current state) -> next state`.
pub type TransitionFn<R, S> =
    Box<dyn for<'a> Fn(&'a R, &'a S) -> BoxFuture<'a, Result<S>> + Send + Sync>;

/// State machine over resources `R` and states `S`.
pub struct StateMachine<R, S> {
    transitions: BTreeMap<S, TransitionFn<R, S>>,
}

impl<R, S> Default for StateMachine<R, S> {
    fn default() -> Self {
        Self {
            transitions: BTreeMap::new(),
        }
    }
}

impl<R, S> StateMachine<R, S>
where
    R: Sync,
    S: Ord + Clone + Debug + Send + Sync,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transition for `state`, replacing any previous one.
    pub fn register<F>(&mut self, state: S, transition: F)
    where
        F: for<'a> Fn(&'a R, &'a S) -> BoxFuture<'a, Result<S>> + Send + Sync + 'static,
    {
        self.transitions.insert(state, Box::new(transition));
    }

    #[must_use]
    pub fn contains(&self, state: &S) -> bool {
        self.transitions.contains_key(state)
    }

    /// Registered states, ordered.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.transitions.keys()
    }

    /// Run the transition registered for `current`.
    ///
    /// # Errors
    ///
    /// - [`Error::ExecutionFailed`] if `current` or the returned state is not registered.
    /// - Any error of the transition itself, unchanged.
    pub async fn execute(&self, resource: &R, current: &S) -> Result<S> {
        let transition = self.transitions.get(current).ok_or_else(|| {
            Error::ExecutionFailed(format!("no transition registered for state {current:?}"))
        })?;

        let next = transition(resource, current).await?;

        if !self.transitions.contains_key(&next) {
            return Err(Error::ExecutionFailed(format!(
                "transition from {current:?} returned unregistered state {next:?}"
            )));
        }

        Ok(next)
    }
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod state_machine_tests;
