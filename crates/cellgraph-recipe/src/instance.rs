//! Running recipe instances
//!
//! ## Lifecycle
//!
//! ```text
//! Constructing ──► Scheduled ◄──► Settled
//!       │              │             │
//!       └──────────────┴─────────────┴──► TornDown
//! ```
//!
//! `Settled` is re-entered every time [`RecipeInstance::settle`] completes;
//! `TornDown` is terminal.

use crate::error::RecipeError;
use cellgraph_core::{ActionError, ActionId, Cell, ResolveError, Scheduler, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceState {
    Constructing,
    Scheduled,
    Settled,
    TornDown,
}

/// Validate a lifecycle transition
///
/// # Errors
/// Returns [`RecipeError::IllegalTransition`] if `to` is not reachable from
/// `from` in one step.
pub fn validate_transition(from: InstanceState, to: InstanceState) -> Result<(), RecipeError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(RecipeError::IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: InstanceState) -> Vec<InstanceState> {
    use InstanceState::*;
    match from {
        Constructing => vec![Scheduled, TornDown],
        Scheduled => vec![Settled, TornDown],
        Settled => vec![Scheduled, TornDown],
        TornDown => vec![],
    }
}

/// Failure recorded for one node of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub node: String,
    pub error: ActionError,
}

/// A live recipe: root cell, one scheduled action per node, nested children
#[derive(Debug)]
pub struct RecipeInstance {
    name: String,
    scheduler: Scheduler,
    root: Cell,
    actions: Vec<(String, ActionId)>,
    children: Vec<RecipeInstance>,
    state: Mutex<InstanceState>,
}

impl RecipeInstance {
    pub(crate) fn new(name: String, scheduler: Scheduler, root: Cell) -> Self {
        Self {
            name,
            scheduler,
            root,
            actions: Vec::new(),
            children: Vec::new(),
            state: Mutex::new(InstanceState::Constructing),
        }
    }

    pub(crate) fn push_action(&mut self, node: String, id: ActionId) {
        self.actions.push((node, id));
    }

    pub(crate) fn push_child(&mut self, child: RecipeInstance) {
        self.children.push(child);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root cell holding the recipe's state
    #[must_use]
    pub fn root(&self) -> &Cell {
        &self.root
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Instances created for nested-recipe nodes
    #[must_use]
    pub fn children(&self) -> &[RecipeInstance] {
        &self.children
    }

    #[must_use]
    pub fn state(&self) -> InstanceState {
        *self.state.lock()
    }

    /// Root value with every alias and reference resolved
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn get(&self) -> Result<Value, ResolveError> {
        self.root.resolved_value()
    }

    /// Failures from the latest run of each node, nested recipes included
    #[must_use]
    pub fn node_errors(&self) -> Vec<NodeError> {
        let mut errors: Vec<NodeError> = self
            .actions
            .iter()
            .filter_map(|(node, id)| {
                self.scheduler.action_error(*id).map(|error| NodeError {
                    node: node.clone(),
                    error,
                })
            })
            .collect();
        for child in &self.children {
            errors.extend(child.node_errors());
        }
        errors
    }

    /// Wait until the graph is quiescent
    ///
    /// # Errors
    /// - [`RecipeError::IllegalTransition`] after teardown
    /// - [`RecipeError::Scheduler`] if the drain loop diverges
    pub async fn settle(&self) -> Result<(), RecipeError> {
        self.settle_with(&CancellationToken::new()).await
    }

    /// Wait until the graph is quiescent or `cancel` fires
    ///
    /// # Errors
    /// See [`RecipeInstance::settle`]; cancellation yields
    /// [`SchedulerError::Cancelled`](cellgraph_core::SchedulerError::Cancelled).
    pub async fn settle_with(&self, cancel: &CancellationToken) -> Result<(), RecipeError> {
        self.reschedule()?;
        self.scheduler.idle_with(cancel).await?;
        self.mark_settled()?;
        info!(recipe = %self.name, "recipe settled");
        Ok(())
    }

    /// Unregister this instance's actions, then those of any child not
    /// already torn down
    ///
    /// # Errors
    /// Returns [`RecipeError::IllegalTransition`] if already torn down.
    pub fn teardown(&self) -> Result<(), RecipeError> {
        self.transition(InstanceState::TornDown)?;
        self.remove_actions();
        for child in &self.children {
            if child.state() != InstanceState::TornDown {
                child.teardown()?;
            }
        }
        info!(recipe = %self.name, nodes = self.actions.len(), "recipe torn down");
        Ok(())
    }

    pub(crate) fn transition(&self, to: InstanceState) -> Result<(), RecipeError> {
        let mut state = self.state.lock();
        let from = *state;
        validate_transition(from, to)?;
        debug!(recipe = %self.name, ?from, ?to, "instance transition");
        *state = to;
        Ok(())
    }

    fn reschedule(&self) -> Result<(), RecipeError> {
        if self.state() != InstanceState::Scheduled {
            self.transition(InstanceState::Scheduled)?;
        }
        for child in &self.children {
            child.reschedule()?;
        }
        Ok(())
    }

    fn mark_settled(&self) -> Result<(), RecipeError> {
        self.transition(InstanceState::Settled)?;
        for child in &self.children {
            child.mark_settled()?;
        }
        Ok(())
    }

    fn remove_actions(&self) {
        for (_, id) in &self.actions {
            self.scheduler.remove_action(*id);
        }
    }
}

impl Drop for RecipeInstance {
    fn drop(&mut self) {
        if *self.state.get_mut() != InstanceState::TornDown {
            self.remove_actions();
        }
    }
}
