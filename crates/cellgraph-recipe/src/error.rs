//! Error types for recipes
//!
//! Provides error handling for:
//! - Function module bodies
//! - Definition parsing and compilation
//! - Instance construction and lifecycle transitions

use crate::instance::InstanceState;
use cellgraph_core::{ActionError, CellError, ResolveError, SchedulerError, ViewError};

/// Failure raised by a function module
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The resolved input does not have the shape the module expects
    #[error("invalid module input: {0}")]
    InvalidInput(String),

    /// The module ran and failed
    #[error("module failed: {0}")]
    Failed(String),

    /// Reading the input failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A view operation on the input failed
    #[error(transparent)]
    View(#[from] ViewError),
}

impl From<ModuleError> for ActionError {
    fn from(error: ModuleError) -> Self {
        match error {
            ModuleError::Resolve(error) => Self::Resolve(error),
            ModuleError::View(error) => Self::View(error),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Errors raised while compiling or running recipes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipeError {
    /// The definition could not be parsed
    #[error("invalid recipe definition: {0}")]
    Definition(String),

    /// A function module names nothing in the registry
    #[error("unknown function module '{name}'")]
    UnknownModule { name: String },

    /// A node's wiring does not fit its module
    #[error("invalid binding for node {node}: {reason}")]
    InvalidBinding { node: String, reason: String },

    /// Instance lifecycle violation
    #[error("illegal instance transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: InstanceState,
        to: InstanceState,
    },

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl From<serde_json::Error> for RecipeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Definition(error.to_string())
    }
}

impl RecipeError {
    /// Errors caused by a broken recipe rather than by runtime state
    #[inline]
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        match self {
            Self::Definition(_)
            | Self::UnknownModule { .. }
            | Self::InvalidBinding { .. }
            | Self::IllegalTransition { .. }
            | Self::Resolve(_) => true,
            Self::Cell(error) => error.is_programming_error(),
            Self::Scheduler(_) => false,
        }
    }

    /// Whether retrying the operation may succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Scheduler(error) if error.is_recoverable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_failures_become_action_failures() {
        let error: ActionError = ModuleError::InvalidInput("expected a number".into()).into();
        assert_eq!(
            error,
            ActionError::Failed("invalid module input: expected a number".into())
        );
    }

    #[test]
    fn classification() {
        assert!(RecipeError::UnknownModule { name: "x".into() }.is_programming_error());
        assert!(RecipeError::Scheduler(SchedulerError::Cancelled).is_recoverable());
        assert!(!RecipeError::Scheduler(SchedulerError::Diverged { passes: 1 }).is_recoverable());
    }
}
