//! Error types for the reactive core
//!
//! Provides error handling for:
//! - Writes rejected by a cell
//! - Alias/reference chains that do not terminate
//! - Invalid operations through a transparent view
//! - Drain loop cancellation and divergence
//! - Failures inside a scheduled action

use crate::cell::CellId;
use crate::path::{Path, PathError};

/// Errors raised by cell writes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    /// The cell is frozen
    #[error("cell {cell} is read-only")]
    Frozen { cell: CellId },

    /// The write path does not fit the existing structure
    #[error("invalid write path: {0}")]
    Path(#[from] PathError),

    /// A stream event was sent through a cell without a live scheduler
    #[error("cell {cell} is not attached to a scheduler")]
    NoScheduler { cell: CellId },

    /// Resolving the write target failed
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

/// Errors raised while following aliases and references
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The chain is longer than the configured limit
    #[error("indirection depth {depth} exceeds limit {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    /// The chain revisits a location it already passed through
    #[error("indirection cycle through {cell}:[{path}]")]
    Cycle { cell: CellId, path: Path },
}

/// Errors raised by transparent view operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// A sequence operation was applied to something else
    #[error("value at [{path}] is not a sequence")]
    NotASequence { path: Path },

    /// A structured operation was applied to a scalar, stream or absent value
    #[error("value at [{path}] is not a map or sequence")]
    NotStructured { path: Path },

    /// Index outside the sequence
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The underlying write failed
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors raised by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The wait was cancelled before quiescence
    #[error("wait for idle cancelled")]
    Cancelled,

    /// Propagation did not reach a fixed point within the pass limit
    #[error("propagation did not settle after {passes} passes")]
    Diverged { passes: usize },
}

/// Failure of one action run, isolated to that action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The action's own logic failed
    #[error("action failed: {0}")]
    Failed(String),

    /// A write made by the action failed
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Reading the action's inputs failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A view operation failed
    #[error(transparent)]
    View(#[from] ViewError),
}

impl CellError {
    /// Errors caused by a broken recipe rather than by runtime state
    #[inline]
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::Path(_) | Self::Resolve(_) | Self::NoScheduler { .. })
    }
}

impl SchedulerError {
    /// Whether waiting again may succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
