//! Runtime configuration
//!
//! Limits that keep resolution and propagation bounded.

use serde::{Deserialize, Serialize};

/// Runtime limits shared by a scheduler and the cells it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum alias/reference hops followed in one chain
    pub max_indirection_depth: usize,
    /// Maximum drain passes before the scheduler gives up
    pub max_passes: usize,
}

impl RuntimeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With indirection depth limit
    #[inline]
    #[must_use]
    pub fn with_max_indirection_depth(mut self, depth: usize) -> Self {
        self.max_indirection_depth = depth;
        self
    }

    /// With drain pass limit
    #[inline]
    #[must_use]
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_indirection_depth: 64,
            max_passes: 10_000,
        }
    }
}
