//! Function module registry
//!
//! Provides [`ModuleRegistry`] for resolving the function modules a recipe
//! definition names.

use crate::error::ModuleError;
use cellgraph_core::{Value, ViewValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Function module body: resolved input view to output value
pub type ModuleFn = Arc<dyn Fn(&ViewValue) -> Result<Value, ModuleError> + Send + Sync>;

/// Registry of named function modules
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleFn>,
}

impl ModuleRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, replacing any module of the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        module: impl Fn(&ViewValue) -> Result<Value, ModuleError> + Send + Sync + 'static,
    ) {
        self.modules.insert(name.into(), Arc::new(module));
    }

    /// Builder form of [`ModuleRegistry::register`]
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        module: impl Fn(&ViewValue) -> Result<Value, ModuleError> + Send + Sync + 'static,
    ) -> Self {
        self.register(name, module);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ModuleFn> {
        self.modules.get(name).cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    #[inline]
    pub fn remove(&mut self, name: &str) -> bool {
        self.modules.remove(name).is_some()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
