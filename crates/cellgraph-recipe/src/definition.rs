//! Recipe definition format
//!
//! The serde form of a recipe as it appears in JSON files:
//!
//! ```json
//! {
//!   "initial": {"value": 1},
//!   "nodes": [{
//!     "module": {"type": "function", "name": "double"},
//!     "inputs": {"$alias": {"path": ["value"]}},
//!     "outputs": {"$alias": {"path": ["result"]}}
//!   }]
//! }
//! ```
//!
//! Definitions are compiled into a runnable [`Recipe`](crate::Recipe)
//! against a [`ModuleRegistry`](crate::ModuleRegistry).

use crate::error::RecipeError;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::path::Path as FsPath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Schema of the root value; carried along, not enforced
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub schema: Json,
    #[serde(default)]
    pub initial: Json,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub module: ModuleDefinition,
    #[serde(default)]
    pub inputs: Json,
    #[serde(default)]
    pub outputs: Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModuleDefinition {
    /// Output equals input
    Passthrough,
    /// Registered function, looked up by name
    Function { name: String },
    /// Nested recipe instantiated per activation
    Recipe { implementation: Box<RecipeDefinition> },
}

impl RecipeDefinition {
    /// Parse a definition from JSON text
    ///
    /// # Errors
    /// Returns [`RecipeError::Definition`] on malformed input.
    pub fn from_json_str(text: &str) -> Result<Self, RecipeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a definition file
    ///
    /// # Errors
    /// Returns [`RecipeError::Definition`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: impl AsRef<FsPath>) -> Result<Self, RecipeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecipeError::Definition(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Every function module name used, nested recipes included
    #[must_use]
    pub fn function_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_function_names(&mut names);
        names
    }

    fn collect_function_names(&self, names: &mut BTreeSet<String>) {
        for node in &self.nodes {
            match &node.module {
                ModuleDefinition::Function { name } => {
                    names.insert(name.clone());
                }
                ModuleDefinition::Recipe { implementation } => {
                    implementation.collect_function_names(names);
                }
                ModuleDefinition::Passthrough => {}
            }
        }
    }

    /// Number of nodes, nested recipes included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match &node.module {
                ModuleDefinition::Recipe { implementation } => 1 + implementation.node_count(),
                _ => 1,
            })
            .sum()
    }
}
