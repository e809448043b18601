//! cellgraph Recipe - declarative graphs over reactive cells
//!
//! A recipe is a root value plus nodes; each node connects a module to the
//! root through alias bindings. [`Runner::run`] turns a recipe into a
//! [`RecipeInstance`] whose nodes are scheduler actions, so a node re-runs
//! whenever something it read changes.
//!
//! # Example
//!
//! ```rust
//! use cellgraph_recipe::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModuleRegistry::new().with("double", |input: &ViewValue| {
//!     Ok(Value::from(input.as_f64().unwrap_or_default() * 2.0))
//! });
//! let recipe = Recipe::from_json_str(
//!     r#"{"initial": {"value": 1}, "nodes": [{
//!         "module": {"type": "function", "name": "double"},
//!         "inputs": {"$alias": {"path": ["value"]}},
//!         "outputs": {"$alias": {"path": ["result"]}}
//!     }]}"#,
//!     &registry,
//! )?;
//!
//! let instance = Runner::default().run(&recipe, Value::Undefined)?;
//! instance.settle().await?;
//! assert_eq!(instance.get()?.to_json(), serde_json::json!({"value": 1, "result": 2}));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod binding;
pub mod definition;
pub mod error;
pub mod instance;
pub mod recipe;
pub mod registry;
pub mod runner;

pub use binding::{bind_to_cell, send_to_binding, wire_outputs};
pub use definition::{ModuleDefinition, NodeDefinition, RecipeDefinition};
pub use error::{ModuleError, RecipeError};
pub use instance::{allowed_transitions, validate_transition, InstanceState, NodeError, RecipeInstance};
pub use recipe::{Module, Node, Recipe};
pub use registry::{ModuleFn, ModuleRegistry};
pub use runner::Runner;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and running recipes
    pub use crate::{
        InstanceState, Module, ModuleError, ModuleRegistry, Node, Recipe, RecipeError,
        RecipeInstance, Runner,
    };
    pub use cellgraph_core::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
