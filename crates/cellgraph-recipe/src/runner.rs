//! Recipe runner
//!
//! Turns a [`Recipe`] into a live [`RecipeInstance`]:
//! 1. Merge the caller's bindings into `initial` and allocate the root cell
//! 2. For passthrough and function nodes, pin the node's input binding to the
//!    root in a frozen inputs cell and schedule one action that reads it,
//!    runs the module and writes the result through the output binding
//! 3. For nested-recipe nodes, run the inner recipe against the bound inputs
//!    and alias the outer output locations to the inner root once
//!
//! Nothing runs during construction; the scheduler picks the new actions up
//! on its next pass.

use crate::binding::{bind_to_cell, send_to_binding, wire_outputs};
use crate::error::RecipeError;
use crate::instance::{InstanceState, RecipeInstance};
use crate::recipe::{Module, Node, Recipe};
use cellgraph_core::{ActionError, ActionId, Cell, LogHandle, Path, Scheduler, Value};
use tracing::info;

/// Instantiates recipes on one scheduler
#[derive(Debug, Clone, Default)]
pub struct Runner {
    scheduler: Scheduler,
}

impl Runner {
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Instantiate `recipe` with `bindings` deep-merged into its initial value
    ///
    /// # Errors
    /// Returns [`RecipeError::InvalidBinding`] when a nested-recipe node's
    /// inputs or outputs are not maps, or a core error raised while wiring.
    pub fn run(
        &self,
        recipe: &Recipe,
        bindings: impl Into<Value>,
    ) -> Result<RecipeInstance, RecipeError> {
        let mut initial = recipe.initial.clone();
        initial.merge(bindings.into());
        let root = self.scheduler.cell(initial);

        let mut instance =
            RecipeInstance::new(recipe.name.clone(), self.scheduler.clone(), root);
        for (index, node) in recipe.nodes.iter().enumerate() {
            let label = format!("{}#{index}:{}", recipe.name, node.module.kind());
            match &node.module {
                Module::Recipe(inner) => {
                    let child = self.run_nested(&label, inner, node, instance.root())?;
                    instance.push_child(child);
                }
                module => {
                    let id = self.schedule_node(&label, module, node, instance.root());
                    instance.push_action(label, id);
                }
            }
        }

        instance.transition(InstanceState::Scheduled)?;
        info!(
            recipe = %recipe.name,
            nodes = recipe.nodes.len(),
            children = instance.children().len(),
            "recipe instantiated"
        );
        Ok(instance)
    }

    fn schedule_node(
        &self,
        label: &str,
        module: &Module,
        node: &Node,
        root: &Cell,
    ) -> ActionId {
        let root = root.clone();
        let inputs = self.scheduler.cell(bind_to_cell(&node.inputs, &root));
        inputs.freeze();
        let outputs = bind_to_cell(&node.outputs, &root);
        let module = module.clone();

        let action = move |log: &LogHandle| -> Result<(), ActionError> {
            let input = inputs.view(&Path::root(), Some(log))?;
            let output = match &module {
                Module::Function { run, .. } => run(&input)?,
                _ => input.to_value()?,
            };
            send_to_binding(&outputs, output, &root, Some(log))?;
            Ok(())
        };
        self.scheduler.add_action(label, action)
    }

    fn run_nested(
        &self,
        label: &str,
        inner: &Recipe,
        node: &Node,
        root: &Cell,
    ) -> Result<RecipeInstance, RecipeError> {
        let inputs = match &node.inputs {
            Value::Map(_) => bind_to_cell(&node.inputs, root),
            Value::Undefined | Value::Null => Value::empty_map(),
            other => {
                return Err(RecipeError::InvalidBinding {
                    node: label.to_string(),
                    reason: format!("nested recipe inputs must be a map, got {}", other.to_json()),
                })
            }
        };
        if !matches!(node.outputs, Value::Map(_) | Value::Undefined | Value::Null) {
            return Err(RecipeError::InvalidBinding {
                node: label.to_string(),
                reason: format!(
                    "nested recipe outputs must be a map, got {}",
                    node.outputs.to_json()
                ),
            });
        }

        let child = self.run(inner, inputs)?;
        wire_outputs(&node.outputs, root, child.root(), &Path::root())?;
        Ok(child)
    }
}
