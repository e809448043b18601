//! Runnable recipes
//!
//! A [`Recipe`] is an initial root value plus a list of [`Node`]s. Each node
//! pairs a [`Module`] with input and output bindings: values whose leaves are
//! aliases into the recipe's root cell.

use crate::definition::{ModuleDefinition, RecipeDefinition};
use crate::error::{ModuleError, RecipeError};
use crate::registry::{ModuleFn, ModuleRegistry};
use cellgraph_core::{Value, ViewValue};
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;

/// Computation performed by a node
#[derive(Clone)]
pub enum Module {
    /// Output equals input
    Passthrough,
    /// Pure mapping from resolved input to output
    Function { name: String, run: ModuleFn },
    /// Nested recipe with its own root cell
    Recipe(Arc<Recipe>),
}

impl Module {
    /// Function module from a closure
    pub fn function(
        name: impl Into<String>,
        run: impl Fn(&ViewValue) -> Result<Value, ModuleError> + Send + Sync + 'static,
    ) -> Self {
        Self::Function {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    /// Short kind label used in node names and logs
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Function { name, .. } => name,
            Self::Recipe(recipe) => &recipe.name,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => f.write_str("Passthrough"),
            Self::Function { name, .. } => f.debug_struct("Function").field("name", name).finish(),
            Self::Recipe(recipe) => f.debug_tuple("Recipe").field(recipe).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub module: Module,
    pub inputs: Value,
    pub outputs: Value,
}

impl Node {
    #[must_use]
    pub fn new(module: Module, inputs: impl Into<Value>, outputs: impl Into<Value>) -> Self {
        Self {
            module,
            inputs: inputs.into(),
            outputs: outputs.into(),
        }
    }

    #[must_use]
    pub fn passthrough(inputs: impl Into<Value>, outputs: impl Into<Value>) -> Self {
        Self::new(Module::Passthrough, inputs, outputs)
    }

    #[must_use]
    pub fn recipe(recipe: Recipe, inputs: impl Into<Value>, outputs: impl Into<Value>) -> Self {
        Self::new(Module::Recipe(Arc::new(recipe)), inputs, outputs)
    }
}

#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub schema: Json,
    pub initial: Value,
    pub nodes: Vec<Node>,
}

impl Recipe {
    /// Create a recipe with no nodes
    #[must_use]
    pub fn new(initial: impl Into<Value>) -> Self {
        Self {
            name: "recipe".to_string(),
            schema: Json::Null,
            initial: initial.into(),
            nodes: Vec::new(),
        }
    }

    /// With name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With schema
    #[must_use]
    pub fn with_schema(mut self, schema: Json) -> Self {
        self.schema = schema;
        self
    }

    /// With an extra node
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Compile a definition, resolving function modules in `registry`
    ///
    /// # Errors
    /// Returns [`RecipeError::UnknownModule`] for a function name the
    /// registry does not know.
    pub fn compile(definition: &RecipeDefinition, registry: &ModuleRegistry) -> Result<Self, RecipeError> {
        let initial = match &definition.initial {
            Json::Null => Value::empty_map(),
            other => Value::from_json(other.clone()),
        };

        let nodes = definition
            .nodes
            .iter()
            .map(|node| {
                let module = match &node.module {
                    ModuleDefinition::Passthrough => Module::Passthrough,
                    ModuleDefinition::Function { name } => Module::Function {
                        name: name.clone(),
                        run: registry
                            .get(name)
                            .ok_or_else(|| RecipeError::UnknownModule { name: name.clone() })?,
                    },
                    ModuleDefinition::Recipe { implementation } => {
                        Module::Recipe(Arc::new(Self::compile(implementation, registry)?))
                    }
                };
                Ok(Node::new(
                    module,
                    Value::from_json(node.inputs.clone()),
                    Value::from_json(node.outputs.clone()),
                ))
            })
            .collect::<Result<_, RecipeError>>()?;

        Ok(Self {
            name: definition.name.clone().unwrap_or_else(|| "recipe".to_string()),
            schema: definition.schema.clone(),
            initial,
            nodes,
        })
    }

    /// Parse and compile JSON text
    ///
    /// # Errors
    /// See [`RecipeDefinition::from_json_str`] and [`Recipe::compile`].
    pub fn from_json_str(text: &str, registry: &ModuleRegistry) -> Result<Self, RecipeError> {
        Self::compile(&RecipeDefinition::from_json_str(text)?, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_core::Path;
    use serde_json::json;

    #[test]
    fn compile_resolves_functions() {
        let registry = ModuleRegistry::new().with("double", |input: &ViewValue| {
            Ok(Value::from(input.as_f64().unwrap_or_default() * 2.0))
        });
        let recipe = Recipe::from_json_str(
            &json!({
                "name": "doubler",
                "initial": {"value": 1},
                "nodes": [{
                    "module": {"type": "function", "name": "double"},
                    "inputs": {"$alias": {"path": ["value"]}},
                    "outputs": {"$alias": {"path": ["result"]}}
                }]
            })
            .to_string(),
            &registry,
        )
        .unwrap();

        assert_eq!(recipe.name, "doubler");
        assert_eq!(recipe.nodes.len(), 1);
        assert_eq!(recipe.nodes[0].module.kind(), "double");
        assert_eq!(recipe.nodes[0].inputs, Value::alias(Path::single("value")));
    }

    #[test]
    fn compile_reports_unknown_function() {
        let result = Recipe::from_json_str(
            r#"{"nodes": [{"module": {"type": "recipe", "implementation":
                {"nodes": [{"module": {"type": "function", "name": "missing"}}]}}}]}"#,
            &ModuleRegistry::new(),
        );
        assert_eq!(
            result.unwrap_err(),
            RecipeError::UnknownModule {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn missing_initial_is_an_empty_map() {
        let recipe = Recipe::from_json_str("{}", &ModuleRegistry::new()).unwrap();
        assert_eq!(recipe.initial, Value::empty_map());
        assert!(recipe.nodes.is_empty());
    }
}
