//! Testing utilities for the cellgraph workspace
//!
//! Shared fixtures: sample recipes, a module registry and a subscriber that
//! records every change it sees.

#![allow(missing_docs)]

use cellgraph_core::{Cell, Path, Subscription, Value, ViewValue};
use cellgraph_recipe::{Module, ModuleError, ModuleRegistry, Node, Recipe};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

pub fn path(text: &str) -> Path {
    text.parse().unwrap()
}

/// Unbound alias to `text`
pub fn alias(text: &str) -> Value {
    Value::alias(path(text))
}

pub fn json_value(json: serde_json::Value) -> Value {
    Value::from_json(json)
}

fn number(input: &ViewValue) -> Result<f64, ModuleError> {
    input
        .as_f64()
        .ok_or_else(|| ModuleError::InvalidInput("expected a number".into()))
}

pub fn double_module() -> Module {
    Module::function("double", |input: &ViewValue| Ok(Value::from(number(input)? * 2.0)))
}

/// Registry with `double`, `increment`, `sum` and an always-failing `fail`
pub fn sample_registry() -> ModuleRegistry {
    ModuleRegistry::new()
        .with("double", |input: &ViewValue| Ok(Value::from(number(input)? * 2.0)))
        .with("increment", |input: &ViewValue| Ok(Value::from(number(input)? + 1.0)))
        .with("sum", |input: &ViewValue| {
            let view = input
                .as_view()
                .ok_or_else(|| ModuleError::InvalidInput("expected a sequence".into()))?;
            let total: f64 = view.to_vec()?.iter().filter_map(Value::as_f64).sum();
            Ok(Value::from(total))
        })
        .with("fail", |_: &ViewValue| Err(ModuleError::Failed("always fails".into())))
}

/// `{input: 1}` with one passthrough node copying `input` to `output`
pub fn passthrough_recipe() -> Recipe {
    Recipe::new(json_value(json!({"input": 1})))
        .with_name("passthrough")
        .with_node(Node::passthrough(alias("input"), alias("output")))
}

/// `{value: 1}` with one node doubling `value` into `result`
pub fn doubling_recipe() -> Recipe {
    Recipe::new(json_value(json!({"value": 1})))
        .with_name("doubling")
        .with_node(Node::new(double_module(), alias("value"), alias("result")))
}

/// Outer recipe whose single node runs `inner` with `value` bound to the
/// inner `input` and the inner `output` wired to `result`
pub fn nested_recipe(inner: Recipe, value: i64) -> Recipe {
    let inputs: Value = [("input", alias("value"))].into_iter().collect();
    let outputs: Value = [("output", alias("result"))].into_iter().collect();
    Recipe::new(json_value(json!({"value": value})))
        .with_name("outer")
        .with_node(Node::recipe(inner, inputs, outputs))
}

/// Inner recipe for [`nested_recipe`]: `input` doubled into `output`
pub fn inner_doubling_recipe() -> Recipe {
    Recipe::new(Value::empty_map())
        .with_name("inner-doubling")
        .with_node(Node::new(double_module(), alias("input"), alias("output")))
}

/// Inner recipe for [`nested_recipe`]: `input` copied to `output`
pub fn inner_passthrough_recipe() -> Recipe {
    Recipe::new(Value::empty_map())
        .with_name("inner-passthrough")
        .with_node(Node::passthrough(alias("input"), alias("output")))
}

/// Records `(value, path)` for every change delivered to it
#[derive(Debug, Default, Clone)]
pub struct RecordingSubscriber {
    seen: Arc<Mutex<Vec<(Value, Path)>>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `cell`; keep the guard alive for as long as recording
    /// should continue
    pub fn attach(&self, cell: &Cell) -> Subscription {
        let seen = Arc::clone(&self.seen);
        cell.updates(move |value, path| seen.lock().push((value.clone(), path.clone())))
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn paths(&self) -> Vec<Path> {
        self.seen.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn last(&self) -> Option<Value> {
        self.seen.lock().last().map(|(v, _)| v.clone())
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}
