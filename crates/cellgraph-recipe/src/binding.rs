//! Alias wiring between nodes and cells
//!
//! A node's `inputs` and `outputs` are values whose leaves are aliases. These
//! helpers pin unbound aliases to a cell, push a module's result through an
//! output binding and wire nested-recipe outputs into the outer cell.

use cellgraph_core::{write_through, Cell, CellError, LogHandle, Path, Value};

/// Copy of `binding` with every alias lacking an owner pointed into `cell`
#[must_use]
pub fn bind_to_cell(binding: &Value, cell: &Cell) -> Value {
    match binding {
        Value::Alias(alias) if alias.cell.is_none() => Value::alias_in(cell, alias.path.clone()),
        Value::Map(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), bind_to_cell(value, cell)))
            .collect(),
        Value::Sequence(items) => Value::Sequence(items.iter().map(|v| bind_to_cell(v, cell)).collect()),
        other => other.clone(),
    }
}

/// Write `result` through the output `binding`
///
/// Alias and reference leaves receive the matching part of `result`; maps
/// and sequences are walked in step with it. Only parts present in `result`
/// are written. Unbound aliases point into `holder`.
///
/// # Errors
/// Returns [`CellError`] when a target rejects the write.
pub fn send_to_binding(
    binding: &Value,
    result: Value,
    holder: &Cell,
    log: Option<&LogHandle>,
) -> Result<(), CellError> {
    match binding {
        Value::Alias(alias) => {
            let cell = alias.cell.as_ref().unwrap_or(holder);
            write_through(cell, &alias.path, result, log)?;
        }
        Value::Reference(reference) => {
            write_through(&reference.cell, &reference.path, result, log)?;
        }
        Value::Map(bindings) => {
            if let Value::Map(mut values) = result {
                for (key, binding) in bindings {
                    if let Some(value) = values.remove(key) {
                        send_to_binding(binding, value, holder, log)?;
                    }
                }
            }
        }
        Value::Sequence(bindings) => {
            if let Value::Sequence(values) = result {
                for (binding, value) in bindings.iter().zip(values) {
                    send_to_binding(binding, value, holder, log)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Point every location named by `binding` at the matching path of `source`
///
/// Used once when a nested recipe is instantiated: afterwards its results
/// reach the outer cell through ordinary alias resolution.
///
/// # Errors
/// Returns [`CellError`] when a target rejects the write.
pub fn wire_outputs(binding: &Value, holder: &Cell, source: &Cell, at: &Path) -> Result<(), CellError> {
    match binding {
        Value::Alias(alias) => {
            let cell = alias.cell.as_ref().unwrap_or(holder);
            cell.set_at_path(&alias.path, Value::alias_in(source, at.clone()), None)?;
        }
        Value::Reference(reference) => {
            reference
                .cell
                .set_at_path(&reference.path, Value::alias_in(source, at.clone()), None)?;
        }
        Value::Map(bindings) => {
            for (key, binding) in bindings {
                wire_outputs(binding, holder, source, &at.child(key.as_str()))?;
            }
        }
        Value::Sequence(bindings) => {
            for (index, binding) in bindings.iter().enumerate() {
                wire_outputs(binding, holder, source, &at.child(index))?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn binding_pins_only_unowned_aliases() {
        let root = Cell::new(Value::empty_map());
        let other = Cell::new(Value::empty_map());
        let mut binding = Value::from_json(json!({"a": {"$alias": {"path": ["x"]}}, "n": 1}));
        binding
            .set_path(&p("b"), Value::alias_in(&other, p("y")))
            .unwrap();

        let bound = bind_to_cell(&binding, &root);
        assert_eq!(bound.at_path(&p("a")), Value::alias_in(&root, p("x")));
        assert_eq!(bound.at_path(&p("b")), Value::alias_in(&other, p("y")));
        assert_eq!(bound.at_path(&p("n")), 1.into());
    }

    #[test]
    fn send_writes_only_present_keys() {
        let root = Cell::new(Value::from_json(json!({"keep": 0})));
        let binding = Value::from_json(json!({
            "sum": {"$alias": {"path": ["total"]}},
            "other": {"$alias": {"path": ["keep"]}}
        }));
        let log = LogHandle::new();

        send_to_binding(&binding, Value::from_json(json!({"sum": 3})), &root, Some(&log)).unwrap();
        assert_eq!(root.get().to_json(), json!({"keep": 0, "total": 3}));
        assert_eq!(log.snapshot().writes, vec![root.reference(p("total"))]);
    }

    #[test]
    fn send_to_sequence_binding() {
        let root = Cell::new(Value::empty_map());
        let binding = Value::from_json(json!([
            {"$alias": {"path": ["first"]}},
            {"$alias": {"path": ["second"]}}
        ]));
        send_to_binding(&binding, Value::from_json(json!(["a", "b", "c"])), &root, None).unwrap();
        assert_eq!(root.get().to_json(), json!({"first": "a", "second": "b"}));
    }

    #[test]
    fn wiring_places_aliases_into_source() {
        let outer = Cell::new(Value::from_json(json!({"value": 1})));
        let inner = Cell::new(Value::from_json(json!({"output": 2})));
        let binding = Value::from_json(json!({"output": {"$alias": {"path": ["result"]}}}));

        wire_outputs(&binding, &outer, &inner, &Path::root()).unwrap();
        assert_eq!(outer.get_at_path(&p("result")), Value::alias_in(&inner, p("output")));
        assert_eq!(outer.resolved_value().unwrap().to_json(), json!({"value": 1, "result": 2}));
    }
}
