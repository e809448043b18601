//! Function modules available to recipes run from the command line

use cellgraph_core::{Value, ViewValue};
use cellgraph_recipe::{ModuleError, ModuleRegistry};

fn number(input: &ViewValue) -> Result<f64, ModuleError> {
    input
        .as_f64()
        .ok_or_else(|| ModuleError::InvalidInput("expected a number".into()))
}

fn elements(input: &ViewValue) -> Result<Vec<Value>, ModuleError> {
    let view = input
        .as_view()
        .filter(|view| view.is_sequence())
        .ok_or_else(|| ModuleError::InvalidInput("expected a sequence".into()))?;
    Ok(view.to_vec()?)
}

pub(crate) fn builtin_registry() -> ModuleRegistry {
    ModuleRegistry::new()
        .with("identity", |input: &ViewValue| Ok(input.to_value()?))
        .with("double", |input: &ViewValue| Ok(Value::from(number(input)? * 2.0)))
        .with("increment", |input: &ViewValue| Ok(Value::from(number(input)? + 1.0)))
        .with("negate", |input: &ViewValue| Ok(Value::from(-number(input)?)))
        .with("not", |input: &ViewValue| {
            input
                .as_bool()
                .map(|b| Value::Bool(!b))
                .ok_or_else(|| ModuleError::InvalidInput("expected a boolean".into()))
        })
        .with("sum", |input: &ViewValue| {
            let total: f64 = elements(input)?.iter().filter_map(Value::as_f64).sum();
            Ok(Value::from(total))
        })
        .with("count", |input: &ViewValue| Ok(Value::from(elements(input)?.len())))
        .with("concat", |input: &ViewValue| {
            let text: String = elements(input)?
                .iter()
                .filter_map(Value::as_str)
                .collect();
            Ok(Value::from(text))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_core::{Cell, Path};
    use serde_json::json;

    fn run(name: &str, input: serde_json::Value) -> Result<Value, ModuleError> {
        let cell = Cell::new(Value::from_json(input));
        let view = cell.view(&Path::root(), None).unwrap();
        let module = builtin_registry().get(name).unwrap();
        module(&view)
    }

    #[test]
    fn arithmetic_modules() {
        assert_eq!(run("double", json!(4)).unwrap(), 8.into());
        assert_eq!(run("increment", json!(1.5)).unwrap(), 2.5.into());
        assert_eq!(run("negate", json!(3)).unwrap(), (-3).into());
        assert_eq!(run("sum", json!([1, 2, "x", 3])).unwrap(), 6.into());
    }

    #[test]
    fn sequence_modules_reject_scalars() {
        assert!(matches!(run("count", json!(3)), Err(ModuleError::InvalidInput(_))));
        assert_eq!(run("concat", json!(["a", "b"])).unwrap(), "ab".into());
    }
}
