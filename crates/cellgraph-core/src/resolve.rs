//! Reference resolution
//!
//! Follows aliases and cell references encountered while descending a path.
//! Every indirection re-roots the traversal onto its target `(cell, path)`
//! and records a read there, so dependency tracking sees the source of
//! truth rather than only the path that was asked for.
//!
//! Chains are bounded: more than the cell's configured number of hops, or a
//! hop back onto a location already visited in the same chain, fails with a
//! [`ResolveError`].

use crate::cell::{Cell, CellId, CellReference};
use crate::error::ResolveError;
use crate::log::LogHandle;
use crate::path::Path;
use crate::value::Value;

/// Location reached after following every indirection
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub cell: Cell,
    pub path: Path,
    pub value: Value,
}

impl Resolved {
    #[must_use]
    pub fn reference(&self) -> CellReference {
        self.cell.reference(self.path.clone())
    }
}

/// Descend `path` from `cell`, following indirections at every step
///
/// # Errors
/// Returns [`ResolveError`] when an indirection chain does not terminate.
pub fn follow(cell: &Cell, path: &Path, log: Option<&LogHandle>) -> Result<Resolved, ResolveError> {
    Walk::new(cell, log).follow(cell, path)
}

/// Replace every alias and reference inside `value` by what it points at
///
/// `cell` is the cell holding `value`; aliases without an explicit cell
/// point into it.
///
/// # Errors
/// Returns [`ResolveError`] when a chain does not terminate or the value is
/// self-referential.
pub fn resolve_deep(cell: &Cell, value: &Value, log: Option<&LogHandle>) -> Result<Value, ResolveError> {
    Walk::new(cell, log).deep(cell, value, &mut Vec::new())
}

pub(crate) struct Walk<'a> {
    log: Option<&'a LogHandle>,
    limit: usize,
    last_logged: Option<CellReference>,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(origin: &Cell, log: Option<&'a LogHandle>) -> Self {
        Self {
            log,
            limit: origin.max_indirection_depth(),
            last_logged: None,
        }
    }

    /// Last location recorded as a read by this walk
    pub(crate) fn last_logged(&self) -> Option<&CellReference> {
        self.last_logged.as_ref()
    }

    pub(crate) fn follow(&mut self, cell: &Cell, path: &Path) -> Result<Resolved, ResolveError> {
        let mut current = cell.clone();
        let mut at = Path::root();
        let mut target = cell.get();

        for segment in path {
            (current, at, target) = self.reroot(current, at, target)?;
            target = target.child(segment).cloned().unwrap_or_default();
            at = at.child(segment.clone());
        }

        let (cell, path, value) = self.reroot(current, at, target)?;
        Ok(Resolved { cell, path, value })
    }

    /// Follow `target` while it is an indirection
    pub(crate) fn reroot(
        &mut self,
        mut cell: Cell,
        mut path: Path,
        mut target: Value,
    ) -> Result<(Cell, Path, Value), ResolveError> {
        let mut visited: Vec<(CellId, Path)> = Vec::new();
        loop {
            let (next_cell, next_path) = match &target {
                Value::Alias(alias) => (
                    alias.cell.clone().unwrap_or_else(|| cell.clone()),
                    alias.path.clone(),
                ),
                Value::Reference(reference) => (reference.cell.clone(), reference.path.clone()),
                _ => return Ok((cell, path, target)),
            };

            if visited.len() >= self.limit {
                return Err(ResolveError::DepthExceeded {
                    depth: visited.len() + 1,
                    limit: self.limit,
                });
            }
            if visited
                .iter()
                .any(|(id, p)| *id == next_cell.id() && *p == next_path)
            {
                return Err(ResolveError::Cycle {
                    cell: next_cell.id(),
                    path: next_path,
                });
            }
            visited.push((next_cell.id(), next_path.clone()));

            self.record(next_cell.reference(next_path.clone()));
            target = next_cell.get_at_path(&next_path);
            cell = next_cell;
            path = next_path;
        }
    }

    fn deep(
        &mut self,
        cell: &Cell,
        value: &Value,
        stack: &mut Vec<(CellId, Path)>,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::Alias(_) | Value::Reference(_) => {
                let (target_cell, target_path, target) =
                    self.reroot(cell.clone(), Path::root(), value.clone())?;
                let key = (target_cell.id(), target_path);
                if stack.contains(&key) {
                    return Err(ResolveError::Cycle {
                        cell: key.0,
                        path: key.1,
                    });
                }
                if stack.len() >= self.limit {
                    return Err(ResolveError::DepthExceeded {
                        depth: stack.len() + 1,
                        limit: self.limit,
                    });
                }
                stack.push(key);
                let resolved = self.deep(&target_cell, &target, stack);
                stack.pop();
                resolved
            }
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.deep(cell, v, stack)?)))
                .collect::<Result<_, _>>()
                .map(Value::Map),
            Value::Sequence(items) => items
                .iter()
                .map(|v| self.deep(cell, v, stack))
                .collect::<Result<_, _>>()
                .map(Value::Sequence),
            other => Ok(other.clone()),
        }
    }

    fn record(&mut self, reference: CellReference) {
        if let Some(log) = self.log {
            log.record_read(reference.clone());
            self.last_logged = Some(reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::scheduler::Scheduler;
    use serde_json::json;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn plain_descent_has_no_indirection() {
        let cell = Cell::new(Value::from_json(json!({"a": {"b": 1}})));
        let resolved = follow(&cell, &p("a.b"), None).unwrap();
        assert_eq!(resolved.cell, cell);
        assert_eq!(resolved.path, p("a.b"));
        assert_eq!(resolved.value, 1.into());
    }

    #[test]
    fn alias_is_followed_mid_path() {
        let source = Cell::new(Value::from_json(json!({"deep": {"x": {"y": 7}}})));
        let mut holder = Value::empty_map();
        holder
            .set_path(&p("link"), Value::alias_in(&source, p("deep.x")))
            .unwrap();
        let cell = Cell::new(holder);
        let log = LogHandle::new();

        let resolved = follow(&cell, &p("link.y"), Some(&log)).unwrap();
        assert_eq!(resolved.cell, source);
        assert_eq!(resolved.path, p("deep.x.y"));
        assert_eq!(resolved.value, 7.into());
        assert_eq!(log.snapshot().reads, vec![source.reference(p("deep.x"))]);
    }

    #[test]
    fn alias_without_cell_points_into_holder() {
        let cell = Cell::new(Value::from_json(json!({
            "value": 3,
            "copy": {"$alias": {"path": ["value"]}}
        })));
        let resolved = follow(&cell, &p("copy"), None).unwrap();
        assert_eq!(resolved.path, p("value"));
        assert_eq!(resolved.value, 3.into());
    }

    #[test]
    fn reference_chain_across_cells() {
        let c = Cell::new(Value::from_json(json!({"v": "end"})));
        let b = Cell::new(Value::Reference(c.reference(p("v"))));
        let a = Cell::new(Value::from_iter([("to_b", Value::Reference(b.reference(Path::root())))]));
        let resolved = follow(&a, &p("to_b"), None).unwrap();
        assert_eq!(resolved.cell, c);
        assert_eq!(resolved.value, "end".into());
    }

    #[test]
    fn alias_cycle_is_detected() {
        let cell = Cell::new(Value::from_json(json!({
            "a": {"$alias": {"path": ["b"]}},
            "b": {"$alias": {"path": ["a"]}}
        })));
        assert!(matches!(
            follow(&cell, &p("a"), None),
            Err(ResolveError::Cycle { .. })
        ));
    }

    #[test]
    fn long_chain_hits_depth_limit() {
        let scheduler = Scheduler::with_config(RuntimeConfig::new().with_max_indirection_depth(3));
        let mut value = Value::from_iter([("n5", Value::from(1))]);
        for i in 0..5 {
            value
                .set_path(&p(&format!("n{i}")), Value::alias(p(&format!("n{}", i + 1))))
                .unwrap();
        }
        let cell = scheduler.cell(value);
        assert!(matches!(
            follow(&cell, &p("n0"), None),
            Err(ResolveError::DepthExceeded { limit: 3, .. })
        ));
        assert_eq!(follow(&cell, &p("n3"), None).unwrap().value, 1.into());
    }

    #[test]
    fn deep_resolution_replaces_nested_indirections() {
        let other = Cell::new(Value::from_json(json!({"name": "x"})));
        let cell = Cell::new(Value::from_json(json!({"n": 1, "list": [{"$alias": {"path": ["n"]}}]})));
        cell.set_at_path(&p("ext"), Value::alias_in(&other, p("name")), None)
            .unwrap();

        let resolved = cell.resolved_value().unwrap();
        assert_eq!(resolved.to_json(), json!({"n": 1, "list": [1], "ext": "x"}));
    }

    #[test]
    fn self_containing_value_is_rejected() {
        let cell = Cell::new(Value::from_json(json!({"me": {"$alias": {"path": []}}})));
        assert!(matches!(
            cell.resolved_value(),
            Err(ResolveError::Cycle { .. })
        ));
    }
}
