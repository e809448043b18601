//! Minimal cell façade
//!
//! A [`SimpleCell`] narrows a cell to one path and exposes get/set/key. It is
//! what node code receives when it only needs to read or replace a value
//! without the full view machinery.

use crate::cell::{Cell, CellReference, Subscription};
use crate::error::{CellError, ResolveError};
use crate::log::LogHandle;
use crate::path::{Path, PathSegment};
use crate::resolve;
use crate::value::Value;
use crate::view::{self, write_through, ViewValue};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SimpleCell {
    cell: Cell,
    path: Path,
    log: Option<LogHandle>,
}

impl SimpleCell {
    pub(crate) fn new(cell: Cell, path: Path, log: Option<LogHandle>) -> Self {
        Self { cell, path, log }
    }

    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn reference(&self) -> CellReference {
        self.cell.reference(self.path.clone())
    }

    /// Resolved value at this location
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn get(&self) -> Result<Value, ResolveError> {
        let log = self.log.as_ref();
        if let Some(log) = log {
            log.record_read(self.reference());
        }
        let resolved = resolve::follow(&self.cell, &self.path, log)?;
        resolve::resolve_deep(&resolved.cell, &resolved.value, log)
    }

    /// Replace the value at this location
    ///
    /// # Errors
    /// Returns [`CellError`] when the write is rejected.
    pub fn set(&self, value: impl Into<Value>) -> Result<bool, CellError> {
        write_through(&self.cell, &self.path, value, self.log.as_ref())
    }

    /// Write the value, or queue it as an event when this is a stream
    ///
    /// Returns whether state changed; queued events report `false`.
    ///
    /// # Errors
    /// - [`CellError::NoScheduler`] for a stream on a detached cell
    /// - any error of [`SimpleCell::set`]
    pub fn send(&self, value: impl Into<Value>) -> Result<bool, CellError> {
        if let ViewValue::Stream(sender) = view::open(&self.cell, &self.path, self.log.as_ref())? {
            sender.send(value)?;
            return Ok(false);
        }
        self.set(value)
    }

    /// Façade on a child location
    #[must_use]
    pub fn key(&self, key: impl Into<PathSegment>) -> Self {
        Self::new(self.cell.clone(), self.path.child(key), self.log.clone())
    }

    /// Subscribe to changes that touch this location
    ///
    /// The callback receives the deep-resolved value at this location and
    /// runs once immediately. Writes to alias targets inside the same cell
    /// also trigger it.
    pub fn sink(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        let cell = self.cell.clone();
        let path = self.path.clone();
        let (value, deps) = resolve_tracked(&cell, &cell.get_at_path(&path));
        callback(&value);
        let deps = Mutex::new(deps);
        self.cell.updates(move |root, changed| {
            let touched = changed.overlaps(&path) || deps.lock().iter().any(|dep| changed.overlaps(dep));
            if !touched {
                return;
            }
            let (value, read) = resolve_tracked(&cell, &root.at_path(&path));
            *deps.lock() = read;
            callback(&value);
        })
    }
}

/// Deep-resolve `value` and return the paths of `cell` read on the way
fn resolve_tracked(cell: &Cell, value: &Value) -> (Value, Vec<Path>) {
    let log = LogHandle::new();
    let resolved = match resolve::resolve_deep(cell, value, Some(&log)) {
        Ok(resolved) => resolved,
        Err(error) => {
            debug!(%error, "sink value left unresolved");
            value.clone()
        }
    };
    let reads = log
        .snapshot()
        .reads
        .into_iter()
        .filter(|read| read.cell.id() == cell.id())
        .map(|read| read.path)
        .collect();
    (resolved, reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use serde_json::json;
    use std::sync::Arc;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn get_set_and_key() {
        let cell = Cell::new(Value::from_json(json!({"a": {"b": 1}})));
        let simple = cell.as_simple_cell(p("a"), None);
        assert_eq!(simple.key("b").get().unwrap(), 1.into());

        simple.key("b").set(2).unwrap();
        assert_eq!(cell.get().to_json(), json!({"a": {"b": 2}}));
        assert_eq!(simple.get().unwrap().to_json(), json!({"b": 2}));
    }

    #[test]
    fn get_resolves_aliases() {
        let cell = Cell::new(Value::from_json(json!({
            "v": 3,
            "wrap": {"inner": {"$alias": {"path": ["v"]}}}
        })));
        let simple = cell.as_simple_cell(p("wrap"), None);
        assert_eq!(simple.get().unwrap().to_json(), json!({"inner": 3}));
    }

    #[test]
    fn accesses_are_logged() {
        let cell = Cell::new(Value::empty_map());
        let log = LogHandle::new();
        let simple = cell.as_simple_cell(p("x"), Some(&log));
        simple.set(1).unwrap();
        let _ = simple.get().unwrap();
        let record = log.snapshot();
        assert_eq!(record.writes, vec![cell.reference(p("x"))]);
        assert_eq!(record.reads, vec![cell.reference(p("x"))]);
    }

    #[test]
    fn send_on_stream_queues_event() {
        let scheduler = Scheduler::new();
        let cell = scheduler.cell(Value::from_json(json!({"clicks": {"$stream": true}})));
        let simple = cell.as_simple_cell(p("clicks"), None);
        assert!(!simple.send(1).unwrap());
        assert_eq!(scheduler.pending_events(), 1);
        assert!(cell.get_at_path(&p("clicks")).is_stream());

        let value = cell.as_simple_cell(p("value"), None);
        assert!(value.send(2).unwrap());
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[test]
    fn sink_filters_unrelated_changes() {
        let cell = Cell::new(Value::from_json(json!({"a": 1, "b": 1})));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = cell
            .as_simple_cell(p("a"), None)
            .sink(move |value| s.lock().push(value.clone()));

        cell.set_at_path(&p("b"), 2, None).unwrap();
        cell.set_at_path(&p("a"), 5, None).unwrap();
        assert_eq!(*seen.lock(), vec![Value::from(1), Value::from(5)]);
    }

    #[test]
    fn sink_delivers_resolved_values() {
        let cell = Cell::new(Value::from_json(json!({
            "v": 1,
            "a": {"$alias": {"path": ["v"]}}
        })));
        let simple = cell.as_simple_cell(p("a"), None);
        assert_eq!(simple.get().unwrap(), 1.into());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = simple.sink(move |value| s.lock().push(value.clone()));

        cell.set_at_path(&p("v"), 2, None).unwrap();
        assert_eq!(*seen.lock(), vec![Value::from(1), Value::from(2)]);
        assert!(seen.lock().iter().all(|value| !value.is_indirection()));
    }
}
