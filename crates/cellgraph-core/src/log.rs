//! Reactivity log
//!
//! Accumulates the `(cell, path)` reads and writes of one evaluation pass.
//! The scheduler uses the reads to decide which writes re-trigger an action.

use crate::cell::CellReference;
use crate::path::Path;
use parking_lot::Mutex;
use std::sync::Arc;

/// Reads and writes recorded during one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactivityLog {
    pub reads: Vec<CellReference>,
    pub writes: Vec<CellReference>,
}

impl ReactivityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self, reference: CellReference) {
        self.reads.push(reference);
    }

    pub fn record_write(&mut self, reference: CellReference) {
        self.writes.push(reference);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Whether a write to `changed` may invalidate any recorded read
    #[must_use]
    pub fn is_affected_by(&self, changed: &CellReference) -> bool {
        self.reads
            .iter()
            .any(|read| read.cell == changed.cell && path_affected(&changed.path, &read.path))
    }
}

/// Whether a change at `changed` may make a read of `subscribed` stale
///
/// True when either path is a prefix of the other.
#[inline]
#[must_use]
pub fn path_affected(changed: &Path, subscribed: &Path) -> bool {
    changed.overlaps(subscribed)
}

/// Shared handle to a [`ReactivityLog`]
///
/// Views and façades keep a handle so every access they make lands in the
/// same evaluation's log.
#[derive(Debug, Clone, Default)]
pub struct LogHandle(Arc<Mutex<ReactivityLog>>);

impl LogHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self, reference: CellReference) {
        self.0.lock().record_read(reference);
    }

    pub fn record_write(&self, reference: CellReference) {
        self.0.lock().record_write(reference);
    }

    /// Copy of the entries recorded so far
    #[must_use]
    pub fn snapshot(&self) -> ReactivityLog {
        self.0.lock().clone()
    }

    /// Move the recorded entries out, leaving the log empty
    #[must_use]
    pub fn take(&self) -> ReactivityLog {
        std::mem::take(&mut *self.0.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::value::Value;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn path_affected_is_symmetric_prefix() {
        assert!(path_affected(&p("a"), &p("a.b")));
        assert!(path_affected(&p("a.b"), &p("a")));
        assert!(path_affected(&p("a.b"), &p("a.b")));
        assert!(path_affected(&Path::root(), &p("x.y")));
        assert!(!path_affected(&p("a.c"), &p("a.b")));
    }

    #[test]
    fn affected_requires_same_cell() {
        let a = Cell::new(Value::empty_map());
        let b = Cell::new(Value::empty_map());
        let mut log = ReactivityLog::new();
        log.record_read(a.reference(p("x")));

        assert!(log.is_affected_by(&a.reference(p("x.y"))));
        assert!(!log.is_affected_by(&a.reference(p("z"))));
        assert!(!log.is_affected_by(&b.reference(p("x"))));
    }

    #[test]
    fn handle_take_empties() {
        let cell = Cell::new(Value::empty_map());
        let handle = LogHandle::new();
        handle.record_read(cell.reference(Path::root()));
        let taken = handle.take();
        assert_eq!(taken.reads.len(), 1);
        assert!(handle.snapshot().is_empty());
    }
}
