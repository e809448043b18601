//! Observable, path-addressable value containers
//!
//! A [`Cell`] exclusively owns one [`Value`]. It is mutated only through
//! [`Cell::set_at_path`], which is the single serialization point for the
//! value: it rejects writes to frozen cells, skips deep-equal writes, records
//! the write in the caller's log and notifies every subscriber synchronously.
//!
//! Cells are shared handles. Equality is identity.

use crate::config::RuntimeConfig;
use crate::error::{CellError, ResolveError};
use crate::log::LogHandle;
use crate::path::Path;
use crate::resolve;
use crate::scheduler::{Scheduler, WeakScheduler};
use crate::simple::SimpleCell;
use crate::value::Value;
use crate::view::{self, ViewValue};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;
use uuid::Uuid;

/// Unique identity of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub Uuid);

impl CellId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change callback: receives the new root value and the path that changed
pub type ChangeCallback = Arc<dyn Fn(&Value, &Path) + Send + Sync>;

#[derive(Debug)]
struct CellState {
    value: Value,
    frozen: bool,
}

struct CellInner {
    id: CellId,
    state: RwLock<CellState>,
    subscribers: Mutex<Vec<(u64, ChangeCallback)>>,
    next_subscriber: AtomicU64,
    scheduler: Option<WeakScheduler>,
    max_indirection_depth: usize,
}

/// Shared handle to an observable value container
#[derive(Clone)]
pub struct Cell {
    inner: Arc<CellInner>,
}

impl Cell {
    /// Create a detached cell
    ///
    /// Detached cells notify their subscribers but cannot queue stream
    /// events. Use [`Scheduler::cell`] for cells that take part in a graph.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::build(value.into(), None, RuntimeConfig::default().max_indirection_depth)
    }

    pub(crate) fn attached(value: Value, scheduler: &Scheduler) -> Self {
        Self::build(
            value,
            Some(scheduler.downgrade()),
            scheduler.config().max_indirection_depth,
        )
    }

    fn build(value: Value, scheduler: Option<WeakScheduler>, max_indirection_depth: usize) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: CellId::new(),
                state: RwLock::new(CellState {
                    value,
                    frozen: false,
                }),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(0),
                scheduler,
                max_indirection_depth,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Current value snapshot
    #[must_use]
    pub fn get(&self) -> Value {
        self.inner.state.read().value.clone()
    }

    /// Value reached by literal descent through `path`
    ///
    /// Aliases and references are not followed; missing structure yields
    /// `Undefined`.
    #[must_use]
    pub fn get_at_path(&self, path: &Path) -> Value {
        self.inner.state.read().value.at_path(path)
    }

    /// Write `new_value` at `path`
    ///
    /// Returns whether the value changed. Deep-equal writes are no-ops: no
    /// log record and no notification.
    ///
    /// # Errors
    /// - [`CellError::Frozen`] if the cell is frozen
    /// - [`CellError::Path`] if `path` indexes a sequence with a key
    pub fn set_at_path(
        &self,
        path: &Path,
        new_value: impl Into<Value>,
        log: Option<&LogHandle>,
    ) -> Result<bool, CellError> {
        let snapshot = {
            let mut state = self.inner.state.write();
            if state.frozen {
                return Err(CellError::Frozen { cell: self.id() });
            }
            if !state.value.set_path(path, new_value.into())? {
                return Ok(false);
            }
            state.value.clone()
        };

        if let Some(log) = log {
            log.record_write(self.reference(path.clone()));
        }

        let callbacks: Vec<ChangeCallback> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        trace!(cell = %self.id(), %path, subscribers = callbacks.len(), "cell write");
        for callback in callbacks {
            callback(&snapshot, path);
        }
        Ok(true)
    }

    /// Replace the whole value
    ///
    /// # Errors
    /// Returns [`CellError::Frozen`] if the cell is frozen.
    pub fn send(&self, new_value: impl Into<Value>, log: Option<&LogHandle>) -> Result<bool, CellError> {
        self.set_at_path(&Path::root(), new_value, log)
    }

    /// Register a change subscriber
    pub fn updates(&self, callback: impl Fn(&Value, &Path) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            cell: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Register a change subscriber and replay the current value to it
    pub fn sink(&self, callback: impl Fn(&Value, &Path) + Send + Sync + 'static) -> Subscription {
        callback(&self.get(), &Path::root());
        self.updates(callback)
    }

    /// Number of registered subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Make the cell read-only for the rest of its lifetime
    pub fn freeze(&self) {
        self.inner.state.write().frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.state.read().frozen
    }

    /// Non-owning locator for `path` inside this cell
    #[must_use]
    pub fn reference(&self, path: Path) -> CellReference {
        CellReference {
            cell: self.clone(),
            path,
        }
    }

    /// Transparent view rooted at `path`
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn view(&self, path: &Path, log: Option<&LogHandle>) -> Result<ViewValue, ResolveError> {
        view::open(self, path, log)
    }

    /// Minimal get/set/key façade rooted at `path`
    #[must_use]
    pub fn as_simple_cell(&self, path: Path, log: Option<&LogHandle>) -> SimpleCell {
        SimpleCell::new(self.clone(), path, log.cloned())
    }

    /// Value with every alias and reference replaced by its target
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn resolved_value(&self) -> Result<Value, ResolveError> {
        resolve::resolve_deep(self, &self.get(), None)
    }

    /// Scheduler this cell was created by, if it is still alive
    #[must_use]
    pub fn scheduler(&self) -> Option<Scheduler> {
        self.inner.scheduler.as_ref().and_then(WeakScheduler::upgrade)
    }

    #[inline]
    pub(crate) fn max_indirection_depth(&self) -> usize {
        self.inner.max_indirection_depth
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Non-owning `(cell, path)` locator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellReference {
    pub cell: Cell,
    pub path: Path,
}

impl CellReference {
    #[inline]
    #[must_use]
    pub fn new(cell: Cell, path: Path) -> Self {
        Self { cell, path }
    }

    /// Literal value at the referenced location
    #[must_use]
    pub fn get(&self) -> Value {
        self.cell.get_at_path(&self.path)
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.cell.id(), self.path)
    }
}

/// Unsubscribe handle returned by [`Cell::updates`] and [`Cell::sink`]
///
/// Dropping the handle removes the callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cell: Weak<CellInner>,
    id: u64,
}

impl Subscription {
    /// Remove the callback now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
