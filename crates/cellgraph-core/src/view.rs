//! Transparent views over cell contents
//!
//! A [`View`] lets node code read and write nested data as if it were plain
//! structured data. Every descent re-opens the path through the resolver so
//! aliases and references are followed on demand and each access lands in
//! the view's reactivity log.
//!
//! Writes go through [`Cell::set_at_path`]. A write whose destination holds
//! an alias is redirected to the alias target, so bound outputs propagate to
//! the cell they point at. Sequence mutations copy the sequence, apply the
//! change and write the result back once.

use crate::cell::{Cell, CellReference};
use crate::error::{CellError, ResolveError, ViewError};
use crate::log::LogHandle;
use crate::path::{Path, PathSegment};
use crate::resolve::Walk;
use crate::value::Value;
use std::cmp::Ordering;

/// What a path resolves to when opened through a view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewValue {
    /// Scalar or missing value, returned as-is
    Scalar(Value),
    /// Map or sequence, wrapped for further transparent access
    Structured(View),
    /// Stream location, usable only to send events
    Stream(StreamSender),
}

impl ViewValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_view(&self) -> Option<&View> {
        match self {
            Self::Structured(view) => Some(view),
            _ => None,
        }
    }

    /// The structured view, or [`ViewError::NotStructured`] naming `path`
    ///
    /// # Errors
    /// Returns [`ViewError::NotStructured`] for scalars and streams.
    pub fn into_view(self, path: &Path) -> Result<View, ViewError> {
        match self {
            Self::Structured(view) => Ok(view),
            _ => Err(ViewError::NotStructured { path: path.clone() }),
        }
    }

    #[must_use]
    pub fn as_stream(&self) -> Option<&StreamSender> {
        match self {
            Self::Stream(sender) => Some(sender),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Value::as_f64)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Value::as_bool)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Scalar(Value::Undefined))
    }

    /// Descend one more level
    ///
    /// Scalars and streams have no children and yield `Undefined`.
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn field(&self, key: impl Into<PathSegment>) -> Result<ViewValue, ResolveError> {
        match self {
            Self::Structured(view) => view.field(key),
            _ => Ok(Self::Scalar(Value::Undefined)),
        }
    }

    /// Plain value with every indirection resolved
    ///
    /// Streams render as the stream marker.
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn to_value(&self) -> Result<Value, ResolveError> {
        match self {
            Self::Scalar(value) => Ok(value.clone()),
            Self::Structured(view) => view.to_value(),
            Self::Stream(_) => Ok(Value::StreamAlias),
        }
    }
}

/// Open `path` of `cell` for transparent access
///
/// Records a read of the requested location and, when indirections moved
/// the traversal elsewhere, of the location finally reached.
pub(crate) fn open(cell: &Cell, path: &Path, log: Option<&LogHandle>) -> Result<ViewValue, ResolveError> {
    let requested = cell.reference(path.clone());
    if let Some(log) = log {
        log.record_read(requested.clone());
    }

    let mut walk = Walk::new(cell, log);
    let resolved = walk.follow(cell, path)?;

    if let Some(log) = log {
        let terminal = resolved.reference();
        if terminal != requested && walk.last_logged() != Some(&terminal) {
            log.record_read(terminal);
        }
    }

    let location = Location {
        cell: resolved.cell,
        path: resolved.path,
        log: log.cloned(),
    };
    Ok(match resolved.value {
        Value::StreamAlias => ViewValue::Stream(StreamSender { location }),
        Value::Map(_) | Value::Sequence(_) => ViewValue::Structured(View { location }),
        other => ViewValue::Scalar(other),
    })
}

/// Write `value` at `path`, following indirections to the owning location
///
/// Aliases met on the way to the parent are followed, and so is an alias
/// held at the destination itself, so the write lands where a read of
/// `path` would have found its value. Resolution done here is not logged as
/// a read; only the final write is.
///
/// # Errors
/// Returns [`CellError`] when the target rejects the write or an alias
/// chain does not terminate.
pub fn write_through(
    cell: &Cell,
    path: &Path,
    value: impl Into<Value>,
    log: Option<&LogHandle>,
) -> Result<bool, CellError> {
    let mut walk = Walk::new(cell, None);
    let (owner, at) = match (path.parent(), path.last()) {
        (Some(parent), Some(last)) => {
            let parent = walk.follow(cell, &parent)?;
            (parent.cell, parent.path.child(last.clone()))
        }
        _ => (cell.clone(), Path::root()),
    };

    let destination = owner.get_at_path(&at);
    let (owner, at) = if destination.is_indirection() {
        let (target, target_path, _) = walk.reroot(owner, at, destination)?;
        (target, target_path)
    } else {
        (owner, at)
    };
    owner.set_at_path(&at, value, log)
}

#[derive(Debug, Clone)]
struct Location {
    cell: Cell,
    path: Path,
    log: Option<LogHandle>,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell && self.path == other.path
    }
}

/// Transparent handle on a map or sequence inside a cell
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    location: Location,
}

impl View {
    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.location.cell
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.location.path
    }

    /// Locator of the viewed value
    #[must_use]
    pub fn reference(&self) -> CellReference {
        self.location.cell.reference(self.location.path.clone())
    }

    /// Literal current value, indirections left in place
    #[must_use]
    pub fn get(&self) -> Value {
        self.location.cell.get_at_path(&self.location.path)
    }

    /// Current value with every indirection resolved
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn to_value(&self) -> Result<Value, ResolveError> {
        crate::resolve::resolve_deep(&self.location.cell, &self.get(), self.location.log.as_ref())
    }

    /// Open a child for transparent access
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn field(&self, key: impl Into<PathSegment>) -> Result<ViewValue, ResolveError> {
        open(
            &self.location.cell,
            &self.location.path.child(key),
            self.location.log.as_ref(),
        )
    }

    /// Map keys, empty for sequences
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.get()
            .as_map()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Write a child
    ///
    /// # Errors
    /// Returns [`ViewError::Cell`] when the write is rejected.
    pub fn set(&self, key: impl Into<PathSegment>, value: impl Into<Value>) -> Result<bool, ViewError> {
        Ok(write_through(
            &self.location.cell,
            &self.location.path.child(key),
            value,
            self.location.log.as_ref(),
        )?)
    }

    /// Remove a map entry
    ///
    /// # Errors
    /// Returns [`ViewError::Cell`] when the write is rejected.
    pub fn remove(&self, key: impl Into<PathSegment>) -> Result<bool, ViewError> {
        self.set(key, Value::Undefined)
    }

    // Sequence access

    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self.get(), Value::Sequence(_))
    }

    /// Number of entries, for maps and sequences alike
    #[must_use]
    pub fn len(&self) -> usize {
        match self.get() {
            Value::Sequence(items) => items.len(),
            Value::Map(map) => map.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open the element at `index`
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an indirection chain does not terminate.
    pub fn at(&self, index: usize) -> Result<ViewValue, ResolveError> {
        self.field(index)
    }

    /// Open every element of a sequence
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an element's chain does not terminate.
    pub fn items(&self) -> Result<Vec<ViewValue>, ResolveError> {
        (0..self.sequence_len()).map(|i| self.at(i)).collect()
    }

    /// Resolved copy of every element of a sequence
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an element's chain does not terminate.
    pub fn to_vec(&self) -> Result<Vec<Value>, ResolveError> {
        self.items()?.iter().map(ViewValue::to_value).collect()
    }

    /// Index of the first resolved element matching `predicate`
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an element's chain does not terminate.
    pub fn position(&self, mut predicate: impl FnMut(&Value) -> bool) -> Result<Option<usize>, ResolveError> {
        Ok(self.to_vec()?.iter().position(|v| predicate(v)))
    }

    /// Whether a resolved element equals `needle`
    ///
    /// # Errors
    /// Returns [`ResolveError`] when an element's chain does not terminate.
    pub fn contains(&self, needle: &Value) -> Result<bool, ResolveError> {
        Ok(self.position(|v| v == needle)?.is_some())
    }

    /// Append an element, returning the new length
    ///
    /// # Errors
    /// - [`ViewError::NotASequence`] if the viewed value is not a sequence
    /// - [`ViewError::Cell`] if the write is rejected
    pub fn push(&self, item: impl Into<Value>) -> Result<usize, ViewError> {
        let item = item.into();
        self.mutate_sequence(|items| {
            items.push(item);
            Ok(items.len())
        })
    }

    /// Remove and return the last element
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn pop(&self) -> Result<Option<Value>, ViewError> {
        self.mutate_sequence(|items| Ok(items.pop()))
    }

    /// Remove and return the first element
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn shift(&self) -> Result<Option<Value>, ViewError> {
        self.mutate_sequence(|items| Ok((!items.is_empty()).then(|| items.remove(0))))
    }

    /// Prepend an element, returning the new length
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn unshift(&self, item: impl Into<Value>) -> Result<usize, ViewError> {
        let item = item.into();
        self.mutate_sequence(|items| {
            items.insert(0, item);
            Ok(items.len())
        })
    }

    /// Insert an element before `index`
    ///
    /// # Errors
    /// [`ViewError::IndexOutOfRange`] if `index` is past the end, otherwise
    /// see [`View::push`].
    pub fn insert(&self, index: usize, item: impl Into<Value>) -> Result<(), ViewError> {
        let item = item.into();
        self.mutate_sequence(|items| {
            if index > items.len() {
                return Err(ViewError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item);
            Ok(())
        })
    }

    /// Remove and return the element at `index`
    ///
    /// # Errors
    /// [`ViewError::IndexOutOfRange`] if there is no such element, otherwise
    /// see [`View::push`].
    pub fn remove_at(&self, index: usize) -> Result<Value, ViewError> {
        self.mutate_sequence(|items| {
            if index >= items.len() {
                return Err(ViewError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        })
    }

    /// Replace `delete_count` elements from `start` with `replacement`
    ///
    /// Returns the removed elements. `start` and `delete_count` are clamped
    /// to the sequence bounds.
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        replacement: Vec<Value>,
    ) -> Result<Vec<Value>, ViewError> {
        self.mutate_sequence(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            Ok(items.splice(start..end, replacement).collect())
        })
    }

    /// Sort elements in place with `compare`
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<(), ViewError> {
        self.mutate_sequence(|items| {
            items.sort_by(compare);
            Ok(())
        })
    }

    /// Reverse elements in place
    ///
    /// # Errors
    /// See [`View::push`].
    pub fn reverse(&self) -> Result<(), ViewError> {
        self.mutate_sequence(|items| {
            items.reverse();
            Ok(())
        })
    }

    fn sequence_len(&self) -> usize {
        self.get().as_sequence().map_or(0, <[Value]>::len)
    }

    fn mutate_sequence<R>(
        &self,
        op: impl FnOnce(&mut Vec<Value>) -> Result<R, ViewError>,
    ) -> Result<R, ViewError> {
        let Value::Sequence(mut items) = self.get() else {
            return Err(ViewError::NotASequence {
                path: self.location.path.clone(),
            });
        };
        let result = op(&mut items)?;
        self.location.cell.set_at_path(
            &self.location.path,
            Value::Sequence(items),
            self.location.log.as_ref(),
        )?;
        Ok(result)
    }
}

impl From<&View> for Value {
    fn from(view: &View) -> Self {
        Self::Reference(view.reference())
    }
}

impl From<View> for Value {
    fn from(view: View) -> Self {
        Self::from(&view)
    }
}

/// Send-only handle on a stream location
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSender {
    location: Location,
}

impl StreamSender {
    #[must_use]
    pub fn reference(&self) -> CellReference {
        self.location.cell.reference(self.location.path.clone())
    }

    /// Queue `event` for delivery on the next scheduler pass
    ///
    /// # Errors
    /// Returns [`CellError::NoScheduler`] when the stream's cell is not
    /// attached to a live scheduler.
    pub fn send(&self, event: impl Into<Value>) -> Result<(), CellError> {
        let cell = &self.location.cell;
        let scheduler = cell
            .scheduler()
            .ok_or(CellError::NoScheduler { cell: cell.id() })?;
        let reference = self.reference();
        if let Some(log) = &self.location.log {
            log.record_write(reference.clone());
        }
        scheduler.queue_event(reference, event.into());
        Ok(())
    }
}
