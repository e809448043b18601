//! Structured values stored in cells
//!
//! A [`Value`] is a tree of scalars, sequences and maps that may embed the
//! special markers the resolver understands: [`Alias`], stream aliases and
//! [`CellReference`]s. Classification is a plain pattern match.

use crate::cell::{Cell, CellReference};
use crate::path::{Path, PathError, PathSegment};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::collections::BTreeMap;

/// Reserved key marking an alias in the JSON form
pub const ALIAS_KEY: &str = "$alias";

/// Reserved key marking a stream in the JSON form
pub const STREAM_KEY: &str = "$stream";

/// Reserved key marking a cell reference in the JSON form
pub const REFERENCE_KEY: &str = "$ref";

/// Most slots a single write may append to a sequence
pub const MAX_SEQUENCE_GROWTH: usize = 1 << 16;

/// Keyed map of values (ordering is irrelevant)
pub type Map = BTreeMap<String, Value>;

/// Symbolic pointer embedded in a value
///
/// Without an explicit cell the alias points into the cell that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Target path inside the owning cell
    pub path: Path,
    /// Owning cell, when different from the cell holding the alias
    pub cell: Option<Cell>,
}

impl Alias {
    /// Alias into the cell that will hold it
    #[inline]
    #[must_use]
    pub fn new(path: Path) -> Self {
        Self { path, cell: None }
    }

    /// Alias into an explicit cell
    #[inline]
    #[must_use]
    pub fn in_cell(cell: Cell, path: Path) -> Self {
        Self {
            path,
            cell: Some(cell),
        }
    }
}

/// A structured value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar
    Number(Number),
    /// String scalar
    String(String),
    /// Ordered sequence
    Sequence(Vec<Value>),
    /// Keyed map
    Map(Map),
    /// Pointer to a path, optionally in another cell
    Alias(Alias),
    /// Fire-and-forget event channel
    StreamAlias,
    /// Explicit `(cell, path)` locator
    Reference(CellReference),
}

impl Value {
    /// Alias into the cell that will hold it
    #[must_use]
    pub fn alias(path: Path) -> Self {
        Self::Alias(Alias::new(path))
    }

    /// Alias into an explicit cell
    #[must_use]
    pub fn alias_in(cell: &Cell, path: Path) -> Self {
        Self::Alias(Alias::in_cell(cell.clone(), path))
    }

    /// Empty map
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(Map::new())
    }

    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// True for maps and sequences
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Sequence(_))
    }

    /// True for aliases and cell references
    #[inline]
    #[must_use]
    pub fn is_indirection(&self) -> bool {
        matches!(self, Self::Alias(_) | Self::Reference(_))
    }

    #[inline]
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::StreamAlias)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Literal child lookup, no indirection following
    #[must_use]
    pub fn child(&self, segment: &PathSegment) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(&segment.as_key()),
            Self::Sequence(items) => segment.as_index().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Literal descent through `path`
    #[must_use]
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        path.iter()
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Value at `path`, or `Undefined` when the structure does not exist
    #[must_use]
    pub fn at_path(&self, path: &Path) -> Value {
        self.get_path(path).cloned().unwrap_or_default()
    }

    /// Whether a defined value exists at `path`
    #[must_use]
    pub fn has_value_at_path(&self, path: &Path) -> bool {
        self.get_path(path).is_some_and(|v| !v.is_undefined())
    }

    /// Write `new` at `path`, creating intermediate containers
    ///
    /// Returns whether the value changed. A numeric segment creates a
    /// sequence, anything else a map; scalars standing in the way are
    /// replaced. Writing `Undefined` into a map removes the key.
    ///
    /// # Errors
    /// - [`PathError::KeyOnSequence`] when a non-numeric key meets an
    ///   existing sequence
    /// - [`PathError::IndexTooLarge`] when an index lies more than
    ///   [`MAX_SEQUENCE_GROWTH`] slots past the end of a sequence
    pub fn set_path(&mut self, path: &Path, new: Value) -> Result<bool, PathError> {
        if self.at_path(path) == new {
            return Ok(false);
        }
        self.set_segments(path, path.segments(), new)?;
        Ok(true)
    }

    fn set_segments(
        &mut self,
        full: &Path,
        segments: &[PathSegment],
        new: Value,
    ) -> Result<(), PathError> {
        let Some((head, rest)) = segments.split_first() else {
            *self = new;
            return Ok(());
        };

        match self {
            Self::Map(map) => {
                let key = head.as_key();
                if rest.is_empty() && new.is_undefined() {
                    map.remove(&key);
                    return Ok(());
                }
                if let Some(child) = map.get_mut(&key) {
                    return child.set_segments(full, rest, new);
                }
                let mut child = Self::Undefined;
                child.set_segments(full, rest, new)?;
                map.insert(key, child);
                Ok(())
            }
            Self::Sequence(items) => {
                let index = head.as_index().ok_or_else(|| PathError::KeyOnSequence {
                    path: full.to_string(),
                    segment: head.to_string(),
                })?;
                if index >= items.len() {
                    let len = index
                        .checked_add(1)
                        .filter(|len| len - items.len() <= MAX_SEQUENCE_GROWTH)
                        .ok_or_else(|| PathError::IndexTooLarge {
                            path: full.to_string(),
                            index,
                        })?;
                    let mut child = Self::Undefined;
                    child.set_segments(full, rest, new)?;
                    items.resize(len, Self::Undefined);
                    items[index] = child;
                    return Ok(());
                }
                items[index].set_segments(full, rest, new)
            }
            scalar => {
                let mut container = match head {
                    PathSegment::Index(_) => Self::Sequence(Vec::new()),
                    PathSegment::Key(_) => Self::empty_map(),
                };
                container.set_segments(full, segments, new)?;
                *scalar = container;
                Ok(())
            }
        }
    }

    /// Deep merge `other` into `self`
    ///
    /// Maps merge key by key; anything else in `other` replaces the
    /// current value. `Undefined` in `other` leaves the target untouched.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (_, Self::Undefined) => {}
            (Self::Map(target), Self::Map(source)) => {
                for (key, value) in source {
                    target.entry(key).or_default().merge(value);
                }
            }
            (target, other) => *target = other,
        }
    }

    /// Convert from JSON, recognizing the reserved alias and stream markers
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Sequence(items.into_iter().map(Self::from_json).collect()),
            Json::Object(object) => {
                if object.len() == 1 {
                    if let Some(Json::Object(alias)) = object.get(ALIAS_KEY) {
                        if let Some(path) = alias
                            .get("path")
                            .and_then(|p| serde_json::from_value::<Path>(p.clone()).ok())
                        {
                            return Self::alias(path);
                        }
                    }
                    if object.get(STREAM_KEY) == Some(&Json::Bool(true)) {
                        return Self::StreamAlias;
                    }
                }
                Self::Map(
                    object
                        .into_iter()
                        .map(|(key, value)| (key, Self::from_json(value)))
                        .collect(),
                )
            }
        }
    }

    /// Convert to JSON
    ///
    /// `Undefined` map entries are omitted; elsewhere they render as null.
    /// Cells are rendered by id and cannot be read back.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Undefined | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => Json::Number(n.clone()),
            Self::String(s) => Json::String(s.clone()),
            Self::Sequence(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Alias(alias) => {
                let mut inner = JsonMap::new();
                inner.insert("path".into(), path_json(&alias.path));
                if let Some(cell) = &alias.cell {
                    inner.insert("cell".into(), Json::String(cell.id().to_string()));
                }
                single(ALIAS_KEY, Json::Object(inner))
            }
            Self::StreamAlias => single(STREAM_KEY, Json::Bool(true)),
            Self::Reference(reference) => {
                let mut inner = JsonMap::new();
                inner.insert("cell".into(), Json::String(reference.cell.id().to_string()));
                inner.insert("path".into(), path_json(&reference.path));
                single(REFERENCE_KEY, Json::Object(inner))
            }
        }
    }
}

fn single(key: &str, value: Json) -> Json {
    let mut object = JsonMap::new();
    object.insert(key.to_string(), value);
    Json::Object(object)
}

fn path_json(path: &Path) -> Json {
    serde_json::to_value(path).unwrap_or(Json::Null)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number((value as u64).into())
    }
}

impl From<f64> for Value {
    /// Integral floats become integers so `2.0` equals `2`; NaN and
    /// infinities become null.
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            return Self::Number((value as i64).into());
        }
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Map(map)
    }
}

impl From<Alias> for Value {
    fn from(alias: Alias) -> Self {
        Self::Alias(alias)
    }
}

impl From<CellReference> for Value {
    fn from(reference: CellReference) -> Self {
        Self::Reference(reference)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Self::from_json(json)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
