//! Paths for addressing sub-values inside a cell
//!
//! Provides [`Path`] for hierarchical addressing of map keys and sequence
//! indices within a [`Value`](crate::Value).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a [`Path`]: a map key or a sequence index
///
/// Keys made only of ASCII digits are normalized to indices, so `"0"` and
/// `0` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Position in a sequence
    Index(usize),
    /// Key in a map
    Key(String),
}

impl PathSegment {
    /// Segment rendered as a map key
    #[must_use]
    pub fn as_key(&self) -> String {
        match self {
            Self::Index(i) => i.to_string(),
            Self::Key(k) => k.clone(),
        }
    }

    /// Segment as a sequence index, if it is one
    #[inline]
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(_) => None,
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = key.parse() {
                return Self::Index(index);
            }
        }
        Self::Key(key)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::from(key.to_string())
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Index(i) => serializer.serialize_u64(*i as u64),
            Self::Key(k) => serializer.serialize_str(k),
        }
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Key(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Index(i) => Self::Index(i),
            Raw::Key(k) => Self::from(k),
        })
    }
}

/// Path within a cell's value
///
/// The empty path denotes the whole value.
///
/// # Examples
/// - `["items", 0, "title"]` → `items.0.title`
/// - `[]` → the root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<PathSegment>) -> Self {
        Self(vec![segment.into()])
    }

    /// Create path from anything convertible into segments
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Append every segment of `other`, returning new path
    #[inline]
    #[must_use]
    pub fn join_path(&self, other: &Self) -> Self {
        let mut new = self.clone();
        new.0.extend(other.0.iter().cloned());
        new
    }

    /// Check if this path is a prefix of another
    ///
    /// # Examples
    /// - `items` is prefix of `items.0.title`
    /// - `items` is NOT prefix of `title`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Check if paths overlap (one is prefix of other)
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<PathSegment> = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else if seg
                    .contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-' && c != '$')
                {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(PathSegment::from(seg))
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl From<&[PathSegment]> for Path {
    fn from(segments: &[PathSegment]) -> Self {
        Self(segments.to_vec())
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<T: IntoIterator<Item = PathSegment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors related to paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must be alphanumeric, '_', '-' or '$')")]
    InvalidSegment(String),

    /// A sequence index beyond the growth limit
    #[error("index {index} in '{path}' exceeds the sequence growth limit")]
    IndexTooLarge { path: String, index: usize },

    /// A key segment was applied to a sequence
    #[error("segment '{segment}' of '{path}' cannot index a sequence")]
    KeyOnSequence { path: String, segment: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn numeric_segments_become_indices() {
        let path = p("items.0.title");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Key("title".into())
            ]
        );
        assert_eq!(PathSegment::from("12"), PathSegment::Index(12));
        assert_eq!(PathSegment::from("1a"), PathSegment::Key("1a".into()));
    }

    #[test]
    fn path_root_parent_is_none() {
        assert!(Path::root().parent().is_none());
        assert_eq!(p("a.b.c").parent().unwrap(), p("a.b"));
    }

    #[test]
    fn path_child_and_join() {
        let base = p("a");
        assert_eq!(base.child("b").child(3usize), p("a.b.3"));
        assert_eq!(base.join_path(&p("x.y")), p("a.x.y"));
    }

    #[test]
    fn path_prefix_and_overlap() {
        let a = p("a.b");
        let b = p("a.b.c");
        let c = p("a.x");

        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(Path::root().overlaps(&c));
    }

    #[test]
    fn path_parse_errors() {
        assert!(matches!("a..b".parse::<Path>(), Err(PathError::EmptySegment)));
        assert!(matches!(
            "a.b c".parse::<Path>(),
            Err(PathError::InvalidSegment(_))
        ));
        assert!("".parse::<Path>().unwrap().is_empty());
    }

    #[test]
    fn path_display_round_trips() {
        let path = Path::from_segments(["items", "2"]);
        assert_eq!(path.to_string(), "items.2");
        assert_eq!(p(&path.to_string()), path);
    }

    #[test]
    fn path_json_accepts_mixed_segments() {
        let path: Path = serde_json::from_str(r#"["items", 1, "3"]"#).unwrap();
        assert_eq!(path, p("items.1.3"));
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["items",1,3]"#);
    }
}
