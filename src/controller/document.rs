//! # Configuration Document
//!
//! The operand configuration is a tree of string-keyed maps. Observers never
//! touch it directly: each one returns a [`Fragment`] of path-addressed set and
//! unset operations, and [`merge`] overlays the fragments onto the document
//! from the previous pass.
//!
//! The overlay is targeted. A set replaces exactly the value at its path and
//! leaves sibling keys alone. An unset removes the value at its path and prunes
//! any parent maps left empty by the removal.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors produced while applying fragments
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("observer {observer} wrote {path} outside its declared namespaces")]
    OutOfNamespace { observer: String, path: String },
    #[error("cannot write {path}: {segment} is not an object")]
    NotAnObject { path: String, segment: String },
    #[error("empty path")]
    EmptyPath,
}

/// Path into the document, one segment per map level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    pub fn new(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }

    /// Parse a dotted path such as `build.buildDefaults.env`
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when `self` equals `prefix` or lies beneath it
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single write against the document
#[derive(Debug, Clone, PartialEq)]
pub enum PathOp {
    Set { path: DocPath, value: Value },
    Unset { path: DocPath },
}

impl PathOp {
    pub fn path(&self) -> &DocPath {
        match self {
            PathOp::Set { path, .. } | PathOp::Unset { path } => path,
        }
    }
}

/// The writes produced by one observer in one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    ops: Vec<PathOp>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) -> &mut Self {
        self.ops.push(PathOp::Set {
            path: DocPath::new(path),
            value: value.into(),
        });
        self
    }

    pub fn unset(&mut self, path: &[&str]) -> &mut Self {
        self.ops.push(PathOp::Unset {
            path: DocPath::new(path),
        });
        self
    }

    pub fn ops(&self) -> &[PathOp] {
        &self.ops
    }

    /// True when the fragment sets no paths. Unsets alone still count as empty.
    pub fn is_empty(&self) -> bool {
        self.set_paths().next().is_none()
    }

    /// Paths this fragment assigns a value to
    pub fn set_paths(&self) -> impl Iterator<Item = &DocPath> {
        self.ops.iter().filter_map(|op| match op {
            PathOp::Set { path, .. } => Some(path),
            PathOp::Unset { .. } => None,
        })
    }

    /// Value this fragment assigns at `path`, if any
    pub fn value_at(&self, path: &[&str]) -> Option<&Value> {
        let wanted = DocPath::new(path);
        self.ops.iter().rev().find_map(|op| match op {
            PathOp::Set { path, value } if *path == wanted => Some(value),
            _ => None,
        })
    }

    /// Whether this fragment unsets `path`
    pub fn unsets(&self, path: &[&str]) -> bool {
        let wanted = DocPath::new(path);
        self.ops
            .iter()
            .any(|op| matches!(op, PathOp::Unset { path } if *path == wanted))
    }
}

/// Fragment tagged with the observer that produced it and the namespaces it may write
#[derive(Debug, Clone)]
pub struct Contribution {
    pub observer: &'static str,
    pub namespaces: &'static [&'static str],
    pub fragment: Fragment,
}

/// The operand configuration document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored document. Anything other than an object starts empty.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self(map.clone()),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &self.0;
        for segment in parents {
            current = current.get(*segment)?.as_object()?;
        }
        current.get(*last)
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Set `value` at `path`, creating intermediate maps as needed
    pub fn set_path(&mut self, path: &DocPath, value: Value) -> Result<(), MergeError> {
        let (last, parents) = path.segments().split_last().ok_or(MergeError::EmptyPath)?;
        let mut current = &mut self.0;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(MergeError::NotAnObject {
                        path: path.to_string(),
                        segment: segment.clone(),
                    })
                }
            };
        }
        current.insert(last.clone(), value);
        Ok(())
    }

    /// Remove the value at `path` and prune parents left empty. Missing paths are a no-op.
    pub fn unset_path(&mut self, path: &DocPath) -> Result<(), MergeError> {
        if path.segments().is_empty() {
            return Err(MergeError::EmptyPath);
        }
        remove_and_prune(&mut self.0, path.segments());
        Ok(())
    }

    fn apply(&mut self, op: &PathOp) -> Result<(), MergeError> {
        match op {
            PathOp::Set { path, value } => self.set_path(path, value.clone()),
            PathOp::Unset { path } => self.unset_path(path),
        }
    }
}

/// Returns true when `map` ended up empty
fn remove_and_prune(map: &mut Map<String, Value>, segments: &[String]) -> bool {
    match segments {
        [] => map.is_empty(),
        [leaf] => {
            map.remove(leaf);
            map.is_empty()
        }
        [head, rest @ ..] => {
            let child_empty = match map.get_mut(head) {
                Some(Value::Object(child)) => remove_and_prune(child, rest),
                _ => return map.is_empty(),
            };
            if child_empty {
                map.remove(head);
            }
            map.is_empty()
        }
    }
}

/// Overlay `contributions` onto `prior`, in order
///
/// Every operation must fall inside the namespaces its observer declared.
/// The whole merge is rejected before any write if one does not, so a
/// misbehaving observer never leaves a half-applied document behind.
pub fn merge(
    prior: &ConfigDocument,
    contributions: &[Contribution],
) -> Result<ConfigDocument, MergeError> {
    for contribution in contributions {
        let allowed: Vec<DocPath> = contribution
            .namespaces
            .iter()
            .map(|ns| DocPath::parse(ns))
            .collect();
        for op in contribution.fragment.ops() {
            if !allowed.iter().any(|ns| op.path().starts_with(ns)) {
                return Err(MergeError::OutOfNamespace {
                    observer: contribution.observer.to_string(),
                    path: op.path().to_string(),
                });
            }
        }
    }

    let mut merged = prior.clone();
    for contribution in contributions {
        for op in contribution.fragment.ops() {
            merged.apply(op)?;
        }
    }
    Ok(merged)
}
