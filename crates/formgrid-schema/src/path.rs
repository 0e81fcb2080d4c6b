use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single step in a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Object member access (`profile`, `firstName`)
    Key(String),

    /// Array element access (`[0]`)
    Index(usize),
}

/// Error raised when a field path string cannot be parsed or applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid field path '{path}': {reason}")]
pub struct PathError {
    /// The offending path as written
    pub path: String,

    /// Why it was rejected
    pub reason: String,
}

impl PathError {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PathError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Location of a value within a (possibly nested) record.
///
/// Written as dot-separated keys with bracketed indices, e.g. `profile.email`
/// or `contacts[0].value`. Resolution against a record never fails: a
/// missing member, an out-of-range index or a scalar in the middle of the
/// path all resolve to "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

#[derive(Clone, Copy, PartialEq)]
enum ParseState {
    Start,
    InKey,
    AfterDot,
    AfterIndex,
}

impl FieldPath {
    /// The empty path, addressing the record itself
    pub fn root() -> Self {
        FieldPath::default()
    }

    /// Parse a path such as `contacts[2].value`
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::new(input, "path is empty"));
        }

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut state = ParseState::Start;
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match (state, c) {
                (ParseState::InKey, '.') => {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    state = ParseState::AfterDot;
                }
                (ParseState::AfterIndex, '.') => state = ParseState::AfterDot,
                (ParseState::Start | ParseState::InKey | ParseState::AfterIndex, '[') => {
                    if state == ParseState::InKey {
                        segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(other) => {
                                return Err(PathError::new(
                                    input,
                                    format!("unexpected '{}' inside index", other),
                                ))
                            }
                            None => return Err(PathError::new(input, "unterminated index")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| PathError::new(input, "index must be a non-negative integer"))?;
                    segments.push(PathSegment::Index(index));
                    state = ParseState::AfterIndex;
                }
                (_, '.') | (_, '[') | (_, ']') => {
                    return Err(PathError::new(input, format!("unexpected '{}'", c)));
                }
                (ParseState::AfterIndex, _) => {
                    return Err(PathError::new(input, "expected '.' or '[' after index"));
                }
                (_, c) => {
                    key.push(c);
                    state = ParseState::InKey;
                }
            }
        }

        match state {
            ParseState::InKey => segments.push(PathSegment::Key(key)),
            ParseState::AfterDot => return Err(PathError::new(input, "trailing '.'")),
            _ => {}
        }

        Ok(FieldPath { segments })
    }

    /// The segments of this path
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Child path addressing member `key`
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        FieldPath { segments }
    }

    /// Child path addressing element `index`
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        FieldPath { segments }
    }

    /// The path without its last segment
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(FieldPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The last segment, if any
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// True when `prefix` addresses this path or one of its ancestors
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The same path with every index replaced by `0`.
    ///
    /// Schemas declare array elements once, so two paths address the same
    /// declared field exactly when their canonical forms are equal.
    pub fn canonical(&self) -> Self {
        FieldPath {
            segments: self
                .segments
                .iter()
                .map(|s| match s {
                    PathSegment::Index(_) => PathSegment::Index(0),
                    key => key.clone(),
                })
                .collect(),
        }
    }

    /// Resolve this path inside `root`. Missing members yield `None`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut cur = root;
        for segment in &self.segments {
            cur = match (segment, cur) {
                (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
                (PathSegment::Index(i), Value::Array(arr)) => arr.get(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Write `value` at this path, creating intermediate objects as needed.
    ///
    /// Array indices may address an existing element or the position right
    /// after the last one (append). Descending through a scalar is an error.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        if self.segments.is_empty() {
            *root = value;
            return Ok(());
        }
        if root.is_null() {
            *root = Value::Object(Map::new());
        }

        let mut cur = root;
        let last = self.segments.len() - 1;
        for (pos, segment) in self.segments.iter().enumerate() {
            let next_is_index = matches!(self.segments.get(pos + 1), Some(PathSegment::Index(_)));
            let placeholder = || {
                if next_is_index {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                }
            };
            cur = match (segment, cur) {
                (PathSegment::Key(k), Value::Object(map)) => {
                    if pos == last {
                        map.insert(k.clone(), value);
                        return Ok(());
                    }
                    let entry = map.entry(k.clone()).or_insert_with(placeholder);
                    if entry.is_null() {
                        *entry = placeholder();
                    }
                    entry
                }
                (PathSegment::Index(i), Value::Array(arr)) => {
                    if *i > arr.len() {
                        return Err(PathError::new(
                            self.to_string(),
                            format!("index {} is past the end of an array of length {}", i, arr.len()),
                        ));
                    }
                    if *i == arr.len() {
                        arr.push(placeholder());
                    }
                    if pos == last {
                        arr[*i] = value;
                        return Ok(());
                    }
                    let slot = &mut arr[*i];
                    if slot.is_null() {
                        *slot = placeholder();
                    }
                    slot
                }
                _ => {
                    return Err(PathError::new(
                        self.to_string(),
                        format!("cannot descend into a scalar at segment {}", pos),
                    ))
                }
            };
        }
        Ok(())
    }

    /// Remove the value at this path, returning it if it existed
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (last, parent) = self.segments.split_last()?;
        let mut cur = root;
        for segment in parent {
            cur = match (segment, cur) {
                (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k)?,
                (PathSegment::Index(i), Value::Array(arr)) => arr.get_mut(*i)?,
                _ => return None,
            };
        }
        match (last, cur) {
            (PathSegment::Key(k), Value::Object(map)) => map.remove(k),
            (PathSegment::Index(i), Value::Array(arr)) if *i < arr.len() => Some(arr.remove(*i)),
            _ => None,
        }
    }

    /// Re-address this path after element `removed` was taken out of the array at `array`.
    ///
    /// Paths inside the removed element yield `None`; paths inside later
    /// elements shift down by one; everything else is returned unchanged.
    pub fn shift_after_removal(&self, array: &FieldPath, removed: usize) -> Option<Self> {
        if !self.starts_with(array) {
            return Some(self.clone());
        }
        match self.segments.get(array.len()) {
            Some(PathSegment::Index(i)) if *i == removed => None,
            Some(PathSegment::Index(i)) if *i > removed => {
                let mut segments = self.segments.clone();
                segments[array.len()] = PathSegment::Index(i - 1);
                Some(FieldPath { segments })
            }
            _ => Some(self.clone()),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pos, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if pos == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        FieldPath::parse(value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
