//! Minimal field-path writes computed from two snapshots of a document.
//!
//! A [`Patch`] maps slash-joined paths (`gameState/revealedCards/7`) to the JSON value to write
//! there. A `null` value removes the field. Backends translate the paths into their own
//! addressing scheme, so a patch never rewrites more of the shared document than changed.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Ordered set of field-path writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    writes: IndexMap<String, Value>,
}

impl Patch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the writes that turn `before` into `after`.
    pub fn diff<T: Serialize>(before: &T, after: &T) -> serde_json::Result<Self> {
        let before = serde_json::to_value(before)?;
        let after = serde_json::to_value(after)?;
        let mut patch = Self::new();
        diff_values(&mut patch, "", &before, &after);
        Ok(patch)
    }

    /// Record a write at `path`, replacing any earlier write to the same path.
    pub fn set(&mut self, path: impl Into<String>, value: Value) {
        self.writes.insert(path.into(), value);
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of paths written.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Writes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.writes.iter().map(|(path, value)| (path.as_str(), value))
    }

    /// Apply every write to `target`, creating intermediate objects when a path is missing.
    pub fn apply_to(&self, target: &mut Value) {
        for (path, value) in &self.writes {
            apply_write(target, path, value);
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{segment}")
    }
}

fn diff_values(patch: &mut Patch, prefix: &str, before: &Value, after: &Value) {
    if before == after {
        return;
    }

    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, value) in new {
                let path = join(prefix, key);
                match old.get(key) {
                    Some(previous) => diff_values(patch, &path, previous, value),
                    None if value.is_null() => {}
                    None => patch.set(path, value.clone()),
                }
            }
            for (key, previous) in old {
                if !new.contains_key(key) && !previous.is_null() {
                    patch.set(join(prefix, key), Value::Null);
                }
            }
        }
        // Empty arrays are written whole: several stores cannot address an index of a
        // sequence that does not exist yet.
        (Value::Array(old), Value::Array(new)) if !old.is_empty() && new.len() >= old.len() => {
            for (index, value) in new.iter().enumerate() {
                let path = join(prefix, &index.to_string());
                match old.get(index) {
                    Some(previous) => diff_values(patch, &path, previous, value),
                    None => patch.set(path, value.clone()),
                }
            }
        }
        _ => patch.set(prefix, after.clone()),
    }
}

fn apply_write(target: &mut Value, path: &str, value: &Value) {
    if path.is_empty() {
        *target = value.clone();
        return;
    }

    let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    let Some(last) = segments.pop() else {
        return;
    };
    let parent = segments
        .into_iter()
        .fold(target, |cursor, segment| child_mut(cursor, segment));

    match parent {
        Value::Array(items) => {
            if let Ok(index) = last.parse::<usize>() {
                if index < items.len() {
                    items[index] = value.clone();
                } else {
                    items.resize(index, Value::Null);
                    items.push(value.clone());
                }
            }
        }
        Value::Object(map) => {
            if value.is_null() {
                map.remove(last);
            } else {
                map.insert(last.to_owned(), value.clone());
            }
        }
        other => {
            if !value.is_null() {
                let mut map = Map::new();
                map.insert(last.to_owned(), value.clone());
                *other = Value::Object(map);
            }
        }
    }
}

fn child_mut<'a>(cursor: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match cursor {
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .filter(|index| *index < items.len()),
        _ => None,
    };
    if let Some(index) = index {
        return &mut cursor[index];
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    &mut cursor[segment]
}
