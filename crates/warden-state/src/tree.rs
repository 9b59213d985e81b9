//! Path-addressed reads and writes on a JSON value tree

use crate::error::{StoreError, StoreResult};
use crate::path::{PathSegment, StatePath};
use serde_json::{Map, Value};

/// Read the value at `path`
///
/// Returns `None` as soon as a segment is missing or the node along the way
/// is not a container. The root path returns the whole tree.
#[must_use]
pub fn get_at<'a>(tree: &'a Value, path: &StatePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| child(node, segment))
}

fn child<'a>(node: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        _ => None,
    }
}

/// Write `value` at `path`
///
/// Missing or non-container intermediate nodes become empty objects. An
/// index segment on an array replaces an existing element or appends one
/// at `len`; it never pads. With `merge`, an object written over an
/// existing object is shallow-merged into it; anything else replaces the
/// slot.
///
/// # Errors
/// - [`StoreError::RootNotObject`] when writing a non-object at the root
/// - [`StoreError::KeyOnArray`] when a key segment meets an array
/// - [`StoreError::IndexOutOfRange`] when an index is past the end of an array
pub fn set_at(tree: &mut Value, path: &StatePath, value: Value, merge: bool) -> StoreResult<()> {
    let Some((last, parents)) = path.segments().split_last() else {
        if !value.is_object() {
            return Err(StoreError::RootNotObject);
        }
        assign(tree, value, merge);
        return Ok(());
    };

    check_slots(tree, path)?;

    let mut node = tree;
    for (depth, segment) in parents.iter().enumerate() {
        node = descend_or_create(node, segment)
            .ok_or_else(|| array_conflict(path, depth, segment))?;
    }

    let slot = slot_or_create(node, last)
        .ok_or_else(|| array_conflict(path, parents.len(), last))?;
    assign(slot, value, merge);
    Ok(())
}

/// Shallow-merge `source` keys into `target`, later keys winning
pub fn shallow_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        target.insert(key, value);
    }
}

fn assign(slot: &mut Value, value: Value, merge: bool) {
    match (slot, value) {
        (Value::Object(existing), Value::Object(incoming)) if merge => {
            shallow_merge(existing, incoming);
        }
        (slot, value) => *slot = value,
    }
}

fn descend_or_create<'a>(node: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    let slot = slot_or_create(node, segment)?;
    if !(slot.is_object() || slot.is_array()) {
        *slot = Value::Object(Map::new());
    }
    Some(slot)
}

fn slot_or_create<'a>(node: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    if !(node.is_object() || node.is_array()) {
        *node = Value::Object(Map::new());
    }

    match (node, segment) {
        (Value::Array(items), PathSegment::Index(i)) => {
            if *i == items.len() {
                items.push(Value::Null);
            }
            items.get_mut(*i)
        }
        (Value::Object(map), segment) => Some(map.entry(segment.as_key()).or_insert(Value::Null)),
        _ => None,
    }
}

// Walks the existing part of the tree so a bad segment fails before
// anything is created or appended.
fn check_slots(tree: &Value, path: &StatePath) -> StoreResult<()> {
    let mut node = tree;
    for (depth, segment) in path.segments().iter().enumerate() {
        if let Value::Array(items) = node {
            match segment {
                PathSegment::Index(index) if *index > items.len() => {
                    let at = StatePath::new(path.segments()[..depth].to_vec());
                    return Err(StoreError::index_out_of_range(at, *index, items.len()));
                }
                PathSegment::Key(_) => return Err(array_conflict(path, depth, segment)),
                PathSegment::Index(_) => {}
            }
        }
        match child(node, segment) {
            Some(next) => node = next,
            None => return Ok(()),
        }
    }
    Ok(())
}

fn array_conflict(path: &StatePath, depth: usize, segment: &PathSegment) -> StoreError {
    let at = StatePath::new(path.segments()[..depth].to_vec());
    StoreError::key_on_array(at, segment.as_key())
}
