//! Dotted key paths over a document tree
//!
//! `services.api.image` addresses `{"services": {"api": {"image": ...}}}`.
//! Segments are plain map keys; there is no array index syntax.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Split a dotted path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Value at `path`, or `None` as soon as a segment is missing or a
/// non-map value is hit on the way
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segs = segments(path);
    if segs.is_empty() {
        return None;
    }
    segs.iter().try_fold(root, |node, seg| node.as_object()?.get(*seg))
}

/// Write `value` at `path`, creating empty maps for missing intermediate
/// segments. A `null` root is promoted to a map.
///
/// Fails without touching the tree when an existing intermediate value (or
/// the root) is something other than a map.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segs = segments(path);
    let Some((leaf, parents)) = segs.split_last() else {
        return Err(Error::EmptyPath);
    };

    // Check the whole chain first so a failed write leaves no half-built maps.
    let mut probe = &*root;
    for seg in parents {
        match probe {
            Value::Null => break,
            Value::Object(map) => match map.get(*seg) {
                Some(next) => probe = next,
                None => break,
            },
            _ => {
                return Err(Error::PathConflict {
                    path: path.to_string(),
                    segment: seg.to_string(),
                });
            }
        }
    }
    if !matches!(probe, Value::Null | Value::Object(_)) {
        return Err(Error::PathConflict {
            path: path.to_string(),
            segment: leaf.to_string(),
        });
    }

    let mut node = root;
    for seg in parents {
        node = as_map(node)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    as_map(node).insert(leaf.to_string(), value);
    Ok(())
}

fn as_map(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made a map"),
    }
}
