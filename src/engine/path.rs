//! # engine::path
//!
//! Dotted-path access and structural diffing over `serde_json::Value`.
//!
//! The store keeps a typed [`TradingState`](crate::models::TradingState) but
//! talks to observers in dotted paths (`stocks.AAPL.price`). These helpers
//! bridge the two: the store projects the state to a `Value` before and after
//! a write and [`diff`] turns the difference into leaf-level mutations.

use serde_json::{Map, Value};

use crate::models::{Mutation, MutationAction};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

/// Reads `path`; an empty path is the root.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, key| child(node, key))
}

fn split_last(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = segments(path).collect();
    let last = parts.pop()?;
    Some((parts, last))
}

fn parent_mut<'a>(root: &'a mut Value, parents: &[&str]) -> Option<&'a mut Value> {
    parents.iter().try_fold(root, |node, key| child_mut(node, key))
}

/// Writes `value` at `path`, returning what was there (`Null` for a new key).
///
/// Intermediate segments must exist. The last segment may name a new key of
/// an object. Returns `None` if the path does not resolve.
pub fn set(root: &mut Value, path: &str, value: Value) -> Option<Value> {
    let (parents, last) = split_last(path)?;
    match parent_mut(root, &parents)? {
        Value::Object(map) => Some(map.insert(last.to_string(), value).unwrap_or(Value::Null)),
        Value::Array(items) => {
            let slot = items.get_mut(last.parse::<usize>().ok()?)?;
            Some(std::mem::replace(slot, value))
        }
        _ => None,
    }
}

/// Removes the object key at `path`, returning the removed value.
pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    let (parents, last) = split_last(path)?;
    match parent_mut(root, &parents)? {
        Value::Object(map) => map.remove(last),
        _ => None,
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Leaf-level changes from `before` to `after`, in key order.
///
/// Objects are walked key by key; anything else (numbers, strings, arrays) is
/// compared as a whole.
pub fn diff(before: &Value, after: &Value) -> Vec<Mutation> {
    let mut out = Vec::new();
    diff_into("", before, after, &mut out);
    out
}

fn diff_into(prefix: &str, before: &Value, after: &Value, out: &mut Vec<Mutation>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => diff_objects(prefix, old, new, out),
        _ if before != after => out.push(Mutation {
            property: prefix.to_string(),
            old_value: before.clone(),
            new_value: after.clone(),
            action: MutationAction::Set,
        }),
        _ => {}
    }
}

fn diff_objects(prefix: &str, old: &Map<String, Value>, new: &Map<String, Value>, out: &mut Vec<Mutation>) {
    for (key, old_value) in old {
        let path = join(prefix, key);
        match new.get(key) {
            Some(new_value) => diff_into(&path, old_value, new_value, out),
            None => out.push(Mutation {
                property: path,
                old_value: old_value.clone(),
                new_value: Value::Null,
                action: MutationAction::Delete,
            }),
        }
    }
    for (key, new_value) in new.iter().filter(|(k, _)| !old.contains_key(*k)) {
        out.push(Mutation {
            property: join(prefix, key),
            old_value: Value::Null,
            new_value: new_value.clone(),
            action: MutationAction::Set,
        });
    }
}
