// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Superset comparison between existing cluster state and a desired document.
//!
//! An empty result means the existing object already satisfies the desired
//! document and no mutation is needed. Keys present in the existing object
//! but absent from the desired one are not differences; a `null` in the
//! desired document flags an existing key for removal. Lists follow the same
//! associative rules as the merge itself.

use super::list_merge_key;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A single path where the desired document is not satisfied by the existing one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diff {
    pub path: String,
    pub existing: Value,
    pub desired: Value,
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.desired.is_null() {
            write!(f, "{}: removed (was {})", self.path, self.existing)
        } else if self.existing.is_null() {
            write!(f, "{}: added {}", self.path, self.desired)
        } else {
            write!(f, "{}: {} -> {}", self.path, self.existing, self.desired)
        }
    }
}

enum Segment {
    Key(String),
    Index(usize),
    KeyedItem(String, String),
}

fn render_path(path: &[Segment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            Segment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            Segment::KeyedItem(k, v) => out.push_str(&format!("[{}={}]", k, v)),
        }
    }
    out
}

/// Compare an existing object against a desired document
pub fn diff(existing: &Value, desired: &Value) -> Vec<Diff> {
    let mut diffs = Vec::new();
    let mut path = Vec::new();
    walk(&mut diffs, &mut path, existing, desired, None);
    diffs
}

fn record(diffs: &mut Vec<Diff>, path: &[Segment], existing: &Value, desired: &Value) {
    diffs.push(Diff {
        path: render_path(path),
        existing: existing.clone(),
        desired: desired.clone(),
    });
}

fn walk(
    diffs: &mut Vec<Diff>,
    path: &mut Vec<Segment>,
    existing: &Value,
    desired: &Value,
    field: Option<&str>,
) {
    match (existing, desired) {
        (Value::Object(e), Value::Object(d)) => {
            for (key, desired_val) in d {
                path.push(Segment::Key(key.clone()));
                match e.get(key) {
                    Some(existing_val) if desired_val.is_null() => {
                        if !existing_val.is_null() {
                            record(diffs, path, existing_val, desired_val);
                        }
                    }
                    Some(existing_val) => {
                        walk(diffs, path, existing_val, desired_val, Some(key));
                    }
                    None => {
                        if !desired_val.is_null() {
                            record(diffs, path, &Value::Null, desired_val);
                        }
                    }
                }
                path.pop();
            }
        }
        (Value::Array(e), Value::Array(d)) => walk_lists(diffs, path, e, d, field),
        (a, b) if a != b => record(diffs, path, a, b),
        _ => {}
    }
}

fn walk_lists(
    diffs: &mut Vec<Diff>,
    path: &mut Vec<Segment>,
    existing: &[Value],
    desired: &[Value],
    field: Option<&str>,
) {
    if let Some(key) = list_merge_key(field, desired) {
        for item in desired {
            let key_value = match item.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            };
            path.push(Segment::KeyedItem(key.to_string(), key_value));
            match existing.iter().find(|e| e.get(key) == item.get(key)) {
                Some(matched) => walk(diffs, path, matched, item, None),
                None => record(diffs, path, &Value::Null, item),
            }
            path.pop();
        }
    } else {
        // Positional lists are replaced wholesale, so any shape mismatch is
        // a difference at the list itself
        if existing.len() != desired.len() {
            record(
                diffs,
                path,
                &Value::Array(existing.to_vec()),
                &Value::Array(desired.to_vec()),
            );
            return;
        }
        for (i, (e, d)) in existing.iter().zip(desired).enumerate() {
            path.push(Segment::Index(i));
            walk(diffs, path, e, d, None);
            path.pop();
        }
    }
}
