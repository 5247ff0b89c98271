// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Strategic-merge-style list/dict merging over untyped JSON documents.
//!
//! Dicts merge recursively, key by key. Lists of objects merge
//! associatively when a patch merge key is known for the field (or when
//! every desired element carries a string `name`); all other lists are
//! replaced wholesale, as in a plain JSON merge patch. A `null` in the
//! desired document marks the key for deletion.

pub mod diff;

pub use diff::{diff, Diff};

use serde_json::Value;

type JsonObject = serde_json::Map<String, Value>;

/// Patch merge keys for well-known Kubernetes list fields.
/// Field names are unqualified; where upstream kinds disagree on the key for
/// a field name, the element-level check in [`list_merge_key`] disambiguates.
const MERGE_KEYS: &[(&str, &str)] = &[
    ("containers", "name"),
    ("initContainers", "name"),
    ("ephemeralContainers", "name"),
    ("env", "name"),
    ("ports", "containerPort"),
    ("volumes", "name"),
    ("volumeMounts", "mountPath"),
    ("volumeDevices", "devicePath"),
    ("imagePullSecrets", "name"),
    ("hostAliases", "ip"),
    ("tolerations", "key"),
    ("readinessGates", "conditionType"),
    ("secrets", "name"),
];

/// Decide how a list under `field` should be merged.
///
/// Returns the merge key if every desired element is an object carrying a
/// scalar value for it; `None` means the list is replaced wholesale.
pub(crate) fn list_merge_key(field: Option<&str>, desired: &[Value]) -> Option<&'static str> {
    if desired.is_empty() {
        return None;
    }
    if let Some(field) = field {
        if let Some((_, key)) = MERGE_KEYS.iter().find(|(f, _)| *f == field) {
            if desired.iter().all(|v| has_scalar_key(v, key)) {
                return Some(key);
            }
        }
    }
    // Fallback: Kubernetes models most associative arrays with a `name` field
    if desired.iter().all(|v| has_scalar_key(v, "name")) {
        return Some("name");
    }
    None
}

fn has_scalar_key(value: &Value, key: &str) -> bool {
    matches!(
        value.get(key),
        Some(Value::String(_)) | Some(Value::Number(_))
    )
}

/// Merge `desired` onto `existing`, returning the full merged document.
///
/// `null` values from `desired` survive as deletion markers so the result
/// can be sent as a JSON merge patch.
pub fn merge(existing: &Value, desired: &Value) -> Value {
    merge_field(existing, desired, None)
}

fn merge_field(existing: &Value, desired: &Value, field: Option<&str>) -> Value {
    match (existing, desired) {
        (Value::Object(e), Value::Object(d)) => Value::Object(merge_objects(e, d)),
        (Value::Array(e), Value::Array(d)) => merge_lists(e, d, field),
        (_, d) => d.clone(),
    }
}

fn merge_objects(existing: &JsonObject, desired: &JsonObject) -> JsonObject {
    let mut out = existing.clone();
    for (key, desired_val) in desired {
        if desired_val.is_null() {
            // Deleting a key that is not there is a no-op
            if out.contains_key(key) {
                out.insert(key.clone(), Value::Null);
            }
            continue;
        }
        let merged = match out.get(key) {
            Some(existing_val) => merge_field(existing_val, desired_val, Some(key)),
            None => desired_val.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

fn merge_lists(existing: &[Value], desired: &[Value], field: Option<&str>) -> Value {
    let Some(key) = list_merge_key(field, desired) else {
        return Value::Array(desired.to_vec());
    };
    let mut out: Vec<Value> = existing.to_vec();
    for desired_item in desired {
        match out.iter().position(|e| e.get(key) == desired_item.get(key)) {
            Some(idx) => {
                let merged = merge_field(&out[idx], desired_item, None);
                out[idx] = merged;
            }
            None => out.push(desired_item.clone()),
        }
    }
    Value::Array(out)
}
