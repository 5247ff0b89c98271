// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structured reconciliation results

use crate::merge::Diff;
use serde::Serialize;
use serde_json::Value;

/// How the cluster was (or was not) mutated for one definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Created,
    Patched,
    Replaced,
    Deleted,
    Unchanged,
}

/// The outcome of reconciling one resource definition
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub changed: bool,
    pub method: Method,
    /// Paths where the desired document was not satisfied before the mutation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<Diff>,
    /// The resulting object as returned by the API server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
