// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Flat, aliased task parameters and their reconstruction into nested
//! resource definitions.
//!
//! The parameter surface is flat so a task can say `kind: ConfigMap`,
//! `name: app-settings` next to (or instead of) a full nested document.
//! Flattened parameters win over the corresponding document fields.

use crate::apply::State;
use crate::constants;
use crate::definition::manifest;
use crate::error::{DockhandError, Result};
use kube::core::{GroupVersion, GroupVersionKind};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;

/// The flat parameter schema for one reconciliation task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskParams {
    /// API version of the target kind, e.g. `v1` or `apps/v1`
    #[serde(default, alias = "api", alias = "version")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Inline nested document: a single object or a list of objects
    #[serde(default, alias = "definition", alias = "inline")]
    pub resource_definition: Option<Value>,
    /// Path to a (multi-document) manifest file; mutually exclusive with
    /// `resource_definition`
    #[serde(default)]
    pub src: Option<PathBuf>,
    #[serde(default)]
    pub state: State,
    /// Forward server-side dry-run on every mutation
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub wait: bool,
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
    #[serde(default)]
    pub wait_condition: Option<WaitConditionParams>,
}

fn default_wait_timeout() -> u64 {
    constants::wait::DEFAULT_TIMEOUT_SECS
}

// Hand-written so programmatically built params get the same wait timeout
// as deserialized ones
impl Default for TaskParams {
    fn default() -> Self {
        TaskParams {
            api_version: None,
            kind: None,
            name: None,
            namespace: None,
            resource_definition: None,
            src: None,
            state: State::default(),
            dry_run: false,
            wait: false,
            wait_timeout: default_wait_timeout(),
            wait_condition: None,
        }
    }
}

/// A `.status.conditions` entry to wait for after a mutation
#[derive(Debug, Clone, Deserialize)]
pub struct WaitConditionParams {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_condition_status")]
    pub status: String,
}

fn default_condition_status() -> String {
    "True".to_string()
}

/// One fully reconstructed nested object to reconcile
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub gvk: GroupVersionKind,
    pub name: String,
    pub namespace: Option<String>,
    /// The desired document, including apiVersion/kind/metadata
    pub manifest: Value,
}

impl TaskParams {
    /// Reconstruct the nested resource definitions this task targets.
    ///
    /// Documents come from `resource_definition`, from `src`, or (for
    /// metadata-only tasks such as `state: absent`) from the flat
    /// parameters alone.
    pub fn definitions(&self) -> Result<Vec<ResourceDefinition>> {
        if self.resource_definition.is_some() && self.src.is_some() {
            return Err(DockhandError::InvalidParams(
                "resource_definition and src are mutually exclusive".to_string(),
            ));
        }

        let docs: Vec<Value> = if let Some(inline) = &self.resource_definition {
            match inline {
                Value::Array(items) => items.clone(),
                Value::Object(_) => vec![inline.clone()],
                _ => {
                    return Err(DockhandError::InvalidParams(
                        "resource_definition must be an object or a list of objects".to_string(),
                    ))
                }
            }
        } else if let Some(src) = &self.src {
            manifest::load_file(src)?
        } else {
            if self.kind.is_none() || self.api_version.is_none() {
                return Err(DockhandError::InvalidParams(
                    "kind and api_version are required without a resource definition".to_string(),
                ));
            }
            vec![Value::Object(Default::default())]
        };

        docs.into_iter().map(|doc| self.reconstruct(doc)).collect()
    }

    /// Overlay the flat parameters onto one document and validate it
    fn reconstruct(&self, mut doc: Value) -> Result<ResourceDefinition> {
        let obj = doc.as_object_mut().ok_or_else(|| {
            DockhandError::InvalidDefinition("document is not an object".to_string())
        })?;

        if let Some(api_version) = &self.api_version {
            obj.insert("apiVersion".to_string(), Value::String(api_version.clone()));
        }
        if let Some(kind) = &self.kind {
            obj.insert("kind".to_string(), Value::String(kind.clone()));
        }
        if self.name.is_some() || self.namespace.is_some() {
            let metadata = obj
                .entry("metadata")
                .or_insert_with(|| Value::Object(Default::default()));
            let metadata = metadata.as_object_mut().ok_or_else(|| {
                DockhandError::InvalidDefinition("metadata is not an object".to_string())
            })?;
            if let Some(name) = &self.name {
                metadata.insert("name".to_string(), Value::String(name.clone()));
            }
            if let Some(namespace) = &self.namespace {
                metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
            }
        }

        let api_version = doc
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| DockhandError::InvalidDefinition("apiVersion is required".to_string()))?
            .to_string();
        let kind = doc
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| DockhandError::InvalidDefinition("kind is required".to_string()))?
            .to_string();
        let name = doc
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DockhandError::InvalidDefinition("metadata.name is required".to_string())
            })?
            .to_string();
        let namespace = doc
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_string);

        let gv = GroupVersion::from_str(&api_version)
            .map_err(|e| DockhandError::InvalidDefinition(e.to_string()))?;

        Ok(ResourceDefinition {
            gvk: GroupVersionKind::gvk(&gv.group, &gv.version, &kind),
            name,
            namespace,
            manifest: doc,
        })
    }
}
