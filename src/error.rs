// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockhandError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to build client: {0}")]
    ClientError(String),

    #[error("Invalid resource definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid task parameters: {0}")]
    InvalidParams(String),

    #[error("Unknown resource kind: {api_version}/{kind}")]
    UnknownKind { api_version: String, kind: String },

    #[error("Namespace required for namespaced kind {kind} '{name}'")]
    MissingNamespace { kind: String, name: String },

    #[error("Timed out after {timeout_secs}s waiting for {what}")]
    WaitTimeout { what: String, timeout_secs: u64 },

    #[error("Failed to parse manifest: {0}")]
    ManifestError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DockhandError>;
