// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation

use crate::error::{DockhandError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::debug;

/// Create a client from the ambient environment (in-cluster config or the
/// `KUBECONFIG`/`~/.kube/config` chain)
pub async fn default_client() -> Result<Client> {
    let config = KConfig::infer()
        .await
        .map_err(|e| DockhandError::ClientError(format!("Failed to infer config: {}", e)))?;
    debug!("Using cluster at {}", config.cluster_url);
    Client::try_from(config)
        .map_err(|e| DockhandError::ClientError(format!("Failed to create client: {}", e)))
}

/// Create a client from an explicit kubeconfig file and optional context name
pub async fn client_from_kubeconfig(path: &Path, context: Option<&str>) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        DockhandError::ClientError(format!(
            "Failed to read kubeconfig {}: {}",
            path.display(),
            e
        ))
    })?;

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let config = KConfig::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| DockhandError::ClientError(format!("Failed to create config: {}", e)))?;

    Client::try_from(config)
        .map_err(|e| DockhandError::ClientError(format!("Failed to create client: {}", e)))
}
