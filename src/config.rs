// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::FIELD_MANAGER;
use anyhow::Result;
use std::env;

/// Runner configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Field manager name recorded against every mutation
    pub field_manager: String,
    /// Namespace used for namespaced kinds when neither the parameters nor
    /// the manifest specify one
    pub default_namespace: Option<String>,
    /// Force server-side dry-run on every mutation, regardless of task params
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let field_manager =
            env::var("DOCKHAND_FIELD_MANAGER").unwrap_or_else(|_| FIELD_MANAGER.to_string());
        let default_namespace = env::var("DOCKHAND_DEFAULT_NAMESPACE").ok();
        let dry_run: bool = env::var("DOCKHAND_DRY_RUN")
            .unwrap_or("false".to_string())
            .parse()
            .unwrap_or(false);

        Ok(Config {
            field_manager,
            default_namespace,
            dry_run,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            field_manager: FIELD_MANAGER.to_string(),
            default_namespace: None,
            dry_run: false,
        }
    }
}
