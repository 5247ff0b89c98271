// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource kind resolution via API discovery documents

use crate::constants::discovery::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::definition::ResourceDefinition;
use crate::error::{DockhandError, Result};
use kube::api::{Api, DynamicObject};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Resolves group/version/kind triples to API endpoints, caching the
/// discovery results so repeated applies of the same kind do not re-query.
pub struct KindResolver {
    client: Client,
    cache: HashMap<GroupVersionKind, (ApiResource, ApiCapabilities)>,
}

impl KindResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Resolve a kind against the discovery documents of its API group
    pub async fn resolve(
        &mut self,
        gvk: &GroupVersionKind,
    ) -> Result<(ApiResource, ApiCapabilities)> {
        if let Some(hit) = self.cache.get(gvk) {
            return Ok(hit.clone());
        }

        let discovery = Discovery::new(self.client.clone())
            .filter(&[gvk.group.as_str()])
            .run()
            .await?;
        let resolved = discovery
            .resolve_gvk(gvk)
            .ok_or_else(|| DockhandError::UnknownKind {
                api_version: gvk.api_version(),
                kind: gvk.kind.clone(),
            })?;

        debug!(
            "Resolved {} {} to plural '{}'",
            gvk.api_version(),
            gvk.kind,
            resolved.0.plural
        );
        self.cache.insert(gvk.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Resolve a kind that may not be registered yet, e.g. a custom resource
    /// whose CRD was applied moments ago. Polls discovery with exponential
    /// backoff until the deadline passes.
    pub async fn resolve_waiting(
        &mut self,
        gvk: &GroupVersionKind,
        timeout: Duration,
    ) -> Result<(ApiResource, ApiCapabilities)> {
        let deadline = Instant::now() + timeout;
        let mut interval = POLL_INTERVAL_SECS;

        loop {
            match self.resolve(gvk).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    if Instant::now() + Duration::from_secs(interval) >= deadline {
                        return Err(DockhandError::WaitTimeout {
                            what: format!(
                                "kind {} {} to become available",
                                gvk.api_version(),
                                gvk.kind
                            ),
                            timeout_secs: timeout.as_secs(),
                        });
                    }
                    warn!(
                        "Kind {} {} not available ({}), retrying in {} seconds...",
                        gvk.api_version(),
                        gvk.kind,
                        e,
                        interval
                    );
                }
            }

            sleep(Duration::from_secs(interval)).await;
            interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
        }
    }

    /// Build a dynamic Api for a definition, honoring the discovered scope.
    /// Namespaced kinds require a namespace from the definition or the
    /// configured default; cluster-scoped kinds ignore both.
    pub fn dynamic_api(
        &self,
        def: &ResourceDefinition,
        ar: &ApiResource,
        caps: &ApiCapabilities,
        default_namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>> {
        match caps.scope {
            Scope::Cluster => Ok(Api::all_with(self.client.clone(), ar)),
            Scope::Namespaced => {
                let namespace = def
                    .namespace
                    .as_deref()
                    .or(default_namespace)
                    .ok_or_else(|| DockhandError::MissingNamespace {
                        kind: def.gvk.kind.clone(),
                        name: def.name.clone(),
                    })?;
                Ok(Api::namespaced_with(self.client.clone(), namespace, ar))
            }
        }
    }
}
