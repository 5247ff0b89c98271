// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent create/patch/delete-if-present reconciliation against the
//! cluster API.
//!
//! Each definition is reconciled in isolation: fetch the current object,
//! decide whether anything needs to happen, mutate at most once, and report
//! the outcome. Convergence is decided locally from the strategic merge of
//! the desired document onto the existing object, so an apply that changes
//! nothing never issues a write.

pub mod report;
pub mod wait;

pub use report::{Method, ReconcileReport};
pub use wait::{WaitCondition, WaitConfig};

use crate::config::Config;
use crate::definition::{ResourceDefinition, TaskParams, WaitConditionParams};
use crate::error::Result;
use crate::kubernetes::KindResolver;
use crate::merge::{diff, merge, Diff};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Desired presence of an object on the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Create the object if missing, otherwise patch it towards the desired
    /// document
    #[default]
    Present,
    /// Delete the object if it exists
    Absent,
    /// Create the object if missing, otherwise replace it wholesale with the
    /// desired document
    Replaced,
}

/// Per-apply options derived from the task parameters
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub wait: Option<WaitRequest>,
}

#[derive(Debug, Clone)]
pub struct WaitRequest {
    pub timeout: Duration,
    pub condition: Option<WaitConditionParams>,
}

/// The shared reconciliation helper: resolves kinds, compares state, and
/// issues at most one mutation per definition.
pub struct Applier {
    resolver: KindResolver,
    field_manager: String,
    default_namespace: Option<String>,
    dry_run: bool,
}

impl Applier {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            resolver: KindResolver::new(client),
            field_manager: config.field_manager.clone(),
            default_namespace: config.default_namespace.clone(),
            dry_run: config.dry_run,
        }
    }

    /// Run one task: reconstruct its definitions and reconcile each in order.
    /// The first hard error aborts the remaining definitions.
    pub async fn run_task(&mut self, params: &TaskParams) -> Result<Vec<ReconcileReport>> {
        let options = ApplyOptions {
            dry_run: self.dry_run || params.dry_run,
            wait: params.wait.then(|| WaitRequest {
                timeout: Duration::from_secs(params.wait_timeout),
                condition: params.wait_condition.clone(),
            }),
        };

        let definitions = params.definitions()?;
        let mut reports = Vec::with_capacity(definitions.len());
        for def in &definitions {
            reports.push(self.apply(def, params.state, &options).await?);
        }
        Ok(reports)
    }

    /// Reconcile a single definition
    #[instrument(skip(self, def, options), fields(kind = %def.gvk.kind, name = %def.name))]
    pub async fn apply(
        &mut self,
        def: &ResourceDefinition,
        state: State,
        options: &ApplyOptions,
    ) -> Result<ReconcileReport> {
        let (ar, caps) = self.resolver.resolve(&def.gvk).await?;
        let api = self
            .resolver
            .dynamic_api(def, &ar, &caps, self.default_namespace.as_deref())?;

        let existing = api.get_opt(&def.name).await?;
        let existing_uid = existing.as_ref().and_then(|o| o.metadata.uid.clone());

        let mut report = match state {
            State::Present => {
                self.reconcile_present(&api, def, existing.as_ref(), options.dry_run, false)
                    .await?
            }
            State::Replaced => {
                self.reconcile_present(&api, def, existing.as_ref(), options.dry_run, true)
                    .await?
            }
            State::Absent => {
                self.reconcile_absent(&api, def, existing.as_ref(), options.dry_run)
                    .await?
            }
        };

        if let Some(wait_request) = &options.wait {
            if options.dry_run {
                report
                    .warnings
                    .push("wait skipped: mutations were dry-run".to_string());
            } else {
                let config = WaitConfig::for_state(
                    state,
                    wait_request.condition.as_ref(),
                    wait_request.timeout,
                    existing_uid,
                );
                let observed = wait::await_condition(&api, &def.name, &config).await?;
                if let Some(obj) = observed {
                    report.object = Some(serde_json::to_value(&obj)?);
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_present(
        &self,
        api: &Api<DynamicObject>,
        def: &ResourceDefinition,
        existing: Option<&DynamicObject>,
        dry_run: bool,
        replace: bool,
    ) -> Result<ReconcileReport> {
        let Some(existing) = existing else {
            let desired: DynamicObject = serde_json::from_value(def.manifest.clone())?;
            info!("Creating {} '{}'", def.gvk.kind, def.name);
            let created = api.create(&self.post_params(dry_run), &desired).await?;
            return Ok(self.report(
                def,
                Method::Created,
                true,
                vec![],
                Some(serde_json::to_value(&created)?),
            ));
        };

        let existing_val = serde_json::to_value(existing)?;
        let existing_norm = normalize(&existing_val);
        let desired_norm = normalize(&def.manifest);

        if replace {
            let forward = diff(&existing_norm, &desired_norm);
            let reverse = diff(&desired_norm, &existing_norm);
            if forward.is_empty() && reverse.is_empty() {
                debug!("{} '{}' already matches, not replacing", def.gvk.kind, def.name);
                return Ok(self.report(def, Method::Unchanged, false, vec![], Some(existing_val)));
            }

            let mut desired: DynamicObject = serde_json::from_value(def.manifest.clone())?;
            desired.metadata.resource_version = existing.metadata.resource_version.clone();
            info!("Replacing {} '{}'", def.gvk.kind, def.name);
            let replaced = api
                .replace(&def.name, &self.post_params(dry_run), &desired)
                .await?;
            return Ok(self.report(
                def,
                Method::Replaced,
                true,
                forward,
                Some(serde_json::to_value(&replaced)?),
            ));
        }

        // The merged document is both the convergence check and the patch
        // body: nulls survive the merge so deletions reach the server.
        let patch_body = merge(&existing_norm, &desired_norm);
        let diffs = diff(&existing_norm, &patch_body);
        if diffs.is_empty() {
            debug!("{} '{}' already converged", def.gvk.kind, def.name);
            return Ok(self.report(def, Method::Unchanged, false, vec![], Some(existing_val)));
        }

        info!(
            "Patching {} '{}' ({} differences)",
            def.gvk.kind,
            def.name,
            diffs.len()
        );
        let patched = api
            .patch(
                &def.name,
                &self.patch_params(dry_run),
                &Patch::Merge(&patch_body),
            )
            .await?;
        Ok(self.report(
            def,
            Method::Patched,
            true,
            diffs,
            Some(serde_json::to_value(&patched)?),
        ))
    }

    async fn reconcile_absent(
        &self,
        api: &Api<DynamicObject>,
        def: &ResourceDefinition,
        existing: Option<&DynamicObject>,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let Some(existing) = existing else {
            debug!("{} '{}' already absent", def.gvk.kind, def.name);
            return Ok(self.report(def, Method::Unchanged, false, vec![], None));
        };

        info!("Deleting {} '{}'", def.gvk.kind, def.name);
        let result = api.delete(&def.name, &self.delete_params(dry_run)).await?;
        let object = match result.left() {
            Some(deleted) => serde_json::to_value(&deleted)?,
            None => serde_json::to_value(existing)?,
        };
        Ok(self.report(def, Method::Deleted, true, vec![], Some(object)))
    }

    fn report(
        &self,
        def: &ResourceDefinition,
        method: Method,
        changed: bool,
        diffs: Vec<Diff>,
        object: Option<Value>,
    ) -> ReconcileReport {
        ReconcileReport {
            api_version: def.gvk.api_version(),
            kind: def.gvk.kind.clone(),
            name: def.name.clone(),
            namespace: def
                .namespace
                .clone()
                .or_else(|| self.default_namespace.clone()),
            changed,
            method,
            diffs,
            object,
            warnings: vec![],
        }
    }

    fn post_params(&self, dry_run: bool) -> PostParams {
        PostParams {
            dry_run,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    fn patch_params(&self, dry_run: bool) -> PatchParams {
        PatchParams {
            dry_run,
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn delete_params(&self, dry_run: bool) -> DeleteParams {
        let params = DeleteParams::default();
        if dry_run {
            params.dry_run()
        } else {
            params
        }
    }
}

/// Fields the API server owns; stripped before any comparison so they never
/// show up as differences or end up in a patch body.
const SERVER_METADATA_FIELDS: &[&str] = &[
    "creationTimestamp",
    "generation",
    "managedFields",
    "resourceVersion",
    "selfLink",
    "uid",
];

fn normalize(value: &Value) -> Value {
    let mut out = value.clone();
    if let Some(obj) = out.as_object_mut() {
        obj.remove("status");
        if let Some(metadata) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in SERVER_METADATA_FIELDS {
                metadata.remove(*field);
            }
            if let Some(annotations) = metadata
                .get_mut("annotations")
                .and_then(Value::as_object_mut)
            {
                annotations.remove("kubectl.kubernetes.io/last-applied-configuration");
            }
            if metadata
                .get("annotations")
                .and_then(Value::as_object)
                .is_some_and(|a| a.is_empty())
            {
                metadata.remove("annotations");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{configmap_json, core_v1_discovery, MockService};
    use serde_json::json;

    const CM_URL: &str = "/api/v1/namespaces/default/configmaps/app-settings";
    const CM_COLLECTION_URL: &str = "/api/v1/namespaces/default/configmaps";

    fn params_for(data: Value, state: State) -> TaskParams {
        TaskParams {
            resource_definition: Some(json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "app-settings", "namespace": "default" },
                "data": data
            })),
            state,
            ..Default::default()
        }
    }

    fn applier(mock: &MockService) -> Applier {
        Applier::new(mock.clone().into_client(), &Config::default())
    }

    #[tokio::test]
    async fn test_creates_when_missing() {
        let mock = core_v1_discovery(MockService::new()).on_post(
            CM_COLLECTION_URL,
            201,
            &configmap_json("app-settings", "default", json!({ "a": "1" })),
        );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({ "a": "1" }), State::Present))
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].method, Method::Created);
        assert!(reports[0].changed);
        assert!(mock
            .requests()
            .iter()
            .any(|(m, uri)| m == "POST" && uri.starts_with(CM_COLLECTION_URL)));
    }

    #[tokio::test]
    async fn test_unchanged_when_converged() {
        let mock = core_v1_discovery(MockService::new()).on_get(
            CM_URL,
            200,
            &configmap_json("app-settings", "default", json!({ "a": "1", "extra": "kept" })),
        );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({ "a": "1" }), State::Present))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Unchanged);
        assert!(!reports[0].changed);
        assert!(reports[0].diffs.is_empty());
        assert!(!mock.requests().iter().any(|(m, _)| m == "PATCH"));
    }

    #[tokio::test]
    async fn test_patches_when_diverged() {
        let mock = core_v1_discovery(MockService::new())
            .on_get(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "1" })),
            )
            .on_patch(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "2", "b": "3" })),
            );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({ "a": "2", "b": "3" }), State::Present))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Patched);
        assert!(reports[0].changed);
        assert_eq!(reports[0].diffs.len(), 2);
        assert!(mock
            .requests()
            .iter()
            .any(|(m, uri)| m == "PATCH" && uri.starts_with(CM_URL)));
    }

    #[tokio::test]
    async fn test_replaces_when_diverged() {
        let mock = core_v1_discovery(MockService::new())
            .on_get(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "1", "stale": "x" })),
            )
            .on_put(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "1" })),
            );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({ "a": "1" }), State::Replaced))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Replaced);
        assert!(reports[0].changed);
        assert!(mock.requests().iter().any(|(m, _)| m == "PUT"));
    }

    #[tokio::test]
    async fn test_replaced_reports_unchanged_when_equivalent() {
        let mock = core_v1_discovery(MockService::new()).on_get(
            CM_URL,
            200,
            &configmap_json("app-settings", "default", json!({ "a": "1" })),
        );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({ "a": "1" }), State::Replaced))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Unchanged);
        assert!(!reports[0].changed);
        assert!(!mock.requests().iter().any(|(m, _)| m == "PUT"));
    }

    #[tokio::test]
    async fn test_deletes_when_present() {
        let mock = core_v1_discovery(MockService::new())
            .on_get(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "1" })),
            )
            .on_delete(
                CM_URL,
                200,
                &configmap_json("app-settings", "default", json!({ "a": "1" })),
            );
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({}), State::Absent))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Deleted);
        assert!(reports[0].changed);
        assert!(mock.requests().iter().any(|(m, _)| m == "DELETE"));
    }

    #[tokio::test]
    async fn test_absent_is_idempotent() {
        let mock = core_v1_discovery(MockService::new());
        let mut applier = applier(&mock);

        let reports = applier
            .run_task(&params_for(json!({}), State::Absent))
            .await
            .unwrap();

        assert_eq!(reports[0].method, Method::Unchanged);
        assert!(!reports[0].changed);
        assert!(!mock.requests().iter().any(|(m, _)| m == "DELETE"));
    }

    #[tokio::test]
    async fn test_dry_run_forwards_query_param() {
        let mock = core_v1_discovery(MockService::new()).on_post(
            CM_COLLECTION_URL,
            201,
            &configmap_json("app-settings", "default", json!({ "a": "1" })),
        );
        let mut applier = applier(&mock);
        let mut params = params_for(json!({ "a": "1" }), State::Present);
        params.dry_run = true;

        applier.run_task(&params).await.unwrap();

        let post = mock
            .requests()
            .into_iter()
            .find(|(m, _)| m == "POST")
            .unwrap();
        assert!(post.1.contains("dryRun=All"));
    }

    #[tokio::test]
    async fn test_wait_on_satisfied_status_condition() {
        let body = serde_json::to_string(&json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "app-settings", "namespace": "default", "uid": "u1" },
            "data": { "a": "1" },
            "status": { "conditions": [{ "type": "Ready", "status": "True" }] }
        }))
        .unwrap();
        let mock = core_v1_discovery(MockService::new()).on_get(CM_URL, 200, &body);
        let mut applier = applier(&mock);
        let mut params = params_for(json!({ "a": "1" }), State::Present);
        params.wait = true;
        params.wait_condition = Some(WaitConditionParams {
            type_: "Ready".to_string(),
            status: "True".to_string(),
        });

        let reports = applier.run_task(&params).await.unwrap();

        assert_eq!(reports[0].method, Method::Unchanged);
        assert!(reports[0].object.as_ref().unwrap().get("status").is_some());
    }

    #[tokio::test]
    async fn test_wait_timeout_surfaces_as_error() {
        let mock = core_v1_discovery(MockService::new()).on_get(
            CM_URL,
            200,
            &configmap_json("app-settings", "default", json!({ "a": "1" })),
        );
        let mut applier = applier(&mock);
        let mut params = params_for(json!({ "a": "1" }), State::Present);
        params.wait = true;
        params.wait_timeout = 0;
        params.wait_condition = Some(WaitConditionParams {
            type_: "Ready".to_string(),
            status: "True".to_string(),
        });

        let result = applier.run_task(&params).await;

        assert!(matches!(
            result,
            Err(crate::error::DockhandError::WaitTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_skips_wait_with_warning() {
        let mock = core_v1_discovery(MockService::new()).on_post(
            CM_COLLECTION_URL,
            201,
            &configmap_json("app-settings", "default", json!({ "a": "1" })),
        );
        let mut applier = applier(&mock);
        let mut params = params_for(json!({ "a": "1" }), State::Present);
        params.dry_run = true;
        params.wait = true;

        let reports = applier.run_task(&params).await.unwrap();

        assert_eq!(reports[0].warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_document_task_applies_in_order() {
        let mock = core_v1_discovery(MockService::new())
            .on_post(
                "/api/v1/namespaces/default/configmaps",
                201,
                &configmap_json("first", "default", json!({})),
            );
        let mut applier = applier(&mock);
        let params = TaskParams {
            namespace: Some("default".to_string()),
            resource_definition: Some(json!([
                { "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "first" } },
                { "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "second" } }
            ])),
            ..Default::default()
        };

        let reports = applier.run_task(&params).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.method == Method::Created));
        let posts: Vec<_> = mock
            .requests()
            .into_iter()
            .filter(|(m, _)| m == "POST")
            .collect();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_multi_document_task_aborts_on_first_error() {
        let mock = core_v1_discovery(MockService::new());
        let mut applier = applier(&mock);
        let params = TaskParams {
            namespace: Some("default".to_string()),
            resource_definition: Some(json!([
                { "apiVersion": "v1", "kind": "Gadget", "metadata": { "name": "bad" } },
                { "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "good" } }
            ])),
            ..Default::default()
        };

        let result = applier.run_task(&params).await;

        assert!(matches!(
            result,
            Err(crate::error::DockhandError::UnknownKind { .. })
        ));
        assert!(!mock.requests().iter().any(|(m, _)| m == "POST"));
    }

    #[test]
    fn test_normalize_strips_server_fields() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm",
                "uid": "u1",
                "resourceVersion": "5",
                "creationTimestamp": "2026-01-01T00:00:00Z",
                "managedFields": [{}],
                "annotations": { "kubectl.kubernetes.io/last-applied-configuration": "{}" }
            },
            "data": { "a": "1" },
            "status": { "phase": "Active" }
        });

        let normalized = normalize(&raw);

        assert_eq!(
            normalized,
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "cm" },
                "data": { "a": "1" }
            })
        );
    }
}
