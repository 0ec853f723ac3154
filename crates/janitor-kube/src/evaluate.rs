//! Per-object expiry evaluation
//!
//! Decides, for one streamed object, whether it is expired and acts on the
//! decision: delete + count + event when expired, a pending-expiry gauge
//! sample when not. All per-object parse and evaluation problems are logged
//! and skip the object; only a failed delete is surfaced.

use kube::ResourceExt;
use kube::api::{Api, DeleteParams, DynamicObject};
use tracing::{debug, error, info, warn};

use janitor_core::{DeleteOptions, PropagationPolicy, ResourceSpec, Rule, check_expiry};

use crate::engine::Janitor;
use crate::error::{JanitorError, Result};
use crate::events;
use crate::metrics::{DeletionLabels, ExpiryLabels, ExpirySnapshot};
use crate::resolve;

impl Janitor {
    pub(crate) async fn evaluate(
        &self,
        rule: &Rule,
        resource: &ResourceSpec,
        kind_hint: Option<&str>,
        object: &DynamicObject,
        ttl: &str,
        snapshot: &mut ExpirySnapshot,
    ) -> Result<()> {
        // filters should have excluded these
        if ttl.is_empty() {
            return Ok(());
        }

        let name = object.name_any();
        let namespace = object.metadata.namespace.clone().unwrap_or_default();
        let gvk = resource.to_string();

        // filter and alternate timestamp work on the object's JSON tree
        let needs_doc = !resource.filter_path.is_empty() || !resource.timestamp_path.is_empty();
        let doc = if needs_doc {
            match serde_json::to_value(object) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, error = %err, "failed to serialize resource, skipping");
                    return Ok(());
                }
            }
        } else {
            serde_json::Value::Null
        };

        if !resource.filter_path.is_empty() {
            match resource.filter_path.skips(&doc) {
                Ok(false) => {}
                Ok(true) => {
                    debug!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, "resource filtered out, skipping");
                    return Ok(());
                }
                Err(err) => {
                    warn!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, error = %err, "filter path evaluation failed, skipping");
                    return Ok(());
                }
            }
        }

        let created_at = if !resource.timestamp_path.is_empty() {
            match resource.timestamp_path.timestamp(&doc) {
                Ok(Some(timestamp)) => Some(timestamp),
                Ok(None) => {
                    warn!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, path = resource.timestamp_path.source(), "timestamp path yielded no usable timestamp, skipping");
                    return Ok(());
                }
                Err(err) => {
                    warn!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, error = %err, "timestamp path evaluation failed, skipping");
                    return Ok(());
                }
            }
        } else {
            object
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|timestamp| timestamp.0)
        };

        let expiry = match check_expiry(created_at, ttl) {
            Ok(Some(expiry)) => expiry,
            Ok(None) => return Ok(()),
            Err(err) => {
                error!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, ttl = %ttl, error = %err, "unable to parse expiration date");
                return Ok(());
            }
        };

        debug!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, ttl = %ttl, expirationDate = %expiry.at.to_rfc3339(), "found resource with valid TTL");

        if !expiry.expired {
            snapshot.record(
                ExpiryLabels {
                    rule: rule.id.clone(),
                    groupVersionKind: gvk,
                    namespace,
                    name,
                    ttl: ttl.to_string(),
                },
                expiry.at,
            );
            return Ok(());
        }

        if self.dry_run {
            info!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, ttl = %ttl, expirationDate = %expiry.at.to_rfc3339(), "resource is expired, would delete resource (DRY-RUN)");
            return Ok(());
        }

        info!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, ttl = %ttl, expirationDate = %expiry.at.to_rfc3339(), "deleting expired resource");

        let api_resource = resolve::api_resource(resource);
        let api: Api<DynamicObject> = if namespace.is_empty() {
            Api::all_with(self.client.clone(), &api_resource)
        } else {
            Api::namespaced_with(self.client.clone(), &namespace, &api_resource)
        };

        api.delete(&name, &delete_params(&rule.delete_options))
            .await
            .map_err(|source| JanitorError::Delete {
                group_version_kind: gvk.clone(),
                namespace: namespace.clone(),
                name: name.clone(),
                source,
            })?;

        self.metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: rule.id.clone(),
                groupVersionKind: gvk.clone(),
                namespace: namespace.clone(),
            })
            .inc();

        // the event is best-effort; the delete already happened
        let kind = object
            .types
            .as_ref()
            .map(|types| types.kind.clone())
            .or_else(|| kind_hint.map(str::to_string))
            .unwrap_or_else(|| resource.kind.clone());
        if let Err(err) = events::publish_deletion_event(
            &self.client,
            object,
            &api_resource.api_version,
            &kind,
            ttl,
            &rule.id,
        )
        .await
        {
            error!(rule = %rule.id, groupVersionKind = %gvk, namespace = %namespace, name = %name, error = %err, "failed to record deletion event");
        }

        Ok(())
    }
}

fn delete_params(options: &DeleteOptions) -> DeleteParams {
    DeleteParams {
        grace_period_seconds: options.grace_period_seconds,
        propagation_policy: propagation(options.propagation_policy),
        ..Default::default()
    }
}

/// The empty policy means "the server decides", which is not the same as
/// `Background`.
fn propagation(policy: PropagationPolicy) -> Option<kube::api::PropagationPolicy> {
    match policy {
        PropagationPolicy::ServerDefault => None,
        PropagationPolicy::Foreground => Some(kube::api::PropagationPolicy::Foreground),
        PropagationPolicy::Background => Some(kube::api::PropagationPolicy::Background),
        PropagationPolicy::Orphan => Some(kube::api::PropagationPolicy::Orphan),
    }
}
