//! Rule runner
//!
//! One rule means: expand its resources, enumerate the namespaces it is
//! restricted to (or the empty-string sentinel for a cluster-wide pass), and
//! walk every (namespace, resource) pair, handing each streamed object to
//! the evaluator together with the TTL the mode's filter extracted.

use std::pin::pin;
use std::sync::Arc;

use futures::TryStreamExt;
use kube::ResourceExt;
use kube::api::DynamicObject;
use tracing::{debug, error};

use janitor_core::{ResourceSpec, Rule};

use crate::discovery::ApiEntry;
use crate::engine::Janitor;
use crate::error::{JanitorError, Result};
use crate::metrics::ExpirySnapshot;
use crate::resolve::{self, expand_resources, has_wildcard};
use crate::walker;

impl Janitor {
    pub(crate) async fn run_rule<F>(
        &self,
        rule: &Rule,
        filter: F,
        snapshot: &mut ExpirySnapshot,
    ) -> Result<()>
    where
        F: Fn(&Rule, &DynamicObject) -> Option<String>,
    {
        // a namespace-restricted rule cannot match cluster-scoped kinds
        let namespaced = !rule.namespace_selector.is_empty();

        // the catalog is only needed to expand wildcards
        let catalog: Arc<Vec<ApiEntry>> = if rule.resources.iter().any(has_wildcard) {
            self.discovery.entries(&self.client).await?
        } else {
            Arc::new(Vec::new())
        };

        let resources = expand_resources(&rule.resources, namespaced, &catalog);
        if resources.is_empty() {
            debug!(rule = %rule.id, "no resources to process");
            return Ok(());
        }

        let namespaces = if namespaced {
            self.matching_namespaces(rule).await?
        } else {
            vec![String::new()]
        };

        for namespace in &namespaces {
            for resource in &resources {
                let kind_hint = catalog
                    .iter()
                    .find(|entry| {
                        entry.group == resource.group
                            && entry.version == resource.version
                            && entry.resource == resource.kind
                    })
                    .map(|entry| entry.kind.as_str());

                if let Err(err) = self
                    .walk_resource(rule, resource, kind_hint, namespace, &filter, snapshot)
                    .await
                {
                    // a failed delete aborts the rule; a failed list only
                    // skips this GVR (it may simply not exist anymore)
                    if matches!(err, JanitorError::Delete { .. }) {
                        return Err(err);
                    }
                    error!(
                        rule = %rule.id,
                        groupVersionKind = %resource,
                        namespace = %namespace,
                        error = %err,
                        "listing resources failed, skipping"
                    );
                }
            }
        }

        Ok(())
    }

    /// Names of the namespaces matching the rule's selector, in server order.
    async fn matching_namespaces(&self, rule: &Rule) -> Result<Vec<String>> {
        let selector = rule.namespace_selector.to_server_string()?;
        let mut stream = pin!(walker::namespaces(&self.client, selector, self.page_limit));
        let mut names = Vec::new();
        while let Some(namespace) = stream.try_next().await? {
            names.push(namespace.name_any());
        }
        Ok(names)
    }

    async fn walk_resource<F>(
        &self,
        rule: &Rule,
        resource: &ResourceSpec,
        kind_hint: Option<&str>,
        namespace: &str,
        filter: &F,
        snapshot: &mut ExpirySnapshot,
    ) -> Result<()>
    where
        F: Fn(&Rule, &DynamicObject) -> Option<String>,
    {
        let selector = resource.selector.to_server_string()?;
        let api_resource = resolve::api_resource(resource);
        let mut stream = pin!(walker::objects(
            &self.client,
            &api_resource,
            namespace,
            selector,
            self.page_limit,
        ));

        while let Some(object) = stream.try_next().await? {
            let Some(ttl) = filter(rule, &object) else {
                continue;
            };
            if ttl.is_empty() {
                continue;
            }
            self.evaluate(rule, resource, kind_hint, &object, &ttl, snapshot)
                .await?;
        }

        Ok(())
    }
}
