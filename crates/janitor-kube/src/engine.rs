//! Engine driver
//!
//! `Janitor::run` covers one full pass: the TTL label/annotation shortcut
//! first (as a synthetic rule), then every configured rule in order. Each
//! mode collects its pending expiries into a fresh snapshot and publishes it
//! when the mode finishes, replacing the previous gauge contents.

use std::sync::Arc;

use kube::Client;
use kube::api::DynamicObject;
use tracing::{debug, error};

use janitor_core::{Config, Rule, Selector, TtlConfig};

use crate::discovery::DiscoveryCache;
use crate::error::Result;
use crate::metrics::{ExpirySnapshot, JanitorMetrics};
use crate::walker::DEFAULT_PAGE_LIMIT;

/// Rule id of the synthetic rule representing the TTL shortcut.
pub const TTL_RULE_ID: &str = "kube-janitor-ttl";

/// The reaping engine. One instance lives for the process lifetime; every
/// call to [`Janitor::run`] is a complete, sequential pass over the cluster.
pub struct Janitor {
    pub(crate) client: Client,
    pub(crate) config: Arc<Config>,
    pub(crate) metrics: Arc<JanitorMetrics>,
    pub(crate) discovery: DiscoveryCache,
    pub(crate) dry_run: bool,
    pub(crate) page_limit: u32,
}

impl Janitor {
    pub fn new(client: Client, config: Config, metrics: Arc<JanitorMetrics>) -> Self {
        Self {
            client,
            config: Arc::new(config),
            metrics,
            discovery: DiscoveryCache::default(),
            dry_run: false,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Decide and log instead of deleting.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Items per page for list calls.
    pub fn page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// One complete janitor pass.
    pub async fn run(&self) -> Result<()> {
        if self.config.ttl_mode_enabled() {
            self.run_ttl_mode().await?;
        } else {
            debug!("skipping TTL run, no label or annotation configured");
        }

        if !self.config.rules.is_empty() {
            self.run_rules_mode().await?;
        } else {
            debug!("skipping rules run, no rules configured");
        }

        Ok(())
    }

    /// The TTL shortcut: a synthetic rule over the configured resources,
    /// with the TTL read from each object's annotation or label.
    async fn run_ttl_mode(&self) -> Result<()> {
        let ttl_config = &self.config.ttl;
        let rule = Rule {
            id: TTL_RULE_ID.to_string(),
            ttl: String::new(),
            resources: ttl_config.resources.clone(),
            namespace_selector: Selector::default(),
            delete_options: ttl_config.delete_options.clone(),
        };

        let mut snapshot = ExpirySnapshot::default();
        self.run_rule(&rule, ttl_value_filter(ttl_config), &mut snapshot)
            .await?;
        snapshot.publish(&self.metrics.ttl_expiry);
        Ok(())
    }

    async fn run_rules_mode(&self) -> Result<()> {
        let mut snapshot = ExpirySnapshot::default();

        for rule in &self.config.rules {
            if let Err(err) = self
                .run_rule(rule, |rule: &Rule, _: &DynamicObject| Some(rule.ttl.clone()), &mut snapshot)
                .await
            {
                if err.is_fatal() {
                    return Err(err);
                }
                error!(rule = %rule.id, error = %err, "rule run failed");
            }
        }

        snapshot.publish(&self.metrics.rule_expiry);
        Ok(())
    }
}

/// Extract the effective TTL from an object's annotation or label.
/// The annotation is consulted first; a non-empty label value overrides it.
fn ttl_value_filter(config: &TtlConfig) -> impl Fn(&Rule, &DynamicObject) -> Option<String> + '_ {
    move |_rule, object| {
        let mut value = None;

        if !config.annotation.is_empty() {
            if let Some(raw) = object
                .metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(&config.annotation))
            {
                let raw = raw.trim();
                if !raw.is_empty() {
                    value = Some(raw.to_string());
                }
            }
        }

        if !config.label.is_empty() {
            if let Some(raw) = object
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(&config.label))
            {
                let raw = raw.trim();
                if !raw.is_empty() {
                    value = Some(raw.to_string());
                }
            }
        }

        value
    }
}
