//! Prometheus metric surface
//!
//! Deletions are counted the moment they happen. Pending expiries are
//! collected into a per-run snapshot and published wholesale once the run
//! finishes, replacing the previous snapshot so deleted or vanished objects
//! stop reporting.

use chrono::{DateTime, Utc};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Labels for the deletion counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
#[allow(non_snake_case)]
pub struct DeletionLabels {
    pub rule: String,
    pub groupVersionKind: String,
    pub namespace: String,
}

/// Labels for the pending-expiry gauges.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
#[allow(non_snake_case)]
pub struct ExpiryLabels {
    pub rule: String,
    pub groupVersionKind: String,
    pub namespace: String,
    pub name: String,
    pub ttl: String,
}

/// The janitor's Prometheus metrics.
#[derive(Clone, Default)]
pub struct JanitorMetrics {
    /// `kube_janitor_resource_deleted_total`
    pub deleted: Family<DeletionLabels, Counter>,
    /// `kube_janitor_resource_ttl_expiry_timestamp_seconds`
    pub ttl_expiry: Family<ExpiryLabels, Gauge>,
    /// `kube_janitor_resource_rule_expiry_timestamp_seconds`
    pub rule_expiry: Family<ExpiryLabels, Gauge>,
}

impl JanitorMetrics {
    pub fn register(&self, registry: &mut Registry) {
        // the counter encoder appends the _total suffix
        registry.register(
            "kube_janitor_resource_deleted",
            "Resources deleted because their time to live expired",
            self.deleted.clone(),
        );
        registry.register(
            "kube_janitor_resource_ttl_expiry_timestamp_seconds",
            "Upcoming expiry instants found by the TTL label/annotation mode",
            self.ttl_expiry.clone(),
        );
        registry.register(
            "kube_janitor_resource_rule_expiry_timestamp_seconds",
            "Upcoming expiry instants found by configured rules",
            self.rule_expiry.clone(),
        );
    }
}

/// Pending expiries collected during one run.
#[derive(Debug, Default)]
pub struct ExpirySnapshot {
    samples: Vec<(ExpiryLabels, i64)>,
}

impl ExpirySnapshot {
    pub fn record(&mut self, labels: ExpiryLabels, expires_at: DateTime<Utc>) {
        self.samples.push((labels, expires_at.timestamp()));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Replace the gauge family's contents with this snapshot.
    pub fn publish(self, family: &Family<ExpiryLabels, Gauge>) {
        family.clear();
        for (labels, unix_seconds) in self.samples {
            family.get_or_create(&labels).set(unix_seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prometheus_client::encoding::text::encode;

    fn expiry_labels(name: &str) -> ExpiryLabels {
        ExpiryLabels {
            rule: "dev-pods".to_string(),
            groupVersionKind: "v1/pods".to_string(),
            namespace: "dev1".to_string(),
            name: name.to_string(),
            ttl: "24h".to_string(),
        }
    }

    #[test]
    fn publish_replaces_the_previous_snapshot() {
        let metrics = JanitorMetrics::default();

        let mut first = ExpirySnapshot::default();
        first.record(
            expiry_labels("a"),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        );
        first.record(
            expiry_labels("b"),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        );
        assert_eq!(first.len(), 2);
        first.publish(&metrics.rule_expiry);

        // second run only sees object b; a must disappear from the gauge
        let mut second = ExpirySnapshot::default();
        second.record(
            expiry_labels("b"),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        );
        second.publish(&metrics.rule_expiry);

        let mut registry = Registry::default();
        metrics.register(&mut registry);
        let mut rendered = String::new();
        encode(&mut rendered, &registry).unwrap();

        assert!(!rendered.contains("name=\"a\""));
        assert!(rendered.contains("name=\"b\""));
    }

    #[test]
    fn encoded_metric_names_and_labels() {
        let metrics = JanitorMetrics::default();
        metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: "kube-janitor-ttl".to_string(),
                groupVersionKind: "apps/v1/deployments".to_string(),
                namespace: "ns1".to_string(),
            })
            .inc();

        let mut snapshot = ExpirySnapshot::default();
        snapshot.record(
            expiry_labels("web"),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        );
        snapshot.publish(&metrics.ttl_expiry);

        let mut registry = Registry::default();
        metrics.register(&mut registry);
        let mut rendered = String::new();
        encode(&mut rendered, &registry).unwrap();

        insta::assert_snapshot!(rendered, @r#"
        # HELP kube_janitor_resource_deleted Resources deleted because their time to live expired.
        # TYPE kube_janitor_resource_deleted counter
        kube_janitor_resource_deleted_total{rule="kube-janitor-ttl",groupVersionKind="apps/v1/deployments",namespace="ns1"} 1
        # HELP kube_janitor_resource_ttl_expiry_timestamp_seconds Upcoming expiry instants found by the TTL label/annotation mode.
        # TYPE kube_janitor_resource_ttl_expiry_timestamp_seconds gauge
        kube_janitor_resource_ttl_expiry_timestamp_seconds{rule="dev-pods",groupVersionKind="v1/pods",namespace="dev1",name="web",ttl="24h"} 1672531200
        # HELP kube_janitor_resource_rule_expiry_timestamp_seconds Upcoming expiry instants found by configured rules.
        # TYPE kube_janitor_resource_rule_expiry_timestamp_seconds gauge
        # EOF
        "#);
    }
}
