//! Audit events for reaped resources
//!
//! Every successful deletion emits exactly one core/v1 Event on the involved
//! object. Dry-run deletes and failed deletes emit nothing.

use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::Client;
use kube::api::{Api, DynamicObject, PostParams};

pub const COMPONENT: &str = "kube-janitor";
pub const REASON_TTL_EXPIRED: &str = "TimeToLiveExpired";
pub const ACTION_DELETED: &str = "Deleted";

/// Build the deletion event for an object that was just deleted.
pub(crate) fn deletion_event(
    object: &DynamicObject,
    api_version: &str,
    kind: &str,
    ttl: &str,
    rule_id: &str,
) -> Event {
    let now = Time(Utc::now());
    let namespace = object
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());

    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{COMPONENT}-")),
            namespace: Some(namespace),
            ..Default::default()
        },
        involved_object: ObjectReference {
            api_version: Some(api_version.to_string()),
            kind: Some(kind.to_string()),
            name: object.metadata.name.clone(),
            namespace: object.metadata.namespace.clone(),
            uid: object.metadata.uid.clone(),
            resource_version: object.metadata.resource_version.clone(),
            ..Default::default()
        },
        action: Some(ACTION_DELETED.to_string()),
        reason: Some(REASON_TTL_EXPIRED.to_string()),
        message: Some(format!(
            "time to live '{ttl}' expired, resource deleted (rule '{rule_id}')"
        )),
        type_: Some("Normal".to_string()),
        source: Some(EventSource {
            component: Some(COMPONENT.to_string()),
            ..Default::default()
        }),
        reporting_component: Some(COMPONENT.to_string()),
        reporting_instance: Some(COMPONENT.to_string()),
        count: Some(1),
        first_timestamp: Some(now.clone()),
        last_timestamp: Some(now),
        ..Default::default()
    }
}

/// Record the deletion in the involved object's namespace. Failures are the
/// caller's to log; they never undo or block the delete itself.
pub(crate) async fn publish_deletion_event(
    client: &Client,
    object: &DynamicObject,
    api_version: &str,
    kind: &str,
    ttl: &str,
    rule_id: &str,
) -> kube::Result<Event> {
    let event = deletion_event(object, api_version, kind, ttl, rule_id);
    let namespace = event
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let api: Api<Event> = Api::namespaced(client.clone(), &namespace);
    api.create(&PostParams::default(), &event).await
}
