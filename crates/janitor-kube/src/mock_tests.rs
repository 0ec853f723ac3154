//! Engine tests against a scripted mock API server
//!
//! Each test wires the engine to a `tower_test` service pretending to be the
//! apiserver and scripts the exact sequence of calls a scenario is allowed
//! to make. An unexpected call fails the test either way: the engine sees a
//! closed service, and the scenario task never completes.

use std::sync::Arc;

use chrono::{Duration, SecondsFormat, Utc};
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::Client;
use kube::client::Body;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde_json::json;

use janitor_core::Config;

use crate::engine::{Janitor, TTL_RULE_ID};
use crate::metrics::{DeletionLabels, JanitorMetrics};

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

struct ApiServer(ApiServerHandle);

fn test_janitor(yaml: &str) -> (Janitor, ApiServer, Arc<JanitorMetrics>) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let client = Client::new(mock_service, "default");
    let config = Config::from_yaml(yaml).expect("test config must parse");
    let metrics = Arc::new(JanitorMetrics::default());
    let janitor = Janitor::new(client, config, metrics.clone());
    (janitor, ApiServer(handle), metrics)
}

fn rfc3339(ts: chrono::DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn encoded(metrics: &JanitorMetrics) -> String {
    let mut registry = Registry::default();
    metrics.register(&mut registry);
    let mut rendered = String::new();
    encode(&mut rendered, &registry).expect("metrics encode");
    rendered
}

async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

impl ApiServer {
    /// Answer one GET whose URI contains `fragment`.
    async fn handle_get(&mut self, fragment: &str, response: serde_json::Value) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET, "for {fragment}");
        let uri = request.uri().to_string();
        assert!(uri.contains(fragment), "uri {uri} should contain {fragment}");
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&response).unwrap()))
                .unwrap(),
        );
    }

    /// Answer one GET with an apiserver error status.
    async fn handle_get_failure(&mut self, fragment: &str, code: u16) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert!(request.uri().to_string().contains(fragment));
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "boom",
            "code": code,
        });
        send.send_response(
            Response::builder()
                .status(code)
                .body(Body::from(serde_json::to_vec(&status).unwrap()))
                .unwrap(),
        );
    }

    /// Answer one DELETE for the given object path.
    async fn handle_delete(&mut self, path: &str) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::DELETE);
        assert!(
            request.uri().to_string().contains(path),
            "uri {} should contain {path}",
            request.uri()
        );
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Success",
            "code": 200,
        });
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&status).unwrap()))
                .unwrap(),
        );
    }

    /// Answer one event POST, returning the created event and asserting on
    /// its shape.
    async fn handle_event(&mut self, namespace: &str, involved_name: &str) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::POST);
        assert!(
            request
                .uri()
                .to_string()
                .contains(&format!("/api/v1/namespaces/{namespace}/events")),
            "uri {} is not an event create in {namespace}",
            request.uri()
        );

        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        let event: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event["reason"], "TimeToLiveExpired");
        assert_eq!(event["action"], "Deleted");
        assert_eq!(event["type"], "Normal");
        assert_eq!(event["metadata"]["generateName"], "kube-janitor-");
        assert_eq!(event["involvedObject"]["name"], involved_name);

        send.send_response(Response::builder().body(Body::from(bytes.to_vec())).unwrap());
    }
}

fn deployment_list(items: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "kind": "DeploymentList",
        "apiVersion": "apps/v1",
        "metadata": {"resourceVersion": "1"},
        "items": items,
    })
}

#[tokio::test]
async fn ttl_label_mode_deletes_expired_resource() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
ttl:
  label: janitor/ttl
  resources:
    - {group: apps, version: v1, kind: deployments}
"#,
    );

    let scenario = tokio::spawn(async move {
        server
            .handle_get(
                "/apis/apps/v1/deployments",
                deployment_list(vec![json!({
                    "metadata": {
                        "name": "foo",
                        "namespace": "ns1",
                        "creationTimestamp": rfc3339(Utc::now() - Duration::hours(2)),
                        "labels": {"janitor/ttl": "1h"},
                    }
                })]),
            )
            .await;
        server
            .handle_delete("/apis/apps/v1/namespaces/ns1/deployments/foo")
            .await;
        server.handle_event("ns1", "foo").await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    let deleted = metrics
        .deleted
        .get_or_create(&DeletionLabels {
            rule: TTL_RULE_ID.to_string(),
            groupVersionKind: "apps/v1/deployments".to_string(),
            namespace: "ns1".to_string(),
        })
        .get();
    assert_eq!(deleted, 1);

    // expired objects never reach the pending-expiry gauge
    assert!(!encoded(&metrics).contains("name=\"foo\""));
}

#[tokio::test]
async fn dry_run_issues_no_mutating_calls() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
ttl:
  label: janitor/ttl
  resources:
    - {group: apps, version: v1, kind: deployments}
"#,
    );
    let janitor = janitor.dry_run(true);

    let scenario = tokio::spawn(async move {
        server
            .handle_get(
                "/apis/apps/v1/deployments",
                deployment_list(vec![json!({
                    "metadata": {
                        "name": "foo",
                        "namespace": "ns1",
                        "creationTimestamp": rfc3339(Utc::now() - Duration::hours(2)),
                        "labels": {"janitor/ttl": "1h"},
                    }
                })]),
            )
            .await;
        // nothing else: a delete or event call would hit a closed service
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    assert!(!encoded(&metrics).contains("kube_janitor_resource_deleted_total{"));
}

#[tokio::test]
async fn label_overrides_annotation_when_both_present() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
ttl:
  annotation: janitor/expires
  label: janitor/ttl
  resources:
    - {group: apps, version: v1, kind: deployments}
"#,
    );

    let scenario = tokio::spawn(async move {
        server
            .handle_get(
                "/apis/apps/v1/deployments",
                deployment_list(vec![
                    // label 2h beats the long-expired annotation
                    json!({
                        "metadata": {
                            "name": "both",
                            "namespace": "ns1",
                            "creationTimestamp": rfc3339(Utc::now() - Duration::hours(1)),
                            "labels": {"janitor/ttl": "2h"},
                            "annotations": {"janitor/expires": "2023-01-01T00:00:00Z"},
                        }
                    }),
                    json!({
                        "metadata": {
                            "name": "annotated",
                            "namespace": "ns1",
                            "creationTimestamp": rfc3339(Utc::now() - Duration::hours(1)),
                            "annotations": {"janitor/expires": "2023-01-01T00:00:00Z"},
                        }
                    }),
                ]),
            )
            .await;
        server
            .handle_delete("/apis/apps/v1/namespaces/ns1/deployments/annotated")
            .await;
        server.handle_event("ns1", "annotated").await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    let rendered = encoded(&metrics);
    // the label-driven object is pending, not deleted
    assert!(rendered.contains("name=\"both\""));
    assert!(!rendered.contains("name=\"annotated\","));
    assert_eq!(
        metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: TTL_RULE_ID.to_string(),
                groupVersionKind: "apps/v1/deployments".to_string(),
                namespace: "ns1".to_string(),
            })
            .get(),
        1
    );
}

#[tokio::test]
async fn wildcard_rules_only_touch_namespaced_kinds() {
    let (janitor, mut server, _metrics) = test_janitor(
        r#"
rules:
  - id: dev-cleanup
    ttl: 24h
    resources:
      - {group: "*", version: "*", kind: pods}
    namespaceSelector:
      matchLabels:
        env: dev
"#,
    );

    let scenario = tokio::spawn(async move {
        // discovery: no named groups, core v1 with pods (namespaced) and
        // nodes (cluster-scoped)
        server
            .handle_get("/apis", json!({"kind": "APIGroupList", "groups": []}))
            .await;
        server
            .handle_get(
                "/api",
                json!({
                    "kind": "APIVersions",
                    "versions": ["v1"],
                    "serverAddressByClientCIDRs": [],
                }),
            )
            .await;
        server
            .handle_get(
                "/api/v1",
                json!({
                    "kind": "APIResourceList",
                    "groupVersion": "v1",
                    "resources": [
                        {
                            "name": "pods",
                            "singularName": "pod",
                            "namespaced": true,
                            "kind": "Pod",
                            "verbs": ["get", "list", "watch", "create", "update", "patch", "delete"],
                        },
                        {
                            "name": "nodes",
                            "singularName": "node",
                            "namespaced": false,
                            "kind": "Node",
                            "verbs": ["get", "list", "watch", "create", "update", "patch", "delete"],
                        },
                    ],
                }),
            )
            .await;
        server
            .handle_get(
                "labelSelector=env%3Ddev",
                json!({
                    "kind": "NamespaceList",
                    "apiVersion": "v1",
                    "metadata": {},
                    "items": [{"metadata": {"name": "dev1"}}],
                }),
            )
            .await;
        // only pods are listed, only in the matching namespace; a nodes
        // list would be an unexpected call
        server
            .handle_get(
                "/api/v1/namespaces/dev1/pods",
                json!({
                    "kind": "PodList",
                    "apiVersion": "v1",
                    "metadata": {},
                    "items": [],
                }),
            )
            .await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;
}

#[tokio::test]
async fn filter_path_only_reaps_selected_objects() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
rules:
  - id: gc
    ttl: 1h
    resources:
      - group: ""
        version: v1
        kind: configmaps
        filterPath: "metadata.labels.gc == 'yes'"
"#,
    );

    let scenario = tokio::spawn(async move {
        server
            .handle_get(
                "/api/v1/configmaps",
                json!({
                    "kind": "ConfigMapList",
                    "apiVersion": "v1",
                    "metadata": {},
                    "items": [
                        {
                            "metadata": {
                                "name": "reap-me",
                                "namespace": "ns1",
                                "creationTimestamp": rfc3339(Utc::now() - Duration::hours(2)),
                                "labels": {"gc": "yes"},
                            }
                        },
                        {
                            "metadata": {
                                "name": "keep-me",
                                "namespace": "ns1",
                                "creationTimestamp": rfc3339(Utc::now() - Duration::hours(2)),
                            }
                        },
                    ],
                }),
            )
            .await;
        server
            .handle_delete("/api/v1/namespaces/ns1/configmaps/reap-me")
            .await;
        server.handle_event("ns1", "reap-me").await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    assert_eq!(
        metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: "gc".to_string(),
                groupVersionKind: "v1/configmaps".to_string(),
                namespace: "ns1".to_string(),
            })
            .get(),
        1
    );
    // the filtered-out object is skipped entirely, not pending
    assert!(!encoded(&metrics).contains("keep-me"));
}

#[tokio::test]
async fn timestamp_path_overrides_creation_timestamp() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
rules:
  - id: start-time
    ttl: 30m
    resources:
      - group: ""
        version: v1
        kind: pods
        timestampPath: status.startTime
"#,
    );

    let scenario = tokio::spawn(async move {
        server
            .handle_get(
                "/api/v1/pods",
                json!({
                    "kind": "PodList",
                    "apiVersion": "v1",
                    "metadata": {},
                    "items": [{
                        // young by creation, old by start time
                        "metadata": {
                            "name": "worker",
                            "namespace": "ns1",
                            "creationTimestamp": rfc3339(Utc::now() - Duration::minutes(5)),
                        },
                        "status": {"startTime": rfc3339(Utc::now() - Duration::hours(1))},
                    }],
                }),
            )
            .await;
        server
            .handle_delete("/api/v1/namespaces/ns1/pods/worker")
            .await;
        server.handle_event("ns1", "worker").await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    assert_eq!(
        metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: "start-time".to_string(),
                groupVersionKind: "v1/pods".to_string(),
                namespace: "ns1".to_string(),
            })
            .get(),
        1
    );
}

#[tokio::test]
async fn paged_listing_follows_continue_tokens() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
rules:
  - id: pending
    ttl: 24h
    resources:
      - {group: "", version: v1, kind: configmaps}
"#,
    );

    let item = |name: &str| {
        json!({
            "metadata": {
                "name": name,
                "namespace": "ns1",
                "creationTimestamp": rfc3339(Utc::now()),
            }
        })
    };

    let scenario = tokio::spawn(async move {
        {
            let (request, send) = server.0.next_request().await.expect("service not called");
            let uri = request.uri().to_string();
            assert!(uri.contains("limit=100"));
            assert!(!uri.contains("continue="));
            let page = json!({
                "kind": "ConfigMapList",
                "apiVersion": "v1",
                "metadata": {"continue": "page-2"},
                "items": [item("first")],
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&page).unwrap()))
                    .unwrap(),
            );
        }
        {
            let (request, send) = server.0.next_request().await.expect("service not called");
            assert!(request.uri().to_string().contains("continue=page-2"));
            let page = json!({
                "kind": "ConfigMapList",
                "apiVersion": "v1",
                "metadata": {"continue": ""},
                "items": [item("second")],
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&page).unwrap()))
                    .unwrap(),
            );
        }
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    let rendered = encoded(&metrics);
    assert!(rendered.contains("name=\"first\""));
    assert!(rendered.contains("name=\"second\""));
}

#[tokio::test]
async fn listing_failures_skip_the_resource_and_continue() {
    let (janitor, mut server, metrics) = test_janitor(
        r#"
rules:
  - id: multi
    ttl: 1h
    resources:
      - {group: batch, version: v1, kind: jobs}
      - {group: "", version: v1, kind: configmaps}
"#,
    );

    let scenario = tokio::spawn(async move {
        server.handle_get_failure("/apis/batch/v1/jobs", 500).await;
        // the second resource of the same rule is still walked
        server
            .handle_get(
                "/api/v1/configmaps",
                json!({
                    "kind": "ConfigMapList",
                    "apiVersion": "v1",
                    "metadata": {},
                    "items": [{
                        "metadata": {
                            "name": "stale",
                            "namespace": "ns1",
                            "creationTimestamp": rfc3339(Utc::now() - Duration::hours(2)),
                        }
                    }],
                }),
            )
            .await;
        server
            .handle_delete("/api/v1/namespaces/ns1/configmaps/stale")
            .await;
        server.handle_event("ns1", "stale").await;
    });

    janitor.run().await.unwrap();
    timeout_after_1s(scenario).await;

    assert_eq!(
        metrics
            .deleted
            .get_or_create(&DeletionLabels {
                rule: "multi".to_string(),
                groupVersionKind: "v1/configmaps".to_string(),
                namespace: "ns1".to_string(),
            })
            .get(),
        1
    );
}
