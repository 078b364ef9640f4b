//! Shared fixtures for audit integration tests.

#![allow(dead_code)]

use rewind_audit::{
    service_account_user, ClusterClient, MemoryCluster, RepoConfig, RepoState, Resource,
    ResourceKind,
};
use rewind_storage::StorageMode;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

pub fn service_account() -> String {
    service_account_user("kube-system", "antrea-audit")
}

pub async fn memory_state(cluster: Arc<dyn ClusterClient>) -> RepoState {
    let config = RepoConfig {
        mode: StorageMode::InMemory,
        location: PathBuf::new(),
        service_account: service_account(),
    };
    RepoState::setup(&config, cluster).await.unwrap()
}

pub fn api_version(kind: ResourceKind) -> String {
    format!("{}/{}", kind.group(), kind.version())
}

/// A resource as the API server would return it.
pub fn server_object(kind: ResourceKind, namespace: &str, name: &str, spec: Value) -> Value {
    let mut metadata = json!({
        "name": name,
        "uid": format!("uid-{name}"),
        "generation": 1,
        "creationTimestamp": "2024-05-01T10:00:00Z",
        "annotations": {
            "kubectl.kubernetes.io/last-applied-configuration": "{}"
        }
    });
    if !namespace.is_empty() {
        metadata["namespace"] = json!(namespace);
    }
    json!({
        "apiVersion": api_version(kind),
        "kind": kind.kind(),
        "metadata": metadata,
        "spec": spec
    })
}

pub fn resource(kind: ResourceKind, namespace: &str, name: &str, spec: Value) -> Resource {
    Resource::from_json(server_object(kind, namespace, name, spec))
        .unwrap()
        .sanitized()
}

/// One completed audit event.
pub fn event(
    verb: &str,
    user: &str,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    spec: Value,
) -> Value {
    let mut event = json!({
        "level": "RequestResponse",
        "stage": "ResponseComplete",
        "verb": verb,
        "user": {"username": user, "uid": format!("{user}-uid")},
        "objectRef": {
            "resource": kind.plural(),
            "namespace": namespace,
            "name": name,
            "apiGroup": kind.group(),
            "apiVersion": kind.version()
        },
        "responseStatus": {"metadata": {}, "code": 200}
    });
    if verb != "delete" {
        event["responseObject"] = server_object(kind, namespace, name, spec);
    }
    event
}

pub fn batch(events: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "kind": "EventList",
        "apiVersion": "audit.k8s.io/v1",
        "items": events
    }))
    .unwrap()
}

/// Applies a change to the cluster and reports it as an audit event.
pub async fn audited_change(
    state: &RepoState,
    cluster: &MemoryCluster,
    verb: &str,
    user: &str,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    spec: Value,
) {
    let object = resource(kind, namespace, name, spec.clone());
    match verb {
        "delete" => cluster.delete_resource(kind, &object).await.unwrap(),
        _ => cluster.create_or_update(kind, &object).await.unwrap(),
    }
    let outcome = state
        .handle_event_list(&batch(vec![event(verb, user, kind, namespace, name, spec)]))
        .await
        .unwrap();
    assert_eq!(outcome.commits.len(), 1);
}
