//! Test utilities for unit testing reconcilers
//!
//! Provides a mock API server backing a real `kube::Client` (so tests can
//! assert on the exact PATCH traffic the reconcilers produce), builders for
//! watch-event objects, and a fully wired reconciler on top of the mock
//! Neutron client.

use crate::config::ControllerConfig;
use crate::context::ensure_networking_base;
use crate::delegate::Delegator;
use crate::reconciler::Reconciler;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::Client;
use kube::api::{ApiResource, DynamicObject};
use kube::client::Body;
use neutron_client::{MockNeutronClient, NeutronApi};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_test::mock;

/// One request captured by the mock API server.
#[derive(Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: String,
    pub body: serde_json::Value,
}

/// Creates a `kube::Client` whose every request is recorded and answered
/// with a minimal 200 response.
pub fn mock_kube_client() -> (Client, mpsc::UnboundedReceiver<RecordedRequest>) {
    let (mock_service, mut handle) = mock::pair::<Request<Body>, Response<Body>>();
    let client = Client::new(mock_service, "default");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some((request, send)) = handle.next_request().await {
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            let content_type = request
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let bytes = request.into_body().collect_bytes().await.unwrap_or_default();
            let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            let _ = tx.send(RecordedRequest { method, path, content_type, body });

            let reply = serde_json::json!({
                "apiVersion": "v1",
                "kind": "Status",
                "metadata": {},
            });
            let response = Response::builder()
                .status(200)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&reply).unwrap()))
                .unwrap();
            send.send_response(response);
        }
    });

    (client, rx)
}

/// A reconciler wired to a mock Neutron cloud with the networking base
/// already provisioned, plus the mock handles for assertions.
pub async fn test_reconciler()
-> (Arc<Reconciler>, MockNeutronClient, mpsc::UnboundedReceiver<RecordedRequest>) {
    let mock = MockNeutronClient::new("http://test-neutron");
    let neutron: Arc<dyn NeutronApi> = Arc::new(mock.clone());
    let delegator = Arc::new(Delegator::new(4));
    let config = ControllerConfig::default();
    let ctx = ensure_networking_base(&neutron, &delegator, &config)
        .await
        .expect("networking base bootstrap");
    mock.reset_calls();

    let (client, requests) = mock_kube_client();
    let reconciler = Arc::new(Reconciler::new(
        client,
        neutron,
        delegator,
        Arc::new(ctx),
        config.lb_method.clone(),
    ));
    (reconciler, mock, requests)
}

fn object_with(ar: &ApiResource, namespace: Option<&str>, name: &str) -> DynamicObject {
    let mut object = DynamicObject::new(name, ar);
    if let Some(ns) = namespace {
        object = object.within(ns);
    }
    object.metadata.uid = Some(format!("uid-{}", name));
    object.metadata.resource_version = Some("1".to_string());
    object
}

/// Builds a namespace watch object.
pub fn namespace_object(name: &str) -> DynamicObject {
    object_with(&ApiResource::erase::<Namespace>(&()), None, name)
}

/// Builds a pod watch object.
pub fn pod_object(namespace: &str, name: &str) -> DynamicObject {
    object_with(&ApiResource::erase::<Pod>(&()), Some(namespace), name)
}

/// Builds a ClusterIP service watch object with one port.
pub fn service_object(
    namespace: &str,
    name: &str,
    cluster_ip: &str,
    port: i32,
    target_port: i32,
) -> DynamicObject {
    let mut object = object_with(&ApiResource::erase::<Service>(&()), Some(namespace), name);
    object.data = serde_json::json!({
        "spec": {
            "type": "ClusterIP",
            "clusterIP": cluster_ip,
            "ports": [
                { "protocol": "TCP", "port": port, "targetPort": target_port }
            ],
        }
    });
    object
}

/// Adds an annotation to a watch object.
pub fn with_annotation(mut object: DynamicObject, key: &str, value: &str) -> DynamicObject {
    object
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
    object
}

/// Adds a label to a watch object.
pub fn with_label(mut object: DynamicObject, key: &str, value: &str) -> DynamicObject {
    object
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
    object
}
