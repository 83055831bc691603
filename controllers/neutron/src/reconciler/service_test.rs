//! Unit tests for the service reconciler

use crate::annotations::{POOL_ANNOTATION, VIP_ANNOTATION};
use crate::error::ControllerError;
use crate::registry::{EventType, ResourceEvent};
use crate::test_utils::*;
use neutron_client::NeutronApi;

fn event(event_type: EventType, object: kube::api::DynamicObject) -> ResourceEvent {
    ResourceEvent { event_type, object }
}

async fn setup() -> (
    std::sync::Arc<crate::reconciler::Reconciler>,
    neutron_client::MockNeutronClient,
    tokio::sync::mpsc::UnboundedReceiver<RecordedRequest>,
) {
    let (reconciler, mock, mut requests) = test_reconciler().await;
    reconciler
        .reconcile_namespace(event(EventType::Added, namespace_object("team-a")))
        .await
        .unwrap();
    while requests.try_recv().is_ok() {}
    mock.reset_calls();
    (reconciler, mock, requests)
}

#[tokio::test]
async fn test_added_creates_pool_and_vip_and_records_ledger() {
    let (reconciler, mock, mut requests) = setup().await;

    let service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    reconciler.reconcile_service(event(EventType::Added, service)).await.unwrap();

    let calls = mock.calls();
    let pool_pos = calls.iter().position(|c| c == "create_pool").unwrap();
    let vip_pos = calls.iter().position(|c| c == "create_vip").unwrap();
    assert!(pool_pos < vip_pos);

    let namespace_subnet = mock.list_subnets(&[("name", "team-a-subnet")]).unwrap().remove(0);
    let pool = mock.list_pools(&[("name", "svc-a")]).unwrap().remove(0);
    assert_eq!(pool.protocol, "TCP");
    assert_eq!(pool.subnet_id, namespace_subnet.id);
    assert_eq!(pool.lb_method, "ROUND_ROBIN");

    let vip = mock.list_vips(&[("name", "svc-a")]).unwrap().remove(0);
    assert_eq!(vip.pool_id, pool.id);
    assert_eq!(vip.address, "10.112.0.10");
    assert_eq!(vip.protocol_port, 8080);
    assert_eq!(vip.subnet_id, reconciler.ctx.service_subnet.id);

    let patch = requests.try_recv().expect("annotation patch was sent");
    assert_eq!(patch.method, "PATCH");
    assert_eq!(patch.path, "/api/v1/namespaces/team-a/services/svc-a");
    assert_eq!(patch.content_type, "application/merge-patch+json");
    let annotations = &patch.body["metadata"]["annotations"];
    assert!(annotations[POOL_ANNOTATION].is_string());
    assert!(annotations[VIP_ANNOTATION].is_string());
}

#[tokio::test]
async fn test_added_ignores_non_cluster_ip_services() {
    let (reconciler, mock, mut requests) = setup().await;

    let mut service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    service.data["spec"]["type"] = serde_json::json!("NodePort");
    reconciler.reconcile_service(event(EventType::Added, service)).await.unwrap();

    assert!(mock.calls().is_empty());
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_added_before_namespace_is_transient() {
    let (reconciler, mock, _requests) = setup().await;

    let service = service_object("ghost", "svc-a", "10.112.0.10", 80, 8080);
    let result = reconciler.reconcile_service(event(EventType::Added, service)).await;

    assert!(matches!(result, Err(ControllerError::NamespaceNotReady(_))));
    assert!(!mock.calls().iter().any(|c| c == "create_pool"));
}

#[tokio::test]
async fn test_added_rolls_back_pool_when_vip_creation_fails() {
    let (reconciler, mock, mut requests) = setup().await;

    mock.fail_next("create_vip");
    let service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    let result = reconciler.reconcile_service(event(EventType::Added, service)).await;

    assert!(result.is_err());
    // The orphaned pool was taken back out and nothing was recorded
    assert_eq!(mock.pool_count(), 0);
    assert_eq!(mock.vip_count(), 0);
    assert!(mock.calls().iter().any(|c| c.starts_with("delete_pool:")));
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_added_with_recorded_pool_is_ignored() {
    let (reconciler, mock, mut requests) = setup().await;

    let service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    reconciler.reconcile_service(event(EventType::Added, service)).await.unwrap();
    let pool = mock.list_pools(&[("name", "svc-a")]).unwrap().remove(0);
    while requests.try_recv().is_ok() {}
    mock.reset_calls();

    let replay = with_annotation(
        service_object("team-a", "svc-a", "10.112.0.10", 80, 8080),
        POOL_ANNOTATION,
        &serde_json::to_string(&pool).unwrap(),
    );
    reconciler.reconcile_service(event(EventType::Added, replay)).await.unwrap();

    assert!(mock.calls().is_empty());
    assert_eq!(mock.pool_count(), 1);
    assert_eq!(mock.vip_count(), 1);
}

#[tokio::test]
async fn test_deleted_removes_vip_before_pool_from_ledger() {
    let (reconciler, mock, mut requests) = setup().await;

    let service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    reconciler.reconcile_service(event(EventType::Added, service)).await.unwrap();
    let pool = mock.list_pools(&[("name", "svc-a")]).unwrap().remove(0);
    let vip = mock.list_vips(&[("name", "svc-a")]).unwrap().remove(0);
    while requests.try_recv().is_ok() {}
    mock.reset_calls();

    let object = with_annotation(
        with_annotation(
            service_object("team-a", "svc-a", "10.112.0.10", 80, 8080),
            POOL_ANNOTATION,
            &serde_json::to_string(&pool).unwrap(),
        ),
        VIP_ANNOTATION,
        &serde_json::to_string(&vip).unwrap(),
    );
    reconciler.reconcile_service(event(EventType::Deleted, object)).await.unwrap();

    assert_eq!(
        mock.calls(),
        vec![format!("delete_vip:{}", vip.id), format!("delete_pool:{}", pool.id)]
    );
    assert_eq!(mock.pool_count(), 0);
    assert_eq!(mock.vip_count(), 0);
}

#[tokio::test]
async fn test_deleted_without_ledger_is_a_noop() {
    let (reconciler, mock, _requests) = setup().await;

    let service = service_object("team-a", "svc-a", "10.112.0.10", 80, 8080);
    reconciler.reconcile_service(event(EventType::Deleted, service)).await.unwrap();

    assert!(mock.calls().is_empty());
}
