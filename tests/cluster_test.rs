use bytes::Bytes;
use fleetd::api::{ApiRequest, ApiResponse};
use fleetd::cluster::PeerOperation;
use fleetd::lifecycle::{Daemon, LocalCluster};
use fleetd::model::{ClientType, InstanceStatus, ResourceKey, ResourceKind};
use http::{Method, StatusCode};
use resource_store::StoredRecord;
use serde_json::{json, Value};
use std::time::Duration;

const ZONE: &str = "fleet.example.org";

fn node<'a>(cluster: &'a LocalCluster, name: &str) -> &'a Daemon {
    cluster.daemon(name).expect("member exists")
}

async fn post(daemon: &Daemon, collection: &str, body: Value) -> ApiResponse {
    let request = ApiRequest::new(Method::POST, format!("/1.0/{collection}"))
        .with_json(&body)
        .unwrap();
    daemon.handle(request).await
}

/// `web1` hosted on node2 and running there.
async fn instance_on_node2(cluster: &LocalCluster) {
    let response = post(
        node(cluster, "node1"),
        "instances",
        json!({ "name": "web1", "type": "container", "location": "node2" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());

    let key = ResourceKey::new("default", ResourceKind::Instance, "web1");
    cluster
        .runtime("node2")
        .unwrap()
        .set_status(&key, InstanceStatus::Running);
    cluster.transport().clear_calls();
}

async fn create_zone(cluster: &LocalCluster) {
    let response = post(
        node(cluster, "node1"),
        "network-zones",
        json!({ "name": ZONE, "config": { "dns.nameservers": "ns1.example.org" } }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());
    cluster.transport().clear_calls();
}

fn update_zone(description: &str) -> ApiRequest {
    ApiRequest::for_resource(Method::PUT, ResourceKind::NetworkZone, ZONE)
        .with_json(&json!({
            "description": description,
            "config": { "dns.nameservers": "ns1.example.org,ns2.example.org" }
        }))
        .unwrap()
}

fn notifications(cluster: &LocalCluster) -> Vec<String> {
    let mut targets: Vec<String> = cluster
        .transport()
        .calls()
        .into_iter()
        .filter(|call| call.client_type == ClientType::Notification)
        .map(|call| call.to)
        .collect();
    targets.sort();
    targets
}

#[tokio::test]
async fn test_instance_read_is_served_by_its_host() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    instance_on_node2(&cluster).await;

    for receiver in ["node1", "node2", "node3"] {
        let response = node(&cluster, receiver)
            .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        let metadata = response.metadata().unwrap();
        // Only node2's runtime knows web1 is running.
        assert_eq!(metadata["status"], "Running", "read through {receiver}");
        assert_eq!(metadata["location"], "node2");
    }

    let calls = cluster.transport().calls();
    assert_eq!(calls.len(), 2, "node2 serves its own request locally");
    assert!(calls
        .iter()
        .all(|call| call.to == "node2" && call.forwarded && call.method == Method::GET));

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_forwarded_and_direct_reads_agree() {
    let cluster = LocalCluster::start(&["node1", "node2"]).unwrap();
    instance_on_node2(&cluster).await;

    let via_node1 = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;
    let direct = node(&cluster, "node2")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;

    assert_eq!(via_node1.status, direct.status);
    assert_eq!(via_node1.etag, direct.etag);
    assert_eq!(via_node1.metadata(), direct.metadata());

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_forwarded_request_is_never_forwarded_again() {
    let cluster = LocalCluster::start(&["node1", "node2"]).unwrap();
    instance_on_node2(&cluster).await;

    let mut request = ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1");
    request.forwarded = true;
    let response = node(&cluster, "node1").handle(request).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(cluster.transport().calls().is_empty());

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_host_fails_without_a_call() {
    let cluster = LocalCluster::start(&["node1", "node2"]).unwrap();
    instance_on_node2(&cluster).await;

    assert!(node(&cluster, "node1")
        .state()
        .members
        .mark_unreachable("node2"));
    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json().unwrap()["error_code"], 503);
    assert!(cluster.transport().calls().is_empty());

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_detached_host_is_unreachable() {
    let cluster = LocalCluster::start(&["node1", "node2"]).unwrap();
    instance_on_node2(&cluster).await;

    cluster.transport().detach("node2");
    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(cluster.transport().calls().len(), 1);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_host_times_out() {
    let cluster = LocalCluster::start_with(&["node1", "node2"], |config| {
        config.forward_timeout_ms = 50;
    })
    .unwrap();
    instance_on_node2(&cluster).await;

    cluster
        .transport()
        .set_delay("node2", Some(Duration::from_millis(500)));
    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    cluster.transport().set_delay("node2", None);
    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_zone_update_notifies_each_peer_once() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;

    let response = node(&cluster, "node1").handle(update_zone("fleet")).await;
    assert_eq!(response.status, StatusCode::OK);

    // Exactly one hop: no peer announces the notification it received.
    let calls = cluster.transport().calls();
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .all(|call| call.method == Method::PUT && !call.forwarded));
    assert_eq!(notifications(&cluster), vec!["node2", "node3"]);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notification_is_not_propagated() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;

    let request = update_zone("fleet").with_client_type(ClientType::Notification);
    let response = node(&cluster, "node2").handle(request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(cluster.transport().calls().is_empty());

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_peer_is_skipped() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;

    node(&cluster, "node1")
        .state()
        .members
        .mark_unreachable("node3");
    let response = node(&cluster, "node1").handle(update_zone("fleet")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(notifications(&cluster), vec!["node2"]);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_peer_does_not_fail_the_mutation() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;

    cluster.transport().detach("node3");
    let response = node(&cluster, "node1").handle(update_zone("fleet")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(notifications(&cluster), vec!["node2", "node3"]);

    let stored = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::NetworkZone, ZONE))
        .await;
    assert_eq!(stored.metadata().unwrap()["description"], "fleet");

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_propagation_report() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3", "node4"]).unwrap();
    create_zone(&cluster).await;

    let node1 = node(&cluster, "node1");
    node1.state().members.mark_unreachable("node4");
    cluster.transport().detach("node3");

    let body = Bytes::from(serde_json::to_vec(&json!({ "config": {} })).unwrap());
    let report = node1
        .state()
        .propagator
        .propagate(ResourceKind::NetworkZone, "default", ZONE, PeerOperation::Update(body))
        .await;

    assert_eq!(report.notified, vec!["node2"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "node3");
    assert_eq!(report.skipped, vec!["node4"]);
    assert!(!report.is_complete());

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_committed_update_propagates_after_caller_leaves() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;
    let key = ResourceKey::new("default", ResourceKind::NetworkZone, ZONE);

    // Drive the request only until the store holds the change, then abandon it.
    let mut request = Box::pin(node(&cluster, "node1").handle(update_zone("changed")));
    loop {
        tokio::select! {
            biased;
            _ = &mut request => break,
            _ = tokio::task::yield_now() => {}
        }
        let stored = cluster.store().get(key.clone()).await.unwrap().unwrap();
        if stored.description == "changed" {
            break;
        }
    }
    drop(request);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(notifications(&cluster), ["node2", "node3"]);

    let stored = cluster.store().get(key).await.unwrap().unwrap();
    for member in ["node1", "node2", "node3"] {
        let served = node(&cluster, member)
            .state()
            .served
            .get("default", ZONE)
            .unwrap();
        assert_eq!(&served.etag, stored.etag(), "{member} serves a stale zone");
    }

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peers_serve_the_latest_zone() {
    let cluster = LocalCluster::start(&["node1", "node2", "node3"]).unwrap();
    create_zone(&cluster).await;

    for member in ["node1", "node2", "node3"] {
        let served = node(&cluster, member).state().served.get("default", ZONE);
        assert!(served.is_some(), "{member} serves the new zone");
    }

    let response = node(&cluster, "node1").handle(update_zone("fleet")).await;
    let etag = response.etag.clone().unwrap();
    for member in ["node2", "node3"] {
        let served = node(&cluster, member)
            .state()
            .served
            .get("default", ZONE)
            .unwrap();
        assert_eq!(served.etag, etag);
        assert!(served.content.contains("@ IN NS ns2.example.org."));
    }

    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::DELETE, ResourceKind::NetworkZone, ZONE))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    for member in ["node1", "node2", "node3"] {
        assert!(node(&cluster, member)
            .state()
            .served
            .get("default", ZONE)
            .is_none());
    }

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_network_change_refreshes_zone_on_peers() {
    let cluster = LocalCluster::start(&["node1", "node2"]).unwrap();
    create_zone(&cluster).await;

    let response = post(
        node(&cluster, "node1"),
        "networks",
        json!({
            "name": "lan0",
            "config": { "ipv4.address": "10.0.0.1/24", "dns.zone.forward": ZONE }
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());

    let served = node(&cluster, "node2")
        .state()
        .served
        .get("default", ZONE)
        .unwrap();
    assert!(served.content.contains("lan0.gw IN A 10.0.0.1"));

    let response = node(&cluster, "node1")
        .handle(ApiRequest::for_resource(Method::DELETE, ResourceKind::Network, "lan0"))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let served = node(&cluster, "node2")
        .state()
        .served
        .get("default", ZONE)
        .unwrap();
    assert!(!served.content.contains("lan0.gw"));

    cluster.shutdown().await.unwrap();
}
