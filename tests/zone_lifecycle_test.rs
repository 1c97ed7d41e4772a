use fleetd::api::{self, ApiRequest, ApiResponse};
use fleetd::cluster::LoopbackTransport;
use fleetd::config::{DaemonConfig, MemberConfig};
use fleetd::driver::ResourceDriver;
use fleetd::error::ResourceError;
use fleetd::lifecycle::{Daemon, LocalCluster};
use fleetd::model::{RecordCreate, ResourceKey, ResourceKind, ResourceRecord};
use fleetd::registry;
use fleetd::runtime::{InMemoryRuntime, RuntimeQuery};
use fleetd::state::DaemonState;
use http::{Method, StatusCode};
use resource_store::mock::MockStore;
use resource_store::{StoreError, StoredRecord};
use serde_json::{json, Value};
use std::sync::Arc;

const ZONE: &str = "fleet.example.org";

async fn post(daemon: &Daemon, collection: &str, body: Value) -> ApiResponse {
    let request = ApiRequest::new(Method::POST, format!("/1.0/{collection}"))
        .with_json(&body)
        .unwrap();
    let response = daemon.handle(request).await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());
    response
}

fn zone(method: Method) -> ApiRequest {
    ApiRequest::for_resource(method, ResourceKind::NetworkZone, ZONE)
}

fn put_zone(description: &str) -> ApiRequest {
    zone(Method::PUT)
        .with_json(&json!({
            "description": description,
            "config": { "dns.nameservers": "ns1.example.org" }
        }))
        .unwrap()
}

#[tokio::test]
async fn test_etag_changes_only_with_content() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(
        node1,
        "network-zones",
        json!({ "name": ZONE, "config": { "dns.nameservers": "ns1.example.org" } }),
    )
    .await;

    let first = node1.handle(zone(Method::GET)).await;
    let second = node1.handle(zone(Method::GET)).await;
    assert!(first.etag.is_some());
    assert_eq!(first.etag, second.etag);

    // Same content, same tag.
    let unchanged = node1.handle(put_zone("")).await;
    assert_eq!(unchanged.status, StatusCode::OK);
    assert_eq!(unchanged.etag, first.etag);

    let changed = node1.handle(put_zone("fleet")).await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_ne!(changed.etag, first.etag);

    let read = node1.handle(zone(Method::GET)).await;
    assert_eq!(read.etag, changed.etag);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stale_if_match_is_rejected() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(node1, "network-zones", json!({ "name": ZONE })).await;

    let stale = node1.handle(zone(Method::GET)).await.etag.unwrap();
    let current = node1
        .handle(put_zone("first").with_if_match(stale.clone()))
        .await;
    assert_eq!(current.status, StatusCode::OK);

    let rejected = node1.handle(put_zone("second").with_if_match(stale.clone())).await;
    assert_eq!(rejected.status, StatusCode::PRECONDITION_FAILED);

    let delete = node1.handle(zone(Method::DELETE).with_if_match(stale)).await;
    assert_eq!(delete.status, StatusCode::PRECONDITION_FAILED);

    let read = node1.handle(zone(Method::GET)).await;
    assert_eq!(read.metadata().unwrap()["description"], "first");
    assert_eq!(read.etag, current.etag);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_patch_merges_into_current_state() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(
        node1,
        "network-zones",
        json!({
            "name": ZONE,
            "description": "fleet",
            "config": { "dns.nameservers": "ns1.example.org", "user.owner": "ops" }
        }),
    )
    .await;

    let patch = zone(Method::PATCH)
        .with_json(&json!({ "config": { "user.owner": "", "network.nat": "true" } }))
        .unwrap();
    assert_eq!(node1.handle(patch).await.status, StatusCode::OK);

    let metadata = node1.handle(zone(Method::GET)).await.metadata().unwrap();
    assert_eq!(metadata["description"], "fleet");
    assert_eq!(
        metadata["config"],
        json!({ "dns.nameservers": "ns1.example.org", "network.nat": "true" })
    );

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_not_applied() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(node1, "network-zones", json!({ "name": ZONE })).await;
    let before = node1.handle(zone(Method::GET)).await;

    let request = zone(Method::PUT)
        .with_json(&json!({ "config": { "peers.a.address": "not-an-ip" } }))
        .unwrap();
    let response = node1.handle(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json().unwrap()["type"], "error");

    let after = node1.handle(zone(Method::GET)).await;
    assert_eq!(before.etag, after.etag);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_zone_in_use_cannot_be_deleted() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(
        node1,
        "network-zones",
        json!({ "name": ZONE, "config": { "dns.nameservers": "ns1.example.org" } }),
    )
    .await;
    post(
        node1,
        "networks",
        json!({
            "name": "lan0",
            "config": { "ipv4.address": "10.0.0.1/24", "dns.zone.forward": ZONE }
        }),
    )
    .await;

    let metadata = node1.handle(zone(Method::GET)).await.metadata().unwrap();
    assert_eq!(metadata["used_by"], json!(["network/lan0"]));

    let content = node1
        .handle(ApiRequest::new(
            Method::GET,
            format!("/1.0/network-zones/{ZONE}/content"),
        ))
        .await;
    assert_eq!(content.status, StatusCode::OK);
    let text = String::from_utf8(content.body.to_vec()).unwrap();
    assert!(text.starts_with(&format!("$ORIGIN {ZONE}.")));
    assert!(text.contains("lan0.gw IN A 10.0.0.1"));

    let refused = node1.handle(zone(Method::DELETE)).await;
    assert_eq!(refused.status, StatusCode::CONFLICT);

    let release = ApiRequest::for_resource(Method::PATCH, ResourceKind::Network, "lan0")
        .with_json(&json!({ "config": { "dns.zone.forward": "" } }))
        .unwrap();
    assert_eq!(node1.handle(release).await.status, StatusCode::OK);

    assert_eq!(node1.handle(zone(Method::DELETE)).await.status, StatusCode::OK);
    assert_eq!(
        node1.handle(zone(Method::GET)).await.status,
        StatusCode::NOT_FOUND
    );

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_network_must_reference_existing_zone() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();

    let request = ApiRequest::new(Method::POST, "/1.0/networks")
        .with_json(&json!({ "name": "lan0", "config": { "dns.zone.forward": ZONE } }))
        .unwrap();
    assert_eq!(node1.handle(request).await.status, StatusCode::BAD_REQUEST);

    cluster.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_zone_delete_racing_network_create_leaves_no_dangling_reference() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();

    for i in 0..50 {
        let zone_name = format!("z{i}.example.org");
        let network_name = format!("net{i}");
        post(node1, "network-zones", json!({ "name": zone_name })).await;

        let delete = node1.handle(ApiRequest::for_resource(
            Method::DELETE,
            ResourceKind::NetworkZone,
            &zone_name,
        ));
        let create = node1.handle(
            ApiRequest::new(Method::POST, "/1.0/networks")
                .with_json(&json!({
                    "name": network_name,
                    "config": { "dns.zone.forward": zone_name }
                }))
                .unwrap(),
        );
        let (deleted, created) = tokio::join!(delete, create);
        assert!(
            deleted.status != StatusCode::OK || created.status != StatusCode::OK,
            "round {i}: zone deleted while a network was created on it"
        );

        let zone_status = node1
            .handle(ApiRequest::for_resource(
                Method::GET,
                ResourceKind::NetworkZone,
                &zone_name,
            ))
            .await
            .status;
        let network_status = node1
            .handle(ApiRequest::for_resource(
                Method::GET,
                ResourceKind::Network,
                &network_name,
            ))
            .await
            .status;
        if network_status == StatusCode::OK {
            assert_eq!(zone_status, StatusCode::OK, "round {i}: network outlived its zone");
        }
    }

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_full_view_is_all_or_nothing() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(node1, "instances", json!({ "name": "web1" })).await;
    let runtime = cluster.runtime("node1").unwrap();

    let full = || {
        ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1")
            .with_query("recursion", "1")
    };

    let ok = node1.handle(full()).await;
    assert_eq!(ok.status, StatusCode::OK);
    let metadata = ok.metadata().unwrap();
    assert!(metadata.get("state").is_some());
    assert_eq!(metadata["snapshots"], json!([]));

    runtime.fail(RuntimeQuery::Snapshots);
    let failed = node1.handle(full()).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(failed.metadata().is_none());

    // The basic view does not touch snapshots.
    let basic = node1
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await;
    assert_eq!(basic.status, StatusCode::OK);
    assert!(basic.metadata().unwrap().get("snapshots").is_none());

    runtime.heal(RuntimeQuery::Snapshots);
    assert_eq!(node1.handle(full()).await.status, StatusCode::OK);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_typed_collection_hides_other_types() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(
        node1,
        "instances",
        json!({ "name": "vm1", "type": "virtual-machine" }),
    )
    .await;

    let as_vm = node1
        .handle(ApiRequest::new(Method::GET, "/1.0/virtual-machines/vm1"))
        .await;
    assert_eq!(as_vm.status, StatusCode::OK);

    let as_container = node1
        .handle(ApiRequest::new(Method::GET, "/1.0/containers/vm1"))
        .await;
    assert_eq!(as_container.status, StatusCode::NOT_FOUND);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_instance_put_without_architecture_keeps_it() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(node1, "instances", json!({ "name": "web1", "architecture": "aarch64" })).await;

    let put = ApiRequest::for_resource(Method::PUT, ResourceKind::Instance, "web1")
        .with_json(&json!({ "description": "frontend", "config": { "limits.cpu": "2" } }))
        .unwrap();
    assert_eq!(node1.handle(put).await.status, StatusCode::OK);

    let metadata = node1
        .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
        .await
        .metadata()
        .unwrap();
    assert_eq!(metadata["architecture"], "aarch64");
    assert_eq!(metadata["description"], "frontend");

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lookup_by_name_alone() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();
    post(node1, "network-zones", json!({ "name": "lan0" })).await;
    post(node1, "networks", json!({ "name": "lan0" })).await;
    post(node1, "networks", json!({ "name": "lan1" })).await;

    let state = node1.state();
    let unique = registry::load_by_project_and_name(state, "default", "lan1")
        .await
        .unwrap();
    assert_eq!(unique.kind(), ResourceKind::Network);

    match registry::load_by_project_and_name(state, "default", "lan0").await {
        Err(ResourceError::AmbiguousKind { kinds, .. }) => {
            assert_eq!(kinds, vec![ResourceKind::NetworkZone, ResourceKind::Network]);
        }
        other => panic!("expected AmbiguousKind, got {:?}", other.map(|d| d.kind())),
    }

    assert!(matches!(
        registry::load_by_project_and_name(state, "other", "lan0").await,
        Err(ResourceError::NotFound(_))
    ));

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_store_failure_during_used_by_is_internal() {
    let key = ResourceKey::new("default", ResourceKind::NetworkZone, ZONE);
    let record = ResourceRecord::from_create(
        1,
        RecordCreate {
            key: key.clone(),
            description: String::new(),
            config: Default::default(),
            instance: None,
        },
    )
    .unwrap();

    let mut mock = MockStore::<ResourceRecord>::new();
    mock.expect_get(key).return_ok(Some(record));
    mock.expect_scan().return_err(StoreError::Closed);

    let member = MemberConfig {
        name: "node1".into(),
        address: "127.0.0.1:8443".into(),
    };
    let state = Arc::new(DaemonState::new(
        DaemonConfig::new(member, vec![]),
        mock.client(),
        Arc::new(InMemoryRuntime::new()),
        Arc::new(LoopbackTransport::new()),
    ));

    let response = api::dispatch(&state, zone(Method::GET)).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.metadata().is_none());
    mock.verify();
}

#[tokio::test]
async fn test_unsupported_requests() {
    let cluster = LocalCluster::start(&["node1"]).unwrap();
    let node1 = cluster.daemon("node1").unwrap();

    let unknown = node1
        .handle(ApiRequest::new(Method::GET, "/1.0/storage-pools/default"))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let verb = node1
        .handle(ApiRequest::new(Method::DELETE, "/1.0/network-zones"))
        .await;
    assert_eq!(verb.status, StatusCode::NOT_IMPLEMENTED);

    cluster.shutdown().await.unwrap();
}
