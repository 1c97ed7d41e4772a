//! # fleetd demo
//!
//! Starts a three-member cluster in one process and walks through the behaviors of the
//! resource layer:
//!
//! 1. An instance hosted on `node2` is read through `node1` and the request is forwarded.
//! 2. A network zone is updated on `node1` and each peer receives exactly one notification.
//! 3. A zone in use by a network cannot be deleted until the network lets go of it.

use fleetd::api::ApiRequest;
use fleetd::lifecycle::tracing::setup_tracing;
use fleetd::lifecycle::LocalCluster;
use fleetd::model::{ClientType, InstanceStatus, ResourceKey, ResourceKind};
use http::{Method, StatusCode};
use serde_json::json;
use tracing::{info, Instrument};

const ZONE: &str = "fleet.example.org";

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting three-member cluster");
    let cluster =
        LocalCluster::start(&["node1", "node2", "node3"]).map_err(|e| e.to_string())?;
    let node1 = cluster.daemon("node1").ok_or("node1 missing")?;

    let span = tracing::info_span!("forwarding");
    async {
        let create = ApiRequest::new(Method::POST, "/1.0/instances")
            .with_json(&json!({ "name": "web1", "type": "container", "location": "node2" }))
            .map_err(|e| e.to_string())?;
        expect(node1.handle(create).await.status, StatusCode::OK, "create web1")?;

        let key = ResourceKey::new("default", ResourceKind::Instance, "web1");
        cluster
            .runtime("node2")
            .ok_or("node2 runtime missing")?
            .set_status(&key, InstanceStatus::Running);

        let response = node1
            .handle(ApiRequest::for_resource(Method::GET, ResourceKind::Instance, "web1"))
            .await;
        expect(response.status, StatusCode::OK, "get web1")?;
        let status = response
            .metadata()
            .and_then(|metadata| metadata.get("status").cloned())
            .unwrap_or_default();
        info!(%status, "web1 read through node1");
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    let span = tracing::info_span!("propagation");
    async {
        let create = ApiRequest::new(Method::POST, "/1.0/network-zones")
            .with_json(&json!({ "name": ZONE, "config": { "dns.nameservers": "ns1.example.org" } }))
            .map_err(|e| e.to_string())?;
        expect(node1.handle(create).await.status, StatusCode::OK, "create zone")?;

        cluster.transport().clear_calls();
        let update = ApiRequest::for_resource(Method::PUT, ResourceKind::NetworkZone, ZONE)
            .with_json(&json!({ "description": "fleet zone", "config": { "dns.nameservers": "ns1.example.org,ns2.example.org" } }))
            .map_err(|e| e.to_string())?;
        expect(node1.handle(update).await.status, StatusCode::OK, "update zone")?;

        let notifications = cluster
            .transport()
            .calls()
            .into_iter()
            .filter(|call| call.client_type == ClientType::Notification)
            .count();
        info!(notifications, "Zone update propagated");
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    let span = tracing::info_span!("in_use");
    async {
        let create = ApiRequest::new(Method::POST, "/1.0/networks")
            .with_json(&json!({ "name": "lan0", "config": { "ipv4.address": "10.0.0.1/24", "dns.zone.forward": ZONE } }))
            .map_err(|e| e.to_string())?;
        expect(node1.handle(create).await.status, StatusCode::OK, "create lan0")?;

        let delete = ApiRequest::for_resource(Method::DELETE, ResourceKind::NetworkZone, ZONE);
        expect(node1.handle(delete.clone()).await.status, StatusCode::CONFLICT, "delete zone in use")?;
        info!("Zone delete refused while lan0 uses it");

        let release = ApiRequest::for_resource(Method::PATCH, ResourceKind::Network, "lan0")
            .with_json(&json!({ "config": { "dns.zone.forward": "" } }))
            .map_err(|e| e.to_string())?;
        expect(node1.handle(release).await.status, StatusCode::OK, "release zone")?;

        expect(node1.handle(delete).await.status, StatusCode::OK, "delete zone")?;
        let get = ApiRequest::for_resource(Method::GET, ResourceKind::NetworkZone, ZONE);
        expect(node1.handle(get).await.status, StatusCode::NOT_FOUND, "get deleted zone")?;
        info!("Zone deleted");
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    cluster.shutdown().await?;
    info!("Demo complete");
    Ok(())
}

fn expect(actual: StatusCode, wanted: StatusCode, step: &str) -> Result<(), String> {
    if actual == wanted {
        Ok(())
    } else {
        Err(format!("{step}: expected {wanted}, got {actual}"))
    }
}
