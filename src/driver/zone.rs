//! DNS zones.
//!
//! A zone is referenced by networks through their `dns.zone.*` keys; those references are
//! its `used_by` and block deletion. Its content is a zone file generated from its own
//! config and the gateway addresses of the networks using it for forward records.

use super::{
    announce, check_bool, check_dns_name, check_dns_name_list, check_keys, detached, wrong_put,
    ResourceDriver, ResourcePut,
};
use crate::cluster::PeerOperation;
use crate::error::ResourceError;
use crate::model::network::{gateway, referenced_zones};
use crate::model::{
    ClientType, Config, NetworkZone, RecordUpdate, ResourceKey, ResourceKind, ResourceRecord,
};
use crate::render::to_metadata;
use crate::served::ServedZone;
use crate::state::DaemonState;
use async_trait::async_trait;
use resource_store::{Etag, StoredRecord};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, instrument};

const DEFAULT_TTL: u32 = 300;

pub struct ZoneDriver {
    state: Arc<DaemonState>,
    record: ResourceRecord,
}

impl ZoneDriver {
    pub fn init(state: Arc<DaemonState>, record: ResourceRecord) -> Self {
        Self { state, record }
    }
}

pub fn validate_name(name: &str) -> Result<(), ResourceError> {
    check_dns_name(name)
}

pub fn validate_config(config: &Config) -> Result<(), ResourceError> {
    check_keys(config, |key| {
        matches!(key, "dns.nameservers" | "network.nat") || peer_key(key).is_some()
    })?;

    for (key, value) in config {
        match key.as_str() {
            "dns.nameservers" => check_dns_name_list(value)?,
            "network.nat" => check_bool(key, value)?,
            _ => match peer_key(key) {
                Some((_, "address")) => {
                    value.parse::<IpAddr>().map_err(|_| {
                        ResourceError::validation(format!("{key}: {value:?} is not an IP address"))
                    })?;
                }
                Some((_, "key")) if value.is_empty() => {
                    return Err(ResourceError::validation(format!("{key} must not be empty")));
                }
                _ => {}
            },
        }
    }
    Ok(())
}

/// `peers.<name>.address` or `peers.<name>.key`, split into `(name, field)`.
fn peer_key(key: &str) -> Option<(&str, &str)> {
    let (peer, field) = key.strip_prefix("peers.")?.rsplit_once('.')?;
    (!peer.is_empty() && matches!(field, "address" | "key")).then_some((peer, field))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Matches networks of `project` referencing `zone` through any `dns.zone.*` key.
fn references_zone(
    project: &str,
    zone: &str,
) -> impl Fn(&ResourceRecord) -> bool + Send + Sync + 'static {
    let project = project.to_string();
    let zone = zone.to_string();
    move |record: &ResourceRecord| {
        record.kind() == ResourceKind::Network
            && record.project() == project
            && referenced_zones(&record.config).contains(&zone)
    }
}

/// Networks of `project` referencing `zone`, by name.
pub async fn referencing_networks(
    state: &DaemonState,
    project: &str,
    zone: &str,
) -> Result<Vec<ResourceRecord>, ResourceError> {
    let mut networks = state.store.scan(references_zone(project, zone)).await?;
    networks.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(networks)
}

/// Zone file for `zone`. Only networks listing the zone in `dns.zone.forward` contribute
/// gateway records.
pub fn zone_file(zone: &ResourceRecord, networks: &[ResourceRecord]) -> String {
    let origin = fqdn(zone.name());
    let nameservers: Vec<String> = zone
        .config
        .get("dns.nameservers")
        .map(|value| split_list(value).map(fqdn).collect())
        .unwrap_or_default();
    let primary = nameservers.first().cloned().unwrap_or_else(|| origin.clone());

    let mut out = String::new();
    let _ = writeln!(out, "$ORIGIN {origin}");
    let _ = writeln!(out, "$TTL {DEFAULT_TTL}");
    let _ = writeln!(
        out,
        "@ IN SOA {primary} hostmaster.{origin} {} 120 60 86400 30",
        serial(zone.etag())
    );
    for server in &nameservers {
        let _ = writeln!(out, "@ IN NS {server}");
    }

    for network in networks {
        let forward = network
            .config
            .get("dns.zone.forward")
            .is_some_and(|value| split_list(value).any(|z| fqdn(z) == origin));
        if !forward {
            continue;
        }
        for key in ["ipv4.address", "ipv6.address"] {
            match gateway(&network.config, key) {
                Some(IpAddr::V4(addr)) => {
                    let _ = writeln!(out, "{}.gw IN A {addr}", network.name());
                }
                Some(IpAddr::V6(addr)) => {
                    let _ = writeln!(out, "{}.gw IN AAAA {addr}", network.name());
                }
                None => {}
            }
        }
    }
    out
}

/// SOA serial: the leading 32 bits of the etag.
fn serial(etag: &Etag) -> u32 {
    etag.as_str()
        .get(..8)
        .and_then(|prefix| u32::from_str_radix(prefix, 16).ok())
        .unwrap_or(1)
}

/// Regenerate the served copy of one zone, or drop it if the zone no longer exists.
pub async fn refresh_served(
    state: &DaemonState,
    project: &str,
    zone: &str,
) -> Result<(), ResourceError> {
    let key = ResourceKey::new(project, ResourceKind::NetworkZone, zone);
    match state.store.get(key).await? {
        Some(record) => {
            let networks = referencing_networks(state, project, zone).await?;
            state.served.insert(
                project,
                zone,
                ServedZone {
                    etag: record.etag().clone(),
                    content: zone_file(&record, &networks),
                },
            );
        }
        None => {
            state.served.evict(project, zone);
        }
    }
    Ok(())
}

/// Refresh `zones` plus every zone of `project` already served by this member.
pub async fn refresh_served_project(
    state: &DaemonState,
    project: &str,
    zones: impl IntoIterator<Item = String>,
) -> Result<(), ResourceError> {
    let all: BTreeSet<String> = state
        .served
        .names(project)
        .into_iter()
        .chain(zones)
        .collect();
    for zone in all {
        refresh_served(state, project, &zone).await?;
    }
    Ok(())
}

/// A peer deleted the zone: stop serving it.
pub fn on_peer_delete(state: &DaemonState, project: &str, name: &str) {
    if state.served.evict(project, name) {
        info!(project, name, "Stopped serving zone");
    }
}

#[async_trait]
impl ResourceDriver for ZoneDriver {
    fn info(&self) -> &ResourceRecord {
        &self.record
    }

    async fn used_by(&self) -> Result<Vec<String>, ResourceError> {
        let networks = referencing_networks(&self.state, self.project(), self.name()).await?;
        Ok(networks
            .iter()
            .map(|network| format!("network/{}", network.name()))
            .collect())
    }

    async fn content(&self) -> Result<String, ResourceError> {
        let networks = referencing_networks(&self.state, self.project(), self.name()).await?;
        Ok(zone_file(&self.record, &networks))
    }

    async fn render(&self) -> Result<Value, ResourceError> {
        let used_by = self.used_by().await?;
        to_metadata(&NetworkZone::from_record(&self.record, used_by))
    }

    #[instrument(skip(self, put), fields(project = %self.project(), name = %self.name()))]
    async fn update(
        &mut self,
        put: ResourcePut,
        client_type: ClientType,
    ) -> Result<(), ResourceError> {
        let put = match put {
            ResourcePut::Zone(put) => put,
            other => return Err(wrong_put(self.kind(), &other)),
        };
        validate_config(&put.config)?;
        if client_type == ClientType::Notification {
            return self.refresh_local().await;
        }

        let body = ResourcePut::Zone(put.clone()).to_body()?;
        let state = self.state.clone();
        let key = self.record.key.clone();
        let expected = self.record.etag().clone();
        let (record, refreshed) = detached(async move {
            let record = state
                .store
                .update(
                    key,
                    Some(expected),
                    RecordUpdate::Put {
                        description: put.description,
                        config: put.config,
                        instance: None,
                    },
                )
                .await?;
            info!(etag = %record.etag(), "Zone updated");

            // The change is committed: peers are told even if the local refresh fails.
            let driver = ZoneDriver::init(state.clone(), record);
            let refreshed = driver.refresh_local().await;
            announce(&state, &driver.record, ClientType::Normal, PeerOperation::Update(body)).await;
            Ok::<_, ResourceError>((driver.record, refreshed))
        })
        .await?;
        self.record = record;
        refreshed
    }

    /// The in-use check runs inside the store delete, so a network created concurrently
    /// either lands first and blocks the delete or fails for lack of the zone.
    #[instrument(skip(self), fields(project = %self.project(), name = %self.name()))]
    async fn delete(&self, client_type: ClientType) -> Result<(), ResourceError> {
        if client_type == ClientType::Notification {
            on_peer_delete(&self.state, self.project(), self.name());
            return Ok(());
        }

        let state = self.state.clone();
        let record = self.record.clone();
        detached(async move {
            state
                .store
                .delete_unreferenced(
                    record.key.clone(),
                    Some(record.etag().clone()),
                    references_zone(record.project(), record.name()),
                )
                .await?;
            state.served.evict(record.project(), record.name());
            info!("Zone deleted");

            announce(&state, &record, ClientType::Normal, PeerOperation::Delete).await;
            Ok::<_, ResourceError>(())
        })
        .await
    }

    async fn refresh_local(&self) -> Result<(), ResourceError> {
        let content = self.content().await?;
        self.state.served.insert(
            self.project(),
            self.name(),
            ServedZone {
                etag: self.record.etag().clone(),
                content,
            },
        );
        Ok(())
    }
}
