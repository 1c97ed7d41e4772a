//! Networks.
//!
//! A network references zones of its project and is referenced by instances attached to
//! it through `nic` devices. Changing a network changes the content of every zone it
//! references, so updates and deletes refresh those zones on each member.

use super::zone::refresh_served_project;
use super::{
    announce, check_dns_name, check_dns_name_list, check_keys, detached, wrong_put,
    ResourceDriver, ResourcePut,
};
use crate::cluster::PeerOperation;
use crate::error::ResourceError;
use crate::model::instance::attached_networks;
use crate::model::network::referenced_zones;
use crate::model::{
    ClientType, Config, Network, RecordUpdate, ResourceKey, ResourceKind, ResourceRecord,
};
use crate::render::to_metadata;
use crate::state::DaemonState;
use async_trait::async_trait;
use resource_store::StoredRecord;
use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

const KEYS: [&str; 7] = [
    "ipv4.address",
    "ipv6.address",
    "dns.domain",
    "dns.zone.forward",
    "dns.zone.reverse.ipv4",
    "dns.zone.reverse.ipv6",
    "bridge.mtu",
];

pub struct NetworkDriver {
    state: Arc<DaemonState>,
    record: ResourceRecord,
}

impl NetworkDriver {
    pub fn init(state: Arc<DaemonState>, record: ResourceRecord) -> Self {
        Self { state, record }
    }
}

/// Interface name: 1-15 chars of `[A-Za-z0-9_.-]`, not `.` or `..`.
pub fn validate_name(name: &str) -> Result<(), ResourceError> {
    let valid = (1..=15).contains(&name.len())
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(ResourceError::validation(format!(
            "{name:?} is not a valid network name"
        )))
    }
}

pub fn validate_config(config: &Config) -> Result<(), ResourceError> {
    check_keys(config, |key| KEYS.contains(&key))?;

    for (key, value) in config {
        match key.as_str() {
            "ipv4.address" => check_cidr::<Ipv4Addr>(key, value, 32)?,
            "ipv6.address" => check_cidr::<Ipv6Addr>(key, value, 128)?,
            "dns.zone.forward" => check_dns_name_list(value)?,
            "dns.domain" | "dns.zone.reverse.ipv4" | "dns.zone.reverse.ipv6"
                if !value.is_empty() =>
            {
                check_dns_name(value)?
            }
            "bridge.mtu" => {
                let mtu: u32 = value.parse().map_err(|_| {
                    ResourceError::validation(format!("bridge.mtu: {value:?} is not an integer"))
                })?;
                if !(1280..=16384).contains(&mtu) {
                    return Err(ResourceError::validation(format!(
                        "bridge.mtu: {mtu} is outside 1280-16384"
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// `addr/prefix`, or `none`/empty for no address.
fn check_cidr<A: FromStr>(key: &str, value: &str, max_prefix: u8) -> Result<(), ResourceError> {
    if value.is_empty() || value == "none" {
        return Ok(());
    }
    let valid = value.split_once('/').is_some_and(|(addr, prefix)| {
        addr.parse::<A>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= max_prefix)
    });
    if valid {
        Ok(())
    } else {
        Err(ResourceError::validation(format!(
            "{key}: {value:?} is not a valid CIDR address"
        )))
    }
}

/// Every zone `config` references must exist in `project`.
pub async fn check_zones_exist(
    state: &DaemonState,
    project: &str,
    config: &Config,
) -> Result<(), ResourceError> {
    for zone in referenced_zones(config) {
        let key = ResourceKey::new(project, ResourceKind::NetworkZone, zone.as_str());
        if state.store.get(key).await?.is_none() {
            return Err(ResourceError::validation(format!(
                "network zone {zone:?} does not exist in project {project:?}"
            )));
        }
    }
    Ok(())
}

/// Store keys of the zones `config` references, for the store to check on commit.
pub fn zone_keys(project: &str, config: &Config) -> Vec<ResourceKey> {
    referenced_zones(config)
        .into_iter()
        .map(|zone| ResourceKey::new(project, ResourceKind::NetworkZone, zone.as_str()))
        .collect()
}

/// Matches instances of `project` with a `nic` device on `network`.
fn attaches_network(
    project: &str,
    network: &str,
) -> impl Fn(&ResourceRecord) -> bool + Send + Sync + 'static {
    let project = project.to_string();
    let network = network.to_string();
    move |record: &ResourceRecord| {
        record.kind() == ResourceKind::Instance
            && record.project() == project
            && record.instance.as_ref().is_some_and(|attrs| {
                attached_networks(&attrs.devices).any(|attached| attached == network)
            })
    }
}

/// A peer deleted a network of `project`: every zone served for the project may have
/// carried its records.
pub async fn on_peer_delete(state: &DaemonState, project: &str) -> Result<(), ResourceError> {
    refresh_served_project(state, project, Vec::new()).await
}

#[async_trait]
impl ResourceDriver for NetworkDriver {
    fn info(&self) -> &ResourceRecord {
        &self.record
    }

    async fn used_by(&self) -> Result<Vec<String>, ResourceError> {
        let instances = self
            .state
            .store
            .scan(attaches_network(self.project(), self.name()))
            .await?;
        let mut used_by: Vec<String> = instances
            .iter()
            .map(|instance| format!("instance/{}", instance.name()))
            .collect();
        used_by.sort();
        Ok(used_by)
    }

    async fn render(&self) -> Result<Value, ResourceError> {
        let used_by = self.used_by().await?;
        to_metadata(&Network::from_record(&self.record, used_by))
    }

    #[instrument(skip(self, put), fields(project = %self.project(), name = %self.name()))]
    async fn update(
        &mut self,
        put: ResourcePut,
        client_type: ClientType,
    ) -> Result<(), ResourceError> {
        let put = match put {
            ResourcePut::Network(put) => put,
            other => return Err(wrong_put(self.kind(), &other)),
        };
        validate_config(&put.config)?;
        if client_type == ClientType::Notification {
            return self.refresh_local().await;
        }

        check_zones_exist(&self.state, self.project(), &put.config).await?;
        let requires = zone_keys(self.project(), &put.config);
        let body = ResourcePut::Network(put.clone()).to_body()?;
        let state = self.state.clone();
        let previous = self.record.clone();
        let (record, refreshed) = detached(async move {
            let record = state
                .store
                .update_referencing(
                    previous.key.clone(),
                    Some(previous.etag().clone()),
                    RecordUpdate::Put {
                        description: put.description,
                        config: put.config,
                        instance: None,
                    },
                    requires,
                )
                .await?;
            info!(etag = %record.etag(), "Network updated");

            let mut touched = referenced_zones(&previous.config);
            touched.extend(referenced_zones(&record.config));
            let refreshed = refresh_served_project(&state, record.project(), touched).await;
            announce(&state, &record, ClientType::Normal, PeerOperation::Update(body)).await;
            Ok::<_, ResourceError>((record, refreshed))
        })
        .await?;
        self.record = record;
        refreshed
    }

    #[instrument(skip(self), fields(project = %self.project(), name = %self.name()))]
    async fn delete(&self, client_type: ClientType) -> Result<(), ResourceError> {
        if client_type == ClientType::Notification {
            return on_peer_delete(&self.state, self.project()).await;
        }

        let state = self.state.clone();
        let record = self.record.clone();
        detached(async move {
            state
                .store
                .delete_unreferenced(
                    record.key.clone(),
                    Some(record.etag().clone()),
                    attaches_network(record.project(), record.name()),
                )
                .await?;
            info!("Network deleted");

            let refreshed = refresh_served_project(
                &state,
                record.project(),
                referenced_zones(&record.config),
            )
            .await;
            announce(&state, &record, ClientType::Normal, PeerOperation::Delete).await;
            refreshed
        })
        .await
    }

    async fn refresh_local(&self) -> Result<(), ResourceError> {
        refresh_served_project(
            &self.state,
            self.project(),
            referenced_zones(&self.record.config),
        )
        .await
    }
}
