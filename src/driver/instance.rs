//! Instances.
//!
//! Instances are node-affine: requests for them are forwarded to the member hosting them
//! rather than propagated, so by the time a driver is bound the local member is the owner
//! and the runtime it consults is the one actually running the instance.

use super::{check_bool, check_keys, detached, wrong_put, ResourceDriver, ResourcePut};
use crate::error::ResourceError;
use crate::model::instance::attached_networks;
use crate::model::{
    ClientType, Config, Devices, Instance, InstanceFull, RecordUpdate, ResourceKey, ResourceKind,
    ResourceRecord,
};
use crate::render::to_metadata;
use crate::state::DaemonState;
use async_trait::async_trait;
use resource_store::StoredRecord;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

const KEYS: [&str; 5] = [
    "limits.cpu",
    "limits.memory",
    "boot.autostart",
    "security.privileged",
    "security.nesting",
];

const MEMORY_SUFFIXES: [&str; 10] = ["KiB", "MiB", "GiB", "TiB", "kB", "MB", "GB", "TB", "B", "%"];

pub struct InstanceDriver {
    state: Arc<DaemonState>,
    record: ResourceRecord,
}

impl InstanceDriver {
    pub fn init(state: Arc<DaemonState>, record: ResourceRecord) -> Self {
        Self { state, record }
    }

    fn key(&self) -> &ResourceKey {
        &self.record.key
    }

    async fn view(&self) -> Result<Instance, ResourceError> {
        let attrs = self.record.instance.as_ref().ok_or_else(|| {
            ResourceError::Internal(format!("{} has no instance attributes", self.key()))
        })?;
        let status = self.state.runtime.status(self.key()).await?;
        Ok(Instance {
            name: self.record.name().to_string(),
            description: self.record.description.clone(),
            instance_type: attrs.instance_type,
            status,
            status_code: status.code(),
            location: attrs.location.clone(),
            architecture: attrs.architecture.clone(),
            config: self.record.config.clone(),
            devices: attrs.devices.clone(),
            profiles: attrs.profiles.clone(),
            ephemeral: attrs.ephemeral,
            project: self.record.project().to_string(),
        })
    }
}

/// 1-63 chars of `[A-Za-z0-9-]`, starting with a letter and not ending with a hyphen.
pub fn validate_name(name: &str) -> Result<(), ResourceError> {
    let valid = (1..=63).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && !name.ends_with('-')
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ResourceError::validation(format!(
            "{name:?} is not a valid instance name"
        )))
    }
}

pub fn validate_config(config: &Config) -> Result<(), ResourceError> {
    check_keys(config, |key| KEYS.contains(&key))?;

    for (key, value) in config {
        match key.as_str() {
            "limits.cpu" => {
                if !value.parse::<u32>().is_ok_and(|cpus| cpus > 0) {
                    return Err(ResourceError::validation(format!(
                        "limits.cpu: {value:?} is not a positive integer"
                    )));
                }
            }
            "limits.memory" => {
                let amount = MEMORY_SUFFIXES
                    .iter()
                    .find_map(|suffix| value.strip_suffix(suffix))
                    .unwrap_or(value);
                if amount.parse::<u64>().is_err() {
                    return Err(ResourceError::validation(format!(
                        "limits.memory: {value:?} is not a size"
                    )));
                }
            }
            "boot.autostart" | "security.privileged" | "security.nesting" => {
                check_bool(key, value)?
            }
            _ => {}
        }
    }
    Ok(())
}

/// Every device needs a type; `nic` devices must name a network of the project.
pub async fn validate_devices(
    state: &DaemonState,
    project: &str,
    devices: &Devices,
) -> Result<(), ResourceError> {
    for (name, device) in devices {
        if device.get("type").map_or(true, String::is_empty) {
            return Err(ResourceError::validation(format!(
                "device {name:?} has no type"
            )));
        }
    }
    for network in attached_networks(devices) {
        let key = ResourceKey::new(project, ResourceKind::Network, network);
        if state.store.get(key).await?.is_none() {
            return Err(ResourceError::validation(format!(
                "network {network:?} does not exist in project {project:?}"
            )));
        }
    }
    Ok(())
}

/// Store keys of the networks `devices` attach to, for the store to check on commit.
pub fn network_keys(project: &str, devices: &Devices) -> Vec<ResourceKey> {
    attached_networks(devices)
        .map(|network| ResourceKey::new(project, ResourceKind::Network, network))
        .collect()
}

#[async_trait]
impl ResourceDriver for InstanceDriver {
    fn info(&self) -> &ResourceRecord {
        &self.record
    }

    async fn used_by(&self) -> Result<Vec<String>, ResourceError> {
        Ok(Vec::new())
    }

    async fn render(&self) -> Result<Value, ResourceError> {
        to_metadata(&self.view().await?)
    }

    /// All four lookups run concurrently; the first failure fails the whole view.
    async fn render_full(&self) -> Result<Value, ResourceError> {
        let runtime = &self.state.runtime;
        let (instance, state, snapshots, backups) = tokio::try_join!(
            self.view(),
            runtime.state(self.key()),
            runtime.snapshots(self.key()),
            runtime.backups(self.key()),
        )?;
        to_metadata(&InstanceFull {
            instance,
            state,
            snapshots,
            backups,
        })
    }

    #[instrument(skip(self, put), fields(project = %self.project(), name = %self.name()))]
    async fn update(
        &mut self,
        put: ResourcePut,
        client_type: ClientType,
    ) -> Result<(), ResourceError> {
        let put = match put {
            ResourcePut::Instance(put) => put,
            other => return Err(wrong_put(self.kind(), &other)),
        };
        validate_config(&put.config)?;
        if client_type == ClientType::Notification {
            return Ok(());
        }

        validate_devices(&self.state, self.project(), &put.devices).await?;
        self.record = self
            .state
            .store
            .update_referencing(
                self.record.key.clone(),
                Some(self.record.etag().clone()),
                RecordUpdate::Put {
                    description: put.description.clone(),
                    config: put.config.clone(),
                    instance: Some(put.change()),
                },
                network_keys(self.project(), &put.devices),
            )
            .await?;
        info!(etag = %self.record.etag(), "Instance updated");
        Ok(())
    }

    #[instrument(skip(self), fields(project = %self.project(), name = %self.name()))]
    async fn delete(&self, client_type: ClientType) -> Result<(), ResourceError> {
        if client_type == ClientType::Notification {
            return Ok(());
        }
        let state = self.state.clone();
        let key = self.record.key.clone();
        let expected = self.record.etag().clone();
        detached(async move {
            state.store.delete(key.clone(), Some(expected)).await?;
            state.runtime.forget(&key).await;
            info!("Instance deleted");
            Ok::<_, ResourceError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_name() {
        for name in ["web1", "a", "db-primary"] {
            assert!(validate_name(name).is_ok(), "{name}");
        }
        for name in ["", "1web", "-web", "web-", "web_1", "web.1"] {
            assert!(validate_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&config(&[
            ("limits.cpu", "2"),
            ("limits.memory", "512MiB"),
            ("boot.autostart", "true"),
            ("security.nesting", "false"),
        ]))
        .is_ok());

        for bad in [
            config(&[("limits.cpu", "0")]),
            config(&[("limits.memory", "lots")]),
            config(&[("security.privileged", "maybe")]),
            config(&[("raw.lxc", "lxc.aa_profile=unconfined")]),
        ] {
            assert!(
                matches!(validate_config(&bad), Err(ResourceError::Validation(_))),
                "{bad:?}"
            );
        }
    }
}
