//! The per-kind capability set.
//!
//! A [`ResourceDriver`] is an in-memory handle bound to one persisted record. The
//! registry picks the implementation from the record's stored kind; callers only ever see
//! `Box<dyn ResourceDriver>`.
//!
//! | Kind | Driver | Content | Propagates |
//! |------|--------|---------|------------|
//! | `network-zone` | [`ZoneDriver`] | zone file | yes |
//! | `network` | [`NetworkDriver`] | - | yes |
//! | `instance` | [`InstanceDriver`] | - | no, forwarded to its member instead |

pub mod instance;
pub mod network;
pub mod zone;

pub use instance::InstanceDriver;
pub use network::NetworkDriver;
pub use zone::ZoneDriver;

use crate::cluster::PeerOperation;
use crate::error::ResourceError;
use crate::model::{
    ClientType, Config, InstancePut, NetworkPut, NetworkZonePut, ResourceKind, ResourceRecord,
};
use crate::state::DaemonState;
use async_trait::async_trait;
use bytes::Bytes;
use resource_store::{Etag, StoredRecord};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, Instrument};

#[async_trait]
pub trait ResourceDriver: Send + Sync {
    fn id(&self) -> u64 {
        self.info().id
    }

    fn project(&self) -> &str {
        self.info().project()
    }

    fn name(&self) -> &str {
        self.info().name()
    }

    fn kind(&self) -> ResourceKind {
        self.info().kind()
    }

    /// The record this handle is bound to, as of the last load or update.
    fn info(&self) -> &ResourceRecord;

    fn etag(&self) -> &Etag {
        self.info().etag()
    }

    /// Identifiers (`kind/name`) of resources referencing this one, sorted.
    ///
    /// A failed lookup is an error, never an empty list.
    async fn used_by(&self) -> Result<Vec<String>, ResourceError>;

    /// Generated artifact, built fresh on every call.
    async fn content(&self) -> Result<String, ResourceError> {
        Err(ResourceError::NotImplemented(format!(
            "{} has no generated content",
            self.kind()
        )))
    }

    async fn render(&self) -> Result<Value, ResourceError>;

    /// Defaults to the basic view for kinds with nothing to aggregate.
    async fn render_full(&self) -> Result<Value, ResourceError> {
        self.render().await
    }

    /// Apply `put`.
    ///
    /// `Normal`: validate, persist against the loaded etag, refresh local state, then
    /// announce to peers. `Notification`: validate and refresh local state only.
    async fn update(
        &mut self,
        put: ResourcePut,
        client_type: ClientType,
    ) -> Result<(), ResourceError>;

    /// Fails with `Conflict` while [`used_by`](Self::used_by) is non-empty.
    async fn delete(&self, client_type: ClientType) -> Result<(), ResourceError>;

    /// Rebuild node-local state derived from this resource.
    async fn refresh_local(&self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Client-editable state of any kind, as carried by PUT and PATCH bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePut {
    Zone(NetworkZonePut),
    Network(NetworkPut),
    Instance(InstancePut),
}

impl ResourcePut {
    /// Decode a request body. Malformed bodies and unknown fields are validation errors.
    pub fn parse(kind: ResourceKind, body: &[u8]) -> Result<Self, ResourceError> {
        let body = if body.is_empty() { b"{}".as_slice() } else { body };
        let put = match kind {
            ResourceKind::NetworkZone => serde_json::from_slice(body).map(ResourcePut::Zone),
            ResourceKind::Network => serde_json::from_slice(body).map(ResourcePut::Network),
            ResourceKind::Instance => serde_json::from_slice(body).map(ResourcePut::Instance),
        };
        put.map_err(|err| ResourceError::validation(format!("invalid body: {err}")))
    }

    /// Current client-editable state of a record.
    pub fn current(record: &ResourceRecord) -> Self {
        match record.kind() {
            ResourceKind::NetworkZone => ResourcePut::Zone(record.into()),
            ResourceKind::Network => ResourcePut::Network(record.into()),
            ResourceKind::Instance => ResourcePut::Instance(record.into()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourcePut::Zone(_) => ResourceKind::NetworkZone,
            ResourcePut::Network(_) => ResourceKind::Network,
            ResourcePut::Instance(_) => ResourceKind::Instance,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ResourcePut::Zone(put) => &put.description,
            ResourcePut::Network(put) => &put.description,
            ResourcePut::Instance(put) => &put.description,
        }
    }

    pub fn config(&self) -> &Config {
        match self {
            ResourcePut::Zone(put) => &put.config,
            ResourcePut::Network(put) => &put.config,
            ResourcePut::Instance(put) => &put.config,
        }
    }

    fn parts_mut(&mut self) -> (&mut String, &mut Config) {
        match self {
            ResourcePut::Zone(put) => (&mut put.description, &mut put.config),
            ResourcePut::Network(put) => (&mut put.description, &mut put.config),
            ResourcePut::Instance(put) => (&mut put.description, &mut put.config),
        }
    }

    /// PATCH semantics: a non-empty description replaces the current one, config keys
    /// are set individually and an empty value removes the key. For instances, devices
    /// are merged by name and a non-empty profile list replaces the current one.
    pub fn merge(&mut self, patch: ResourcePut) -> Result<(), ResourceError> {
        if patch.kind() != self.kind() {
            return Err(ResourceError::Internal(format!(
                "cannot merge {} patch into {}",
                patch.kind(),
                self.kind()
            )));
        }

        if let (ResourcePut::Instance(current), ResourcePut::Instance(patch)) =
            (&mut *self, &patch)
        {
            for (device, settings) in &patch.devices {
                if settings.is_empty() {
                    current.devices.remove(device);
                } else {
                    current.devices.insert(device.clone(), settings.clone());
                }
            }
            if !patch.profiles.is_empty() {
                current.profiles = patch.profiles.clone();
            }
            if !patch.architecture.is_empty() {
                current.architecture = patch.architecture.clone();
            }
        }

        let (description, config) = self.parts_mut();
        if !patch.description().is_empty() {
            *description = patch.description().to_string();
        }
        for (key, value) in patch.config() {
            if value.is_empty() {
                config.remove(key);
            } else {
                config.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    pub fn to_body(&self) -> Result<Bytes, ResourceError> {
        let body = match self {
            ResourcePut::Zone(put) => serde_json::to_vec(put)?,
            ResourcePut::Network(put) => serde_json::to_vec(put)?,
            ResourcePut::Instance(put) => serde_json::to_vec(put)?,
        };
        Ok(Bytes::from(body))
    }
}

pub(crate) fn wrong_put(kind: ResourceKind, put: &ResourcePut) -> ResourceError {
    ResourceError::Internal(format!("{} update applied to {kind}", put.kind()))
}

/// Run `work` on its own task and wait for its result.
///
/// A store commit and everything that must follow it (local refresh, announcement) go
/// through here, so they run to completion even if the request future is dropped.
pub(crate) async fn detached<T, F>(work: F) -> Result<T, ResourceError>
where
    F: Future<Output = Result<T, ResourceError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work.in_current_span())
        .await
        .map_err(|err| ResourceError::Internal(format!("commit task failed: {err}")))?
}

/// Announce a committed change to the peers, if the kind and origin call for it.
pub(crate) async fn announce(
    state: &DaemonState,
    record: &ResourceRecord,
    client_type: ClientType,
    operation: PeerOperation,
) {
    let kind = record.kind();
    if client_type != ClientType::Normal || !kind.propagates() {
        debug!(%kind, name = record.name(), %client_type, "Not propagating");
        return;
    }
    state
        .propagator
        .propagate(kind, record.project(), record.name(), operation)
        .await;
}

/// Reject config keys outside the allowed set. `user.*` keys are always allowed.
pub(crate) fn check_keys(
    config: &Config,
    known: impl Fn(&str) -> bool,
) -> Result<(), ResourceError> {
    for key in config.keys() {
        if key.starts_with("user.") || known(key) {
            continue;
        }
        return Err(ResourceError::validation(format!("unknown config key {key:?}")));
    }
    Ok(())
}

pub(crate) fn check_bool(key: &str, value: &str) -> Result<(), ResourceError> {
    match value {
        "true" | "false" | "" => Ok(()),
        _ => Err(ResourceError::validation(format!(
            "{key}: {value:?} is not a boolean"
        ))),
    }
}

/// Comma separated DNS names. Empty items are ignored.
pub(crate) fn check_dns_name_list(value: &str) -> Result<(), ResourceError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .try_for_each(check_dns_name)
}

/// DNS name: dot separated labels of 1-63 `[a-z0-9-]` chars, no leading or trailing
/// hyphen, at most 253 chars, optional trailing dot.
pub(crate) fn check_dns_name(name: &str) -> Result<(), ResourceError> {
    let bare = name.strip_suffix('.').unwrap_or(name);
    if bare.is_empty() || bare.len() > 253 {
        return Err(ResourceError::validation(format!(
            "{name:?} is not a valid DNS name"
        )));
    }
    for label in bare.split('.') {
        let valid = (1..=63).contains(&label.len())
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !valid {
            return Err(ResourceError::validation(format!(
                "{name:?} is not a valid DNS name: bad label {label:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let err =
            ResourcePut::parse(ResourceKind::NetworkZone, br#"{"colour":"blue"}"#).unwrap_err();
        assert!(matches!(err, ResourceError::Validation(_)));

        let put = ResourcePut::parse(ResourceKind::Network, b"").unwrap();
        assert_eq!(put, ResourcePut::Network(NetworkPut::default()));
    }

    #[test]
    fn test_merge_sets_and_removes_keys() {
        let mut current = ResourcePut::Zone(NetworkZonePut {
            description: "primary".into(),
            config: [("dns.nameservers", "ns1.example.com."), ("user.owner", "ops")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        let patch = ResourcePut::parse(
            ResourceKind::NetworkZone,
            br#"{"config":{"user.owner":"","network.nat":"true"}}"#,
        )
        .unwrap();

        current.merge(patch).unwrap();
        assert_eq!(current.description(), "primary");
        assert_eq!(current.config().get("network.nat").map(String::as_str), Some("true"));
        assert!(!current.config().contains_key("user.owner"));
        assert!(current.config().contains_key("dns.nameservers"));
    }

    #[test]
    fn test_merge_rejects_other_kind() {
        let mut current = ResourcePut::Zone(NetworkZonePut::default());
        assert!(current.merge(ResourcePut::Network(NetworkPut::default())).is_err());
    }

    #[test]
    fn test_check_dns_name() {
        for name in ["example.com.", "example.com", "a-b.c1", "0.10.in-addr.arpa."] {
            assert!(check_dns_name(name).is_ok(), "{name}");
        }
        let long_label = "a".repeat(64);
        for name in ["", ".", "-a.com", "a-.com", "Example.com", "a..b", long_label.as_str()] {
            assert!(check_dns_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_check_keys_allows_user_namespace() {
        let config: Config = [("user.anything", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(check_keys(&config, |_| false).is_ok());

        let config: Config = [("bogus", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(check_keys(&config, |_| false).is_err());
    }
}
