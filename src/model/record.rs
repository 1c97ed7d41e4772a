//! The persisted form of every resource.
//!
//! One record type covers all kinds; [`ResourceKey::kind`] is the stored discriminator the
//! registry dispatches on. Kind-specific persisted fields (only instances have any) ride
//! in [`InstanceAttrs`].

use super::kind::{InstanceType, ResourceKind};
use resource_store::{Etag, StoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

pub type Config = BTreeMap<String, String>;
pub type Devices = BTreeMap<String, BTreeMap<String, String>>;

/// Unique address of a resource: its name is unique within (project, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub project: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(project: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            kind,
            name: name.into(),
        }
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.project, self.name)
    }
}

/// Persisted fields only instances carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAttrs {
    pub instance_type: InstanceType,
    pub architecture: String,
    /// Member currently hosting the instance.
    pub location: String,
    pub profiles: Vec<String>,
    pub devices: Devices,
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub id: u64,
    pub key: ResourceKey,
    pub description: String,
    pub config: Config,
    pub instance: Option<InstanceAttrs>,
    etag: Etag,
}

impl ResourceRecord {
    pub fn project(&self) -> &str {
        &self.key.project
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.key.kind
    }

    /// Hosting member of a node-affine record.
    pub fn location(&self) -> Option<&str> {
        self.instance.as_ref().map(|attrs| attrs.location.as_str())
    }

    /// Fingerprint over exactly the fields clients can read and change.
    ///
    /// Location is excluded: it changes when an instance moves, not when a client edits it.
    fn fingerprint(
        key: &ResourceKey,
        description: &str,
        config: &Config,
        instance: Option<&InstanceAttrs>,
    ) -> Result<Etag, serde_json::Error> {
        match instance {
            Some(attrs) => Etag::compute(&(
                &key.name,
                description,
                &attrs.architecture,
                attrs.ephemeral,
                &attrs.profiles,
                config,
                &attrs.devices,
            )),
            None => Etag::compute(&(&key.name, description, config)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordCreate {
    pub key: ResourceKey,
    pub description: String,
    pub config: Config,
    pub instance: Option<InstanceAttrs>,
}

/// Client-editable instance fields.
#[derive(Debug, Clone)]
pub struct InstanceChange {
    pub architecture: String,
    pub profiles: Vec<String>,
    pub devices: Devices,
    pub ephemeral: bool,
}

#[derive(Debug, Clone)]
pub enum RecordUpdate {
    /// Replace the client-editable fields.
    Put {
        description: String,
        config: Config,
        instance: Option<InstanceChange>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{0}: instance attributes required")]
    MissingInstanceAttrs(ResourceKey),
    #[error("{0}: only instances carry instance attributes")]
    UnexpectedInstanceAttrs(ResourceKey),
    #[error("fingerprint: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl StoredRecord for ResourceRecord {
    type Key = ResourceKey;
    type Create = RecordCreate;
    type Update = RecordUpdate;
    type Error = RecordError;

    fn from_create(id: u64, params: RecordCreate) -> Result<Self, RecordError> {
        match (params.key.kind, &params.instance) {
            (ResourceKind::Instance, None) => {
                return Err(RecordError::MissingInstanceAttrs(params.key))
            }
            (ResourceKind::NetworkZone | ResourceKind::Network, Some(_)) => {
                return Err(RecordError::UnexpectedInstanceAttrs(params.key))
            }
            _ => {}
        }
        let etag = Self::fingerprint(
            &params.key,
            &params.description,
            &params.config,
            params.instance.as_ref(),
        )?;
        Ok(Self {
            id,
            key: params.key,
            description: params.description,
            config: params.config,
            instance: params.instance,
            etag,
        })
    }

    fn key(&self) -> ResourceKey {
        self.key.clone()
    }

    fn etag(&self) -> &Etag {
        &self.etag
    }

    fn apply_update(&mut self, update: RecordUpdate) -> Result<(), RecordError> {
        match update {
            RecordUpdate::Put {
                description,
                config,
                instance,
            } => {
                match (self.instance.as_mut(), instance) {
                    (Some(attrs), Some(change)) => {
                        // An empty architecture keeps the current one.
                        if !change.architecture.is_empty() {
                            attrs.architecture = change.architecture;
                        }
                        attrs.profiles = change.profiles;
                        attrs.devices = change.devices;
                        attrs.ephemeral = change.ephemeral;
                    }
                    (None, Some(_)) => {
                        return Err(RecordError::UnexpectedInstanceAttrs(self.key.clone()))
                    }
                    _ => {}
                }
                self.description = description;
                self.config = config;
            }
        }
        self.etag = Self::fingerprint(
            &self.key,
            &self.description,
            &self.config,
            self.instance.as_ref(),
        )?;
        Ok(())
    }
}
