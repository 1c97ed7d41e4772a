use super::kind::InstanceType;
use super::record::{Config, Devices, InstanceChange, ResourceRecord};
use serde::{Deserialize, Serialize};

/// Runtime status as reported by the instance runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Frozen,
    Error,
}

impl InstanceStatus {
    pub const fn code(&self) -> u16 {
        match self {
            InstanceStatus::Running => 103,
            InstanceStatus::Stopped => 102,
            InstanceStatus::Frozen => 110,
            InstanceStatus::Error => 400,
        }
    }
}

/// Basic public view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub instance_type: InstanceType,
    pub status: InstanceStatus,
    pub status_code: u16,
    pub location: String,
    pub architecture: String,
    pub config: Config,
    pub devices: Devices,
    pub profiles: Vec<String>,
    pub ephemeral: bool,
    pub project: String,
}

/// Full view: the basic view plus live state, snapshots and backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceFull {
    #[serde(flatten)]
    pub instance: Instance,
    pub state: InstanceState,
    pub snapshots: Vec<InstanceSnapshot>,
    pub backups: Vec<InstanceBackup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub status: InstanceStatus,
    pub status_code: u16,
    pub pid: i64,
    pub processes: i64,
    pub cpu_usage_ns: u64,
    pub memory_usage_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub name: String,
    /// Unix seconds.
    pub created_at: u64,
    pub stateful: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceBackup {
    pub name: String,
    /// Unix seconds.
    pub created_at: u64,
    pub expires_at: Option<u64>,
    pub instance_only: bool,
}

/// Client-editable instance fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstancePut {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub devices: Devices,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub ephemeral: bool,
}

impl InstancePut {
    pub fn change(&self) -> InstanceChange {
        InstanceChange {
            architecture: self.architecture.clone(),
            profiles: self.profiles.clone(),
            devices: self.devices.clone(),
            ephemeral: self.ephemeral,
        }
    }
}

impl From<&ResourceRecord> for InstancePut {
    fn from(record: &ResourceRecord) -> Self {
        let attrs = record.instance.as_ref();
        Self {
            description: record.description.clone(),
            architecture: attrs.map(|a| a.architecture.clone()).unwrap_or_default(),
            config: record.config.clone(),
            devices: attrs.map(|a| a.devices.clone()).unwrap_or_default(),
            profiles: attrs.map(|a| a.profiles.clone()).unwrap_or_default(),
            ephemeral: attrs.map(|a| a.ephemeral).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancesPost {
    pub name: String,
    #[serde(rename = "type", default)]
    pub instance_type: InstanceType,
    /// Hosting member; defaults to the member handling the create.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub devices: Devices,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub ephemeral: bool,
}

/// Networks an instance is attached to through `nic` devices.
pub fn attached_networks(devices: &Devices) -> impl Iterator<Item = &str> {
    devices
        .values()
        .filter(|device| device.get("type").map(String::as_str) == Some("nic"))
        .filter_map(|device| device.get("network").map(String::as_str))
}
