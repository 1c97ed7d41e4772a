use super::record::{Config, ResourceRecord};
use serde::{Deserialize, Serialize};

/// Public view of a DNS zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkZone {
    pub name: String,
    pub description: String,
    pub config: Config,
    pub used_by: Vec<String>,
    pub project: String,
}

impl NetworkZone {
    pub fn from_record(record: &ResourceRecord, used_by: Vec<String>) -> Self {
        Self {
            name: record.name().to_string(),
            description: record.description.clone(),
            config: record.config.clone(),
            used_by,
            project: record.project().to_string(),
        }
    }
}

/// Client-editable zone fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkZonePut {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Config,
}

impl From<&ResourceRecord> for NetworkZonePut {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            description: record.description.clone(),
            config: record.config.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkZonesPost {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Config,
}

impl NetworkZonesPost {
    pub fn put(&self) -> NetworkZonePut {
        NetworkZonePut {
            description: self.description.clone(),
            config: self.config.clone(),
        }
    }
}
