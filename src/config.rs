//! Daemon configuration
//!
//! Loaded from a TOML file with serde defaults, then adjusted by environment overrides:
//!
//! ```toml
//! forward_timeout_ms = 10000
//! propagation_timeout_ms = 5000
//!
//! [member]
//! name = "node1"
//! address = "10.0.0.11:8443"
//!
//! [[peers]]
//! name = "node2"
//! address = "10.0.0.12:8443"
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `FLEETD_MEMBER_NAME` | `member.name` |
//! | `FLEETD_ADDRESS` | `member.address` |

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod defaults {
    pub fn forward_timeout_ms() -> u64 {
        10_000
    }
    pub fn propagation_timeout_ms() -> u64 {
        5_000
    }
    pub fn store_buffer() -> usize {
        64
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub member: MemberConfig,
    #[serde(default)]
    pub peers: Vec<MemberConfig>,
    #[serde(default = "defaults::forward_timeout_ms")]
    pub forward_timeout_ms: u64,
    #[serde(default = "defaults::propagation_timeout_ms")]
    pub propagation_timeout_ms: u64,
    #[serde(default = "defaults::store_buffer")]
    pub store_buffer: usize,
}

impl DaemonConfig {
    /// Config for a member with the given peers and default timeouts.
    pub fn new(member: MemberConfig, peers: Vec<MemberConfig>) -> Self {
        Self {
            member,
            peers,
            forward_timeout_ms: defaults::forward_timeout_ms(),
            propagation_timeout_ms: defaults::propagation_timeout_ms(),
            store_buffer: defaults::store_buffer(),
        }
    }

    /// Read, apply environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self) {
        if let Ok(name) = std::env::var("FLEETD_MEMBER_NAME") {
            self.member.name = name;
        }
        if let Ok(address) = std::env::var("FLEETD_ADDRESS") {
            self.member.address = address;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.member.name.trim().is_empty() {
            return Err(ConfigError::Invalid("member.name must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.name == self.member.name {
                return Err(ConfigError::Invalid(format!(
                    "peer {:?} has the local member's name",
                    peer.name
                )));
            }
            if !seen.insert(peer.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate peer {:?}",
                    peer.name
                )));
            }
        }
        if self.forward_timeout_ms == 0 || self.propagation_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.store_buffer == 0 {
            return Err(ConfigError::Invalid("store_buffer must be non-zero".into()));
        }
        Ok(())
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_millis(self.propagation_timeout_ms)
    }
}
