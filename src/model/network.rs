use super::record::{Config, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Config keys through which a network points at zones of its project.
pub const ZONE_REFERENCE_KEYS: [&str; 3] = [
    "dns.zone.forward",
    "dns.zone.reverse.ipv4",
    "dns.zone.reverse.ipv6",
];

/// Public view of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub description: String,
    pub config: Config,
    pub used_by: Vec<String>,
    pub project: String,
}

impl Network {
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkPut {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Config,
}

impl From<&ResourceRecord> for NetworkPut {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            description: record.description.clone(),
            config: record.config.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworksPost {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Config,
}

impl NetworksPost {
    pub fn put(&self) -> NetworkPut {
        NetworkPut {
            description: self.description.clone(),
            config: self.config.clone(),
        }
    }
}

/// Zone names a network config refers to, deduplicated, in sorted order.
///
/// `dns.zone.forward` holds a comma separated list; the reverse keys hold one zone each.
pub fn referenced_zones(config: &Config) -> Vec<String> {
    let mut zones: Vec<String> = ZONE_REFERENCE_KEYS
        .iter()
        .filter_map(|key| config.get(*key))
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .map(str::to_string)
        .collect();
    zones.sort();
    zones.dedup();
    zones
}

/// Gateway address of a CIDR-valued key such as `ipv4.address = 10.0.0.1/24`.
pub fn gateway(config: &Config, key: &str) -> Option<IpAddr> {
    config.get(key)?.split('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_zones() {
        let mut config = Config::new();
        config.insert(
            "dns.zone.forward".into(),
            "example.com., lab.example.com.".into(),
        );
        config.insert("dns.zone.reverse.ipv4".into(), "0.10.in-addr.arpa.".into());
        config.insert("ipv4.address".into(), "10.0.0.1/24".into());

        assert_eq!(
            referenced_zones(&config),
            vec!["0.10.in-addr.arpa.", "example.com.", "lab.example.com."]
        );
        assert!(referenced_zones(&Config::new()).is_empty());
    }

    #[test]
    fn test_gateway() {
        let mut config = Config::new();
        config.insert("ipv4.address".into(), "10.0.0.1/24".into());
        config.insert("ipv6.address".into(), "none".into());
        assert_eq!(gateway(&config, "ipv4.address"), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(gateway(&config, "ipv6.address"), None);
        assert_eq!(gateway(&config, "dns.domain"), None);
    }
}
