use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Discriminator stored with every record.
///
/// Routing and propagation policy is declared here, next to the kind, so that adding a
/// kind forces a decision on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Instance,
    NetworkZone,
    Network,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Instance,
        ResourceKind::NetworkZone,
        ResourceKind::Network,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::NetworkZone => "network-zone",
            ResourceKind::Network => "network",
        }
    }

    /// Path segment of the collection under `/1.0/`.
    pub const fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instances",
            ResourceKind::NetworkZone => "network-zones",
            ResourceKind::Network => "networks",
        }
    }

    /// Node-affine kinds live on exactly one member and requests for them are forwarded
    /// there. Other kinds are served by whichever member receives the request.
    pub const fn is_node_affine(&self) -> bool {
        matches!(self, ResourceKind::Instance)
    }

    /// Whether a committed mutation must be announced to the other members.
    pub const fn propagates(&self) -> bool {
        matches!(self, ResourceKind::NetworkZone | ResourceKind::Network)
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-type of an instance, selected by the collection a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceType {
    #[default]
    Any,
    Container,
    VirtualMachine,
}

impl InstanceType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Any => "any",
            InstanceType::Container => "container",
            InstanceType::VirtualMachine => "virtual-machine",
        }
    }

    /// `Any` matches every stored type; a concrete type matches only itself.
    pub fn admits(&self, stored: InstanceType) -> bool {
        *self == InstanceType::Any || *self == stored
    }
}

/// Origin of an operation.
///
/// `Normal` comes from an external client and is announced to peers after it commits.
/// `Notification` comes from a peer's propagator and is never announced again. Every
/// internal call carries one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Normal,
    Notification,
}

impl ClientType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClientType::Normal => "normal",
            ClientType::Notification => "notification",
        }
    }
}

impl Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ClientType::Normal),
            "notification" => Ok(ClientType::Notification),
            other => Err(format!("unknown client type {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_per_kind() {
        assert!(ResourceKind::Instance.is_node_affine());
        assert!(!ResourceKind::Instance.propagates());
        assert!(!ResourceKind::NetworkZone.is_node_affine());
        assert!(ResourceKind::NetworkZone.propagates());
        assert!(ResourceKind::Network.propagates());
    }

    #[test]
    fn test_instance_type_admits() {
        assert!(InstanceType::Any.admits(InstanceType::Container));
        assert!(InstanceType::Container.admits(InstanceType::Container));
        assert!(!InstanceType::Container.admits(InstanceType::VirtualMachine));
    }

    #[test]
    fn test_client_type_round_trip() {
        for ct in [ClientType::Normal, ClientType::Notification] {
            assert_eq!(ct.as_str().parse::<ClientType>().unwrap(), ct);
        }
        assert!("peer".parse::<ClientType>().is_err());
    }
}
