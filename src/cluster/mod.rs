//! Cluster membership, ownership lookup, forwarding and propagation.

pub mod forward;
pub mod locator;
pub mod propagate;
pub mod transport;

pub use forward::forward_if_remote;
pub use locator::{locate, Owner};
pub use propagate::{PeerOperation, PropagationReport, Propagator};
pub use transport::{HttpPeerTransport, LoopbackTransport, PeerTransport, TransportError};

use crate::config::DaemonConfig;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub name: String,
    pub address: String,
    pub reachable: bool,
}

/// One member's view of the cluster: itself plus its peers.
///
/// Reachability is local knowledge. A member marked unreachable is skipped by the
/// propagator and fails forwarding without a network call, until it is marked reachable
/// again.
#[derive(Debug)]
pub struct ClusterMembers {
    local: String,
    members: RwLock<BTreeMap<String, ClusterMember>>,
}

impl ClusterMembers {
    pub fn from_config(config: &DaemonConfig) -> Self {
        let members = std::iter::once(&config.member)
            .chain(config.peers.iter())
            .map(|member| {
                (
                    member.name.clone(),
                    ClusterMember {
                        name: member.name.clone(),
                        address: member.address.clone(),
                        reachable: true,
                    },
                )
            })
            .collect();
        Self {
            local: config.member.name.clone(),
            members: RwLock::new(members),
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local == name
    }

    pub fn get(&self, name: &str) -> Option<ClusterMember> {
        self.members.read().get(name).cloned()
    }

    /// Every member except the local one, reachable or not, in name order.
    pub fn peers(&self) -> Vec<ClusterMember> {
        self.members
            .read()
            .values()
            .filter(|member| member.name != self.local)
            .cloned()
            .collect()
    }

    /// Returns false for unknown members.
    pub fn mark_unreachable(&self, name: &str) -> bool {
        self.set_reachable(name, false)
    }

    pub fn mark_reachable(&self, name: &str) -> bool {
        self.set_reachable(name, true)
    }

    fn set_reachable(&self, name: &str, reachable: bool) -> bool {
        match self.members.write().get_mut(name) {
            Some(member) => {
                member.reachable = reachable;
                true
            }
            None => false,
        }
    }
}
