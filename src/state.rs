use crate::cluster::{ClusterMembers, PeerTransport, Propagator};
use crate::config::DaemonConfig;
use crate::model::ResourceRecord;
use crate::runtime::InstanceRuntime;
use crate::served::ServedZones;
use resource_store::StoreClient;
use std::sync::Arc;

/// Everything a member needs to serve a request.
///
/// Built once per member and passed by reference (as `Arc<DaemonState>`) through the
/// locator, the registry and every driver. Nothing in the crate reaches for daemon state
/// any other way.
pub struct DaemonState {
    pub config: DaemonConfig,
    /// Cluster-wide record store, shared by all members.
    pub store: StoreClient<ResourceRecord>,
    pub members: Arc<ClusterMembers>,
    pub transport: Arc<dyn PeerTransport>,
    pub runtime: Arc<dyn InstanceRuntime>,
    pub propagator: Propagator,
    pub served: ServedZones,
}

impl DaemonState {
    pub fn new(
        config: DaemonConfig,
        store: StoreClient<ResourceRecord>,
        runtime: Arc<dyn InstanceRuntime>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let members = Arc::new(ClusterMembers::from_config(&config));
        let propagator = Propagator::new(
            members.clone(),
            transport.clone(),
            config.propagation_timeout(),
        );
        Self {
            config,
            store,
            members,
            transport,
            runtime,
            propagator,
            served: ServedZones::new(),
        }
    }

    pub fn member_name(&self) -> &str {
        self.members.local_name()
    }
}
