use crate::api::{self, ApiRequest, ApiResponse};
use crate::cluster::PeerTransport;
use crate::config::DaemonConfig;
use crate::model::ResourceRecord;
use crate::runtime::InstanceRuntime;
use crate::state::DaemonState;
use resource_store::{StoreActor, StoreClient};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// One cluster member.
///
/// Owns the member's [`DaemonState`]; transports and tests reach the request surface
/// through [`Daemon::handle`].
pub struct Daemon {
    state: Arc<DaemonState>,
}

impl Daemon {
    pub fn new(
        config: DaemonConfig,
        store: StoreClient<ResourceRecord>,
        runtime: Arc<dyn InstanceRuntime>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let state = Arc::new(DaemonState::new(config, store, runtime, transport));
        info!(member = %state.member_name(), peers = state.members.peers().len(), "Daemon ready");
        Self { state }
    }

    /// Start the record store shared by every member of a cluster.
    ///
    /// The store task ends once every returned or cloned client has been dropped.
    pub fn spawn_store(buffer: usize) -> (StoreClient<ResourceRecord>, JoinHandle<()>) {
        let (actor, client) = StoreActor::new(buffer);
        (client, tokio::spawn(actor.run()))
    }

    pub fn name(&self) -> &str {
        self.state.member_name()
    }

    pub fn state(&self) -> &Arc<DaemonState> {
        &self.state
    }

    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        api::dispatch(&self.state, request).await
    }
}
