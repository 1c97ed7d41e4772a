use super::Daemon;
use crate::cluster::LoopbackTransport;
use crate::config::{ConfigError, DaemonConfig, MemberConfig};
use crate::model::ResourceRecord;
use crate::runtime::InMemoryRuntime;
use resource_store::StoreClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// An in-process cluster: N daemons sharing one store, wired through a loopback transport.
///
/// Each member gets its own [`InMemoryRuntime`], so instance state lives only on the
/// member hosting the instance, as it would on real hosts.
///
/// # Example
///
/// ```ignore
/// let cluster = LocalCluster::start(&["node1", "node2", "node3"])?;
///
/// let response = cluster
///     .daemon("node1")
///     .unwrap()
///     .handle(ApiRequest::new(Method::GET, "/1.0/instances/web1"))
///     .await;
///
/// cluster.shutdown().await?;
/// ```
pub struct LocalCluster {
    daemons: Vec<Daemon>,
    runtimes: HashMap<String, Arc<InMemoryRuntime>>,
    transport: Arc<LoopbackTransport>,
    store: StoreClient<ResourceRecord>,
    store_handle: JoinHandle<()>,
}

impl LocalCluster {
    /// Start one daemon per name with default timeouts. Must be called inside a Tokio
    /// runtime.
    pub fn start(names: &[&str]) -> Result<Self, ConfigError> {
        Self::start_with(names, |_| {})
    }

    /// Like [`start`](Self::start), letting `adjust` edit each member's config first.
    pub fn start_with(
        names: &[&str],
        adjust: impl Fn(&mut DaemonConfig),
    ) -> Result<Self, ConfigError> {
        let members: Vec<MemberConfig> = names
            .iter()
            .enumerate()
            .map(|(i, name)| MemberConfig {
                name: name.to_string(),
                address: format!("127.0.0.1:{}", 8443 + i),
            })
            .collect();

        let mut configs = Vec::with_capacity(members.len());
        for member in &members {
            let peers = members
                .iter()
                .filter(|peer| peer.name != member.name)
                .cloned()
                .collect();
            let mut config = DaemonConfig::new(member.clone(), peers);
            adjust(&mut config);
            config.validate()?;
            configs.push(config);
        }

        let buffer = configs.first().map_or(64, |config| config.store_buffer);
        let (store, store_handle) = Daemon::spawn_store(buffer);
        let transport = Arc::new(LoopbackTransport::new());
        let mut runtimes = HashMap::new();
        let mut daemons = Vec::with_capacity(configs.len());

        for config in configs {
            let runtime = Arc::new(InMemoryRuntime::new());
            runtimes.insert(config.member.name.clone(), runtime.clone());
            let daemon = Daemon::new(config, store.clone(), runtime, transport.clone());
            transport.attach(daemon.name(), daemon.state());
            daemons.push(daemon);
        }

        info!(members = daemons.len(), "Cluster started");
        Ok(Self {
            daemons,
            runtimes,
            transport,
            store,
            store_handle,
        })
    }

    pub fn daemon(&self, name: &str) -> Option<&Daemon> {
        self.daemons.iter().find(|daemon| daemon.name() == name)
    }

    pub fn daemons(&self) -> &[Daemon] {
        &self.daemons
    }

    pub fn runtime(&self, name: &str) -> Option<&Arc<InMemoryRuntime>> {
        self.runtimes.get(name)
    }

    pub fn transport(&self) -> &Arc<LoopbackTransport> {
        &self.transport
    }

    /// The shared store, for inspecting what is persisted.
    pub fn store(&self) -> &StoreClient<ResourceRecord> {
        &self.store
    }

    /// Drop every member and wait for the store to stop.
    ///
    /// Fails if the store task panicked, or if something outside the cluster still holds
    /// a store client or daemon state after [`SHUTDOWN_TIMEOUT`].
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down cluster...");

        // The store stops once its last client is gone, and every daemon holds one.
        drop(self.daemons);
        drop(self.store);
        drop(self.runtimes);
        drop(self.transport);

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.store_handle).await {
            Ok(Ok(())) => {
                info!("Cluster shutdown complete.");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Store task failed: {:?}", e);
                Err(format!("Store task failed: {:?}", e))
            }
            Err(_) => Err("store clients still open after shutdown timeout".to_string()),
        }
    }
}
