use super::{PeerTransport, TransportError};
use crate::api::{self, ApiRequest, ApiResponse};
use crate::cluster::ClusterMember;
use crate::model::ClientType;
use crate::state::DaemonState;
use async_trait::async_trait;
use http::Method;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// One request as seen by the loopback transport.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackCall {
    pub to: String,
    pub method: Method,
    pub path: String,
    pub client_type: ClientType,
    pub forwarded: bool,
}

/// In-process transport: hands requests straight to the dispatcher of the target
/// member's daemon.
///
/// Daemons are held weakly so a cluster can be torn down while the transport is still
/// shared between its members. A detached member behaves like one whose host is down,
/// and a per-member delay stands in for a slow link.
#[derive(Default)]
pub struct LoopbackTransport {
    daemons: RwLock<HashMap<String, Weak<DaemonState>>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: Mutex<Vec<LoopbackCall>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, name: &str, state: &Arc<DaemonState>) {
        self.daemons
            .write()
            .insert(name.to_string(), Arc::downgrade(state));
    }

    pub fn detach(&self, name: &str) {
        self.daemons.write().remove(name);
    }

    pub fn set_delay(&self, name: &str, delay: Option<Duration>) {
        let mut delays = self.delays.write();
        match delay {
            Some(delay) => delays.insert(name.to_string(), delay),
            None => delays.remove(name),
        };
    }

    /// Every request sent so far, delivered or not, in send order.
    pub fn calls(&self) -> Vec<LoopbackCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn send(
        &self,
        member: &ClusterMember,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().push(LoopbackCall {
            to: member.name.clone(),
            method: request.method.clone(),
            path: request.path.clone(),
            client_type: request.client_type,
            forwarded: request.forwarded,
        });

        let delay = self.delays.read().get(&member.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self
            .daemons
            .read()
            .get(&member.name)
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransportError::Detached(member.name.clone()))?;

        debug!(member = %member.name, path = %request.path, "Loopback delivery");
        Ok(api::dispatch(&state, request).await)
    }
}
