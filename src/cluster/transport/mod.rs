//! How requests travel between members.

mod loopback;
mod remote;

pub use loopback::{LoopbackCall, LoopbackTransport};
pub use remote::{read_client_type, HttpPeerTransport, CLIENT_TYPE_HEADER, FORWARDED_HEADER};

use super::ClusterMember;
use crate::api::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("member {0:?} is not attached")]
    Detached(String),
    #[error("bad response: {0}")]
    Protocol(String),
}

/// Sends one request to one member and returns its response unchanged.
///
/// Implementations do not retry and do not apply timeouts; callers bound each call.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    async fn send(
        &self,
        member: &ClusterMember,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError>;
}
