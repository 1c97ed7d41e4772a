//! Replication of committed mutations to the other members.
//!
//! A mutation that committed locally with [`ClientType::Normal`] is re-issued to every
//! reachable peer tagged [`ClientType::Notification`]. Members handling a notification
//! never call the propagator, which is what keeps a change from bouncing around the
//! cluster.
//!
//! Fan-out is best effort: members are called in parallel, each call has its own timeout,
//! and failures are logged and reported, never returned to the client whose change already
//! committed. The fan-out runs in its own task so it finishes even if the request that
//! started it goes away.

use super::{ClusterMembers, PeerTransport};
use crate::api::ApiRequest;
use crate::model::{ClientType, ResourceKind};
use bytes::Bytes;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// What peers are asked to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerOperation {
    /// The resource was created or changed. Carries the full client-editable state as JSON.
    Update(Bytes),
    Delete,
}

impl PeerOperation {
    pub fn request(&self, kind: ResourceKind, project: &str, name: &str) -> ApiRequest {
        let request = match self {
            PeerOperation::Update(body) => {
                let mut request = ApiRequest::for_resource(Method::PUT, kind, name);
                request.body = body.clone();
                request
            }
            PeerOperation::Delete => ApiRequest::for_resource(Method::DELETE, kind, name),
        };
        request
            .with_project(project)
            .with_client_type(ClientType::Notification)
    }

    fn label(&self) -> &'static str {
        match self {
            PeerOperation::Update(_) => "update",
            PeerOperation::Delete => "delete",
        }
    }
}

/// Outcome of one fan-out, member names sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    pub notified: Vec<String>,
    /// `(member, reason)`.
    pub failed: Vec<(String, String)>,
    /// Members already known to be unreachable; not called.
    pub skipped: Vec<String>,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Clone)]
pub struct Propagator {
    members: Arc<ClusterMembers>,
    transport: Arc<dyn PeerTransport>,
    timeout: Duration,
}

impl Propagator {
    pub fn new(
        members: Arc<ClusterMembers>,
        transport: Arc<dyn PeerTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            members,
            transport,
            timeout,
        }
    }

    pub async fn propagate(
        &self,
        kind: ResourceKind,
        project: &str,
        name: &str,
        operation: PeerOperation,
    ) -> PropagationReport {
        let request = operation.request(kind, project, name);
        let peers = self.members.peers();
        let transport = self.transport.clone();
        let timeout = self.timeout;
        let resource = format!("{kind} {project}/{name}");
        let label = operation.label();

        let fan_out = tokio::spawn(async move {
            let mut report = PropagationReport::default();
            let mut calls = JoinSet::new();

            for member in peers {
                if !member.reachable {
                    report.skipped.push(member.name);
                    continue;
                }
                let transport = transport.clone();
                let request = request.clone();
                calls.spawn(async move {
                    let outcome =
                        match tokio::time::timeout(timeout, transport.send(&member, request)).await
                        {
                            Ok(Ok(response)) if response.status.is_success() => Ok(()),
                            Ok(Ok(response)) => Err(format!("peer answered {}", response.status)),
                            Ok(Err(err)) => Err(err.to_string()),
                            Err(_) => Err(format!("timed out after {timeout:?}")),
                        };
                    (member.name, outcome)
                });
            }

            while let Some(joined) = calls.join_next().await {
                match joined {
                    Ok((member, Ok(()))) => report.notified.push(member),
                    Ok((member, Err(reason))) => {
                        warn!(%member, %resource, operation = label, %reason, "Propagation failed");
                        report.failed.push((member, reason));
                    }
                    Err(err) => warn!(%resource, error = %err, "Propagation call panicked"),
                }
            }

            report.notified.sort();
            report.failed.sort();
            info!(
                %resource,
                operation = label,
                notified = report.notified.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                "Propagated"
            );
            report
        });

        match fan_out.await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "Propagation task failed");
                PropagationReport::default()
            }
        }
    }
}
