use super::ClusterMember;
use crate::error::ResourceError;
use crate::model::{ResourceKey, ResourceKind};
use crate::state::DaemonState;
use tracing::debug;

/// Where a request for a resource must be served.
#[derive(Debug, Clone, PartialEq)]
pub enum Owner {
    Local,
    Remote(ClusterMember),
}

/// Resolve which member owns `(project, name, kind)`.
///
/// Only node-affine kinds have an owner other than the local member; for them the
/// record is looked up and a missing record is `NotFound`, never a routing decision.
/// Cluster-wide kinds resolve to `Local` without touching the store.
pub async fn locate(
    state: &DaemonState,
    project: &str,
    name: &str,
    kind: ResourceKind,
) -> Result<Owner, ResourceError> {
    if !kind.is_node_affine() {
        return Ok(Owner::Local);
    }

    let key = ResourceKey::new(project, kind, name);
    let record = state
        .store
        .get(key.clone())
        .await?
        .ok_or_else(|| ResourceError::NotFound(key.to_string()))?;

    let location = record
        .location()
        .ok_or_else(|| ResourceError::Internal(format!("{key} has no location")))?;
    debug!(%key, location, "Located");

    if state.members.is_local(location) {
        return Ok(Owner::Local);
    }
    state
        .members
        .get(location)
        .map(Owner::Remote)
        .ok_or_else(|| ResourceError::Internal(format!("{key} is on unknown member {location:?}")))
}
