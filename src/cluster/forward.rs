use super::locator::{locate, Owner};
use crate::api::{ApiRequest, ApiResponse};
use crate::error::ResourceError;
use crate::model::ResourceKind;
use crate::state::DaemonState;
use tracing::{info, instrument, warn};

/// Proxy `request` to the owning member if the resource is not local.
///
/// `Ok(None)` means "handle locally". `Ok(Some(response))` is the owner's response,
/// status, body and etag untouched. The call is made once: there is no retry and no
/// fallback to local handling, and a request that was already forwarded once is never
/// forwarded again.
#[instrument(skip(state, request), fields(member = %state.member_name()))]
pub async fn forward_if_remote(
    state: &DaemonState,
    request: &ApiRequest,
    project: &str,
    name: &str,
    kind: ResourceKind,
) -> Result<Option<ApiResponse>, ResourceError> {
    let owner = match locate(state, project, name, kind).await? {
        Owner::Local => return Ok(None),
        Owner::Remote(owner) => owner,
    };

    if request.forwarded {
        return Err(ResourceError::Internal(format!(
            "forwarding loop: {kind} {project}/{name} was forwarded here but is owned by {:?}",
            owner.name
        )));
    }
    if !owner.reachable {
        return Err(ResourceError::Unreachable {
            member: owner.name,
            reason: "marked unreachable".into(),
        });
    }

    info!(target_member = %owner.name, path = %request.path, "Forwarding");
    let mut forwarded = request.clone();
    forwarded.forwarded = true;

    let timeout = state.config.forward_timeout();
    match tokio::time::timeout(timeout, state.transport.send(&owner, forwarded)).await {
        Ok(Ok(response)) => Ok(Some(response)),
        Ok(Err(err)) => {
            warn!(target_member = %owner.name, error = %err, "Forward failed");
            Err(ResourceError::Unreachable {
                member: owner.name,
                reason: err.to_string(),
            })
        }
        Err(_) => {
            warn!(target_member = %owner.name, ?timeout, "Forward timed out");
            Err(ResourceError::Unreachable {
                member: owner.name,
                reason: format!("timed out after {timeout:?}"),
            })
        }
    }
}
