//! `/1.0/instances`, `/1.0/containers`, `/1.0/virtual-machines`.
//!
//! Every handler that names an instance first asks the forwarder whether another member
//! hosts it; if so, that member's response is returned as-is.

use super::{apply_delete, apply_put, get_view, ApiRequest, ApiResponse};
use crate::cluster::forward_if_remote;
use crate::error::ResourceError;
use crate::model::{InstanceType, InstancesPost, ResourceKind};
use crate::registry::{self, ResourceCreate};
use crate::state::DaemonState;
use serde_json::json;
use std::sync::Arc;

pub async fn instance_get(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let project = request.project();
    if let Some(response) =
        forward_if_remote(state, request, project, name, ResourceKind::Instance).await?
    {
        return Ok(response);
    }
    let driver = registry::load_instance(state, project, name, instance_type).await?;
    get_view(driver.as_ref(), request).await
}

pub async fn instance_put(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    update(state, request, instance_type, name, false).await
}

pub async fn instance_patch(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    update(state, request, instance_type, name, true).await
}

async fn update(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
    name: &str,
    merge: bool,
) -> Result<ApiResponse, ResourceError> {
    let project = request.project();
    if let Some(response) =
        forward_if_remote(state, request, project, name, ResourceKind::Instance).await?
    {
        return Ok(response);
    }
    let driver = registry::load_instance(state, project, name, instance_type).await?;
    apply_put(driver, request, merge).await
}

pub async fn instance_delete(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let project = request.project();
    if let Some(response) =
        forward_if_remote(state, request, project, name, ResourceKind::Instance).await?
    {
        return Ok(response);
    }
    let driver = registry::load_instance(state, project, name, instance_type).await?;
    apply_delete(driver, request).await
}

/// Create. A typed collection fixes the instance type.
pub async fn instances_post(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    instance_type: InstanceType,
) -> Result<ApiResponse, ResourceError> {
    let mut post: InstancesPost = serde_json::from_slice(&request.body)
        .map_err(|err| ResourceError::validation(format!("invalid body: {err}")))?;
    if instance_type != InstanceType::Any {
        post.instance_type = instance_type;
    }
    let driver = registry::create(state, request.project(), ResourceCreate::Instance(post)).await?;
    Ok(ApiResponse::sync(json!({}), Some(driver.etag().clone())))
}
