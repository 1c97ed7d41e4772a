use super::{apply_delete, apply_put, get_view, ApiRequest, ApiResponse};
use crate::driver::network;
use crate::error::ResourceError;
use crate::model::{ClientType, ResourceKind};
use crate::registry::{self, ResourceCreate};
use crate::state::DaemonState;
use serde_json::json;
use std::sync::Arc;

pub async fn network_get(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::Network).await?;
    get_view(driver.as_ref(), request).await
}

pub async fn network_put(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::Network).await?;
    apply_put(driver, request, false).await
}

pub async fn network_patch(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::Network).await?;
    apply_put(driver, request, true).await
}

pub async fn network_delete(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    if request.client_type == ClientType::Notification {
        network::on_peer_delete(state, request.project()).await?;
        return Ok(ApiResponse::empty_sync());
    }
    let driver = registry::load(state, request.project(), name, ResourceKind::Network).await?;
    apply_delete(driver, request).await
}

pub async fn networks_post(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
) -> Result<ApiResponse, ResourceError> {
    let create = ResourceCreate::parse(ResourceKind::Network, &request.body)?;
    let driver = registry::create(state, request.project(), create).await?;
    Ok(ApiResponse::sync(json!({}), Some(driver.etag().clone())))
}
