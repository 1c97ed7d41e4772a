use super::{apply_delete, apply_put, get_view, ApiRequest, ApiResponse};
use crate::driver::zone;
use crate::error::ResourceError;
use crate::model::{ClientType, ResourceKind};
use crate::registry::{self, ResourceCreate};
use crate::state::DaemonState;
use serde_json::json;
use std::sync::Arc;

pub async fn zone_get(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::NetworkZone).await?;
    get_view(driver.as_ref(), request).await
}

pub async fn zone_put(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::NetworkZone).await?;
    apply_put(driver, request, false).await
}

pub async fn zone_patch(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::NetworkZone).await?;
    apply_put(driver, request, true).await
}

/// A notification only evicts the local copy: the record is already gone from the
/// shared store.
pub async fn zone_delete(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let project = request.project();
    if request.client_type == ClientType::Notification {
        zone::on_peer_delete(state, project, name);
        return Ok(ApiResponse::empty_sync());
    }
    let driver = registry::load(state, project, name, ResourceKind::NetworkZone).await?;
    apply_delete(driver, request).await
}

/// Generated zone file as plain text.
pub async fn zone_content_get(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
    name: &str,
) -> Result<ApiResponse, ResourceError> {
    let driver = registry::load(state, request.project(), name, ResourceKind::NetworkZone).await?;
    let content = driver.content().await?;
    Ok(ApiResponse::text(content, Some(driver.etag().clone())))
}

pub async fn zones_post(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
) -> Result<ApiResponse, ResourceError> {
    let create = ResourceCreate::parse(ResourceKind::NetworkZone, &request.body)?;
    let driver = registry::create(state, request.project(), create).await?;
    Ok(ApiResponse::sync(json!({}), Some(driver.etag().clone())))
}
