//! Request surface.
//!
//! [`dispatch`] maps a method and a `/1.0/{collection}[/{name}[/{sub}]]` path onto the
//! handlers of each kind. It is deliberately small: three collections, a handful of verbs,
//! one sub-resource. Every failure leaves here as an error envelope carrying the status
//! of its [`ResourceError`] variant.

pub mod instances;
pub mod networks;
pub mod request;
pub mod response;
pub mod zones;

pub use request::{resolve_instance_type, ApiRequest, Target, API_PREFIX, DEFAULT_PROJECT};
pub use response::ApiResponse;

use crate::driver::{ResourceDriver, ResourcePut};
use crate::error::ResourceError;
use crate::guard::check_if_match;
use crate::model::ResourceKind;
use crate::render::{render, Recursion};
use crate::state::DaemonState;
use http::Method;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

#[instrument(
    name = "request",
    skip(state, request),
    fields(
        member = %state.member_name(),
        method = %request.method,
        path = %request.path,
        client_type = %request.client_type
    )
)]
pub async fn dispatch(state: &Arc<DaemonState>, request: ApiRequest) -> ApiResponse {
    match route(state, &request).await {
        Ok(response) => response,
        Err(err) => {
            debug!(status = %err.status(), error = %err, "Request failed");
            ApiResponse::error(&err)
        }
    }
}

async fn route(
    state: &Arc<DaemonState>,
    request: &ApiRequest,
) -> Result<ApiResponse, ResourceError> {
    let Target {
        kind,
        instance_type,
        name,
        sub,
    } = request.target()?;
    let method = &request.method;

    let name = match (name, sub) {
        (None, None) if *method == Method::POST => {
            return match kind {
                ResourceKind::Instance => {
                    instances::instances_post(state, request, instance_type).await
                }
                ResourceKind::NetworkZone => zones::zones_post(state, request).await,
                ResourceKind::Network => networks::networks_post(state, request).await,
            };
        }
        (Some(name), Some(sub)) => {
            return match (kind, sub.as_str()) {
                (ResourceKind::NetworkZone, "content") if *method == Method::GET => {
                    zones::zone_content_get(state, request, &name).await
                }
                _ => Err(ResourceError::NotFound(format!("path {:?}", request.path))),
            };
        }
        (Some(name), None) => name,
        (None, _) => return Err(unsupported(request)),
    };

    match (kind, method.as_str()) {
        (ResourceKind::Instance, "GET") => {
            instances::instance_get(state, request, instance_type, &name).await
        }
        (ResourceKind::Instance, "PUT") => {
            instances::instance_put(state, request, instance_type, &name).await
        }
        (ResourceKind::Instance, "PATCH") => {
            instances::instance_patch(state, request, instance_type, &name).await
        }
        (ResourceKind::Instance, "DELETE") => {
            instances::instance_delete(state, request, instance_type, &name).await
        }
        (ResourceKind::NetworkZone, "GET") => zones::zone_get(state, request, &name).await,
        (ResourceKind::NetworkZone, "PUT") => zones::zone_put(state, request, &name).await,
        (ResourceKind::NetworkZone, "PATCH") => zones::zone_patch(state, request, &name).await,
        (ResourceKind::NetworkZone, "DELETE") => zones::zone_delete(state, request, &name).await,
        (ResourceKind::Network, "GET") => networks::network_get(state, request, &name).await,
        (ResourceKind::Network, "PUT") => networks::network_put(state, request, &name).await,
        (ResourceKind::Network, "PATCH") => networks::network_patch(state, request, &name).await,
        (ResourceKind::Network, "DELETE") => {
            networks::network_delete(state, request, &name).await
        }
        _ => Err(unsupported(request)),
    }
}

fn unsupported(request: &ApiRequest) -> ResourceError {
    ResourceError::NotImplemented(format!("{} {}", request.method, request.path))
}

/// GET: render at the requested depth, etag in the response.
pub(crate) async fn get_view(
    driver: &dyn ResourceDriver,
    request: &ApiRequest,
) -> Result<ApiResponse, ResourceError> {
    let recursion = Recursion::parse(request.query.get("recursion").map(String::as_str));
    let rendered = render(driver, recursion).await?;
    Ok(ApiResponse::sync(rendered.metadata, Some(rendered.etag)))
}

/// PUT (replace) or PATCH (merge) against the etag the driver was loaded with.
pub(crate) async fn apply_put(
    mut driver: Box<dyn ResourceDriver>,
    request: &ApiRequest,
    merge: bool,
) -> Result<ApiResponse, ResourceError> {
    check_if_match(request.if_match.as_ref(), driver.etag())?;

    let body = ResourcePut::parse(driver.kind(), &request.body)?;
    let put = if merge {
        let mut current = ResourcePut::current(driver.info());
        current.merge(body)?;
        current
    } else {
        body
    };

    driver.update(put, request.client_type).await?;
    Ok(ApiResponse::sync(json!({}), Some(driver.etag().clone())))
}

pub(crate) async fn apply_delete(
    driver: Box<dyn ResourceDriver>,
    request: &ApiRequest,
) -> Result<ApiResponse, ResourceError> {
    check_if_match(request.if_match.as_ref(), driver.etag())?;
    driver.delete(request.client_type).await?;
    Ok(ApiResponse::empty_sync())
}
