use crate::error::ResourceError;
use crate::model::{ClientType, InstanceType, ResourceKind};
use bytes::Bytes;
use http::Method;
use resource_store::Etag;
use serde::Serialize;
use std::collections::BTreeMap;

pub const API_PREFIX: &str = "/1.0";
pub const DEFAULT_PROJECT: &str = "default";

/// A request as the resource layer sees it, independent of the transport that carried it.
///
/// `client_type` and `forwarded` are set explicitly by whoever builds the request (the
/// transport boundary for external requests, the propagator and forwarder for internal
/// ones) and are never derived from anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Bytes,
    pub if_match: Option<Etag>,
    pub client_type: ClientType,
    pub forwarded: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: Bytes::new(),
            if_match: None,
            client_type: ClientType::Normal,
            forwarded: false,
        }
    }

    /// Request for `/1.0/{collection}/{name}`.
    pub fn for_resource(method: Method, kind: ResourceKind, name: &str) -> Self {
        Self::new(method, format!("{API_PREFIX}/{}/{name}", kind.collection()))
    }

    pub fn with_project(self, project: &str) -> Self {
        self.with_query("project", project)
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_json<S: Serialize>(mut self, body: &S) -> Result<Self, serde_json::Error> {
        self.body = Bytes::from(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn with_if_match(mut self, etag: Etag) -> Self {
        self.if_match = Some(etag);
        self
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    pub fn project(&self) -> &str {
        self.query
            .get("project")
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROJECT)
    }

    /// Parse the path into the addressed collection and, if present, resource.
    pub fn target(&self) -> Result<Target, ResourceError> {
        let not_found = || ResourceError::NotFound(format!("path {:?}", self.path));
        let rest = self
            .path
            .strip_prefix(API_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(not_found)?;

        let mut segments = rest.split('/');
        let collection = segments.next().unwrap_or_default();
        let (kind, instance_type) = resolve_collection(collection)
            .ok_or_else(|| ResourceError::NotFound(format!("collection {collection:?}")))?;
        let name = segments
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let sub = segments.next().map(str::to_string);
        if segments.next().is_some() || (name.is_none() && sub.is_some()) {
            return Err(not_found());
        }

        Ok(Target {
            kind,
            instance_type,
            name,
            sub,
        })
    }
}

/// The resource a request addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub kind: ResourceKind,
    pub instance_type: InstanceType,
    /// `None` for the collection itself.
    pub name: Option<String>,
    /// Trailing sub-resource, e.g. `content` in `/1.0/network-zones/{name}/content`.
    pub sub: Option<String>,
}

/// Which kind (and for instances, which type) a request targets.
pub fn resolve_instance_type(
    request: &ApiRequest,
) -> Result<(ResourceKind, InstanceType), ResourceError> {
    request
        .target()
        .map(|target| (target.kind, target.instance_type))
}

fn resolve_collection(collection: &str) -> Option<(ResourceKind, InstanceType)> {
    match collection {
        "instances" => Some((ResourceKind::Instance, InstanceType::Any)),
        "containers" => Some((ResourceKind::Instance, InstanceType::Container)),
        "virtual-machines" => Some((ResourceKind::Instance, InstanceType::VirtualMachine)),
        "network-zones" => Some((ResourceKind::NetworkZone, InstanceType::Any)),
        "networks" => Some((ResourceKind::Network, InstanceType::Any)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_instance_type_from_collection() {
        let cases = [
            ("/1.0/instances/web1", ResourceKind::Instance, InstanceType::Any),
            ("/1.0/containers/web1", ResourceKind::Instance, InstanceType::Container),
            (
                "/1.0/virtual-machines/web1",
                ResourceKind::Instance,
                InstanceType::VirtualMachine,
            ),
            ("/1.0/network-zones/example.com.", ResourceKind::NetworkZone, InstanceType::Any),
            ("/1.0/networks/lan0", ResourceKind::Network, InstanceType::Any),
        ];
        for (path, kind, itype) in cases {
            let request = ApiRequest::new(Method::GET, path);
            assert_eq!(resolve_instance_type(&request).unwrap(), (kind, itype), "{path}");
        }
    }

    #[test]
    fn test_target_parses_sub_resource() {
        let request = ApiRequest::new(Method::GET, "/1.0/network-zones/example.com./content");
        let target = request.target().unwrap();
        assert_eq!(target.name.as_deref(), Some("example.com."));
        assert_eq!(target.sub.as_deref(), Some("content"));
    }

    #[test]
    fn test_bad_paths_are_not_found() {
        for path in ["/2.0/instances/a", "/1.0/images/a", "/1.0/instances/a/b/c"] {
            let err = ApiRequest::new(Method::GET, path).target().unwrap_err();
            assert!(matches!(err, ResourceError::NotFound(_)), "{path}");
        }
    }

    #[test]
    fn test_collection_target_has_no_name() {
        let target = ApiRequest::new(Method::POST, "/1.0/networks").target().unwrap();
        assert_eq!(target.kind, ResourceKind::Network);
        assert_eq!(target.name, None);
    }

    #[test]
    fn test_project_defaults() {
        let request = ApiRequest::new(Method::GET, "/1.0/instances/a");
        assert_eq!(request.project(), "default");
        assert_eq!(request.with_project("dev").project(), "dev");
    }
}
