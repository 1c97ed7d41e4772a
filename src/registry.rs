//! Registry and loader: from `(project, name, kind)` to a bound driver.
//!
//! Dispatch is on the kind stored with the record, one driver per kind. The loader never
//! guesses a kind from the shape of the data.

use crate::cluster::PeerOperation;
use crate::driver::{
    announce, detached, instance, network, zone, InstanceDriver, NetworkDriver,
    ResourceDriver, ResourcePut, ZoneDriver,
};
use crate::error::ResourceError;
use crate::model::{
    ClientType, InstanceAttrs, InstancePut, InstanceType, InstancesPost, NetworkZonesPost,
    NetworksPost, RecordCreate, ResourceKey, ResourceKind, ResourceRecord,
};
use crate::state::DaemonState;
use std::sync::Arc;
use tracing::{info, instrument};

const DEFAULT_ARCHITECTURE: &str = "x86_64";

/// Bind a driver to an already loaded record.
pub fn bind(state: Arc<DaemonState>, record: ResourceRecord) -> Box<dyn ResourceDriver> {
    match record.kind() {
        ResourceKind::NetworkZone => Box::new(ZoneDriver::init(state, record)),
        ResourceKind::Network => Box::new(NetworkDriver::init(state, record)),
        ResourceKind::Instance => Box::new(InstanceDriver::init(state, record)),
    }
}

pub async fn load(
    state: &Arc<DaemonState>,
    project: &str,
    name: &str,
    kind: ResourceKind,
) -> Result<Box<dyn ResourceDriver>, ResourceError> {
    let key = ResourceKey::new(project, kind, name);
    let record = state
        .store
        .get(key.clone())
        .await?
        .ok_or_else(|| ResourceError::NotFound(key.to_string()))?;
    Ok(bind(state.clone(), record))
}

/// Load an instance through a typed collection. A type mismatch is `NotFound`.
pub async fn load_instance(
    state: &Arc<DaemonState>,
    project: &str,
    name: &str,
    instance_type: InstanceType,
) -> Result<Box<dyn ResourceDriver>, ResourceError> {
    let driver = load(state, project, name, ResourceKind::Instance).await?;
    let stored = driver
        .info()
        .instance
        .as_ref()
        .map(|attrs| attrs.instance_type)
        .unwrap_or_default();
    if !instance_type.admits(stored) {
        return Err(ResourceError::NotFound(format!(
            "{} {project}/{name}",
            instance_type.as_str()
        )));
    }
    Ok(driver)
}

/// Load by name alone, searching every kind.
pub async fn load_by_project_and_name(
    state: &Arc<DaemonState>,
    project: &str,
    name: &str,
) -> Result<Box<dyn ResourceDriver>, ResourceError> {
    let project_owned = project.to_string();
    let name_owned = name.to_string();
    let mut matches = state
        .store
        .scan(move |record: &ResourceRecord| {
            record.project() == project_owned && record.name() == name_owned
        })
        .await?;

    match matches.len() {
        0 => Err(ResourceError::NotFound(format!("{project}/{name}"))),
        1 => Ok(bind(state.clone(), matches.remove(0))),
        _ => {
            let mut kinds: Vec<ResourceKind> = matches.iter().map(ResourceRecord::kind).collect();
            kinds.sort();
            Err(ResourceError::AmbiguousKind {
                project: project.to_string(),
                name: name.to_string(),
                kinds,
            })
        }
    }
}

/// A POST body for any kind.
#[derive(Debug, Clone)]
pub enum ResourceCreate {
    Zone(NetworkZonesPost),
    Network(NetworksPost),
    Instance(InstancesPost),
}

impl ResourceCreate {
    pub fn parse(kind: ResourceKind, body: &[u8]) -> Result<Self, ResourceError> {
        let create = match kind {
            ResourceKind::NetworkZone => serde_json::from_slice(body).map(ResourceCreate::Zone),
            ResourceKind::Network => serde_json::from_slice(body).map(ResourceCreate::Network),
            ResourceKind::Instance => serde_json::from_slice(body).map(ResourceCreate::Instance),
        };
        create.map_err(|err| ResourceError::validation(format!("invalid body: {err}")))
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceCreate::Zone(_) => ResourceKind::NetworkZone,
            ResourceCreate::Network(_) => ResourceKind::Network,
            ResourceCreate::Instance(_) => ResourceKind::Instance,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceCreate::Zone(post) => &post.name,
            ResourceCreate::Network(post) => &post.name,
            ResourceCreate::Instance(post) => &post.name,
        }
    }

    /// The client-editable part, as peers receive it.
    fn put(&self) -> ResourcePut {
        match self {
            ResourceCreate::Zone(post) => ResourcePut::Zone(post.put()),
            ResourceCreate::Network(post) => ResourcePut::Network(post.put()),
            ResourceCreate::Instance(post) => ResourcePut::Instance(InstancePut {
                description: post.description.clone(),
                architecture: post.architecture.clone(),
                config: post.config.clone(),
                devices: post.devices.clone(),
                profiles: post.profiles.clone(),
                ephemeral: post.ephemeral,
            }),
        }
    }
}

/// Validate and insert a new resource, then build its local state and announce it.
///
/// The insert, the local refresh and the announcement run on one task that outlives the
/// caller.
///
/// Instances default to the member handling the request. A name already taken within
/// `(project, kind)` is a `Conflict`.
#[instrument(
    skip(state, create),
    fields(member = %state.member_name(), kind = %create.kind(), name = %create.name())
)]
pub async fn create(
    state: &Arc<DaemonState>,
    project: &str,
    create: ResourceCreate,
) -> Result<Box<dyn ResourceDriver>, ResourceError> {
    let key = ResourceKey::new(project, create.kind(), create.name());
    let body = create.put().to_body()?;

    let (params, requires) = match &create {
        ResourceCreate::Zone(post) => {
            zone::validate_name(&post.name)?;
            zone::validate_config(&post.config)?;
            let params = RecordCreate {
                key,
                description: post.description.clone(),
                config: post.config.clone(),
                instance: None,
            };
            (params, Vec::new())
        }
        ResourceCreate::Network(post) => {
            network::validate_name(&post.name)?;
            network::validate_config(&post.config)?;
            network::check_zones_exist(state, project, &post.config).await?;
            let params = RecordCreate {
                key,
                description: post.description.clone(),
                config: post.config.clone(),
                instance: None,
            };
            (params, network::zone_keys(project, &post.config))
        }
        ResourceCreate::Instance(post) => {
            instance::validate_name(&post.name)?;
            instance::validate_config(&post.config)?;
            instance::validate_devices(state, project, &post.devices).await?;
            let location = post
                .location
                .clone()
                .unwrap_or_else(|| state.member_name().to_string());
            if state.members.get(&location).is_none() {
                return Err(ResourceError::validation(format!(
                    "unknown cluster member {location:?}"
                )));
            }
            let instance_type = match post.instance_type {
                InstanceType::Any => InstanceType::Container,
                concrete => concrete,
            };
            let architecture = if post.architecture.is_empty() {
                DEFAULT_ARCHITECTURE.to_string()
            } else {
                post.architecture.clone()
            };
            let params = RecordCreate {
                key,
                description: post.description.clone(),
                config: post.config.clone(),
                instance: Some(InstanceAttrs {
                    instance_type,
                    architecture,
                    location,
                    profiles: post.profiles.clone(),
                    devices: post.devices.clone(),
                    ephemeral: post.ephemeral,
                }),
            };
            (params, instance::network_keys(project, &post.devices))
        }
    };

    let state = state.clone();
    detached(async move {
        let record = state.store.create_referencing(params, requires).await?;
        info!(id = record.id, "Created");

        let driver = bind(state.clone(), record);
        let refreshed = driver.refresh_local().await;
        announce(&state, driver.info(), ClientType::Normal, PeerOperation::Update(body)).await;
        refreshed?;
        Ok::<_, ResourceError>(driver)
    })
    .await
}
