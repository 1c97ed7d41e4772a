//! Node-local cache of the zone files a member serves.
//!
//! Every member renders zone content for its local DNS listener. The cache is the only
//! resource-derived state a member keeps between requests; each entry is tagged with the
//! etag of the record it was generated from, and it is rewritten whenever a local update
//! or a peer notification touches the zone or a network referencing it.

use parking_lot::RwLock;
use resource_store::Etag;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ServedZone {
    pub etag: Etag,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct ServedZones {
    zones: RwLock<BTreeMap<(String, String), ServedZone>>,
}

impl ServedZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &str, zone: &str) -> Option<ServedZone> {
        self.zones
            .read()
            .get(&(project.to_string(), zone.to_string()))
            .cloned()
    }

    pub fn insert(&self, project: &str, zone: &str, served: ServedZone) {
        self.zones
            .write()
            .insert((project.to_string(), zone.to_string()), served);
    }

    /// Returns whether an entry was removed.
    pub fn evict(&self, project: &str, zone: &str) -> bool {
        self.zones
            .write()
            .remove(&(project.to_string(), zone.to_string()))
            .is_some()
    }

    /// Names of the zones served for `project`, sorted.
    pub fn names(&self, project: &str) -> Vec<String> {
        self.zones
            .read()
            .keys()
            .filter(|(p, _)| p == project)
            .map(|(_, zone)| zone.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }
}
