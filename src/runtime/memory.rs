use super::InstanceRuntime;
use crate::error::ResourceError;
use crate::model::{InstanceBackup, InstanceSnapshot, InstanceState, InstanceStatus, ResourceKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Which runtime query to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeQuery {
    Status,
    State,
    Snapshots,
    Backups,
}

#[derive(Debug, Clone)]
struct Entry {
    status: InstanceStatus,
    pid: i64,
    processes: i64,
    snapshots: Vec<InstanceSnapshot>,
    backups: Vec<InstanceBackup>,
}

/// In-process runtime keeping instance state in memory.
///
/// Queries for instances it was never told about report a stopped instance with no
/// snapshots or backups. Individual queries can be made to fail, optionally after a
/// delay, to exercise error paths of the renderer.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    entries: RwLock<HashMap<ResourceKey, Entry>>,
    failing: RwLock<HashSet<RuntimeQuery>>,
    delay: RwLock<Option<Duration>>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, key: &ResourceKey, status: InstanceStatus) {
        let mut entries = self.entries.write();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::stopped);
        entry.status = status;
        if status == InstanceStatus::Running {
            entry.pid = 1000 + key.name.len() as i64;
            entry.processes = 1;
        } else {
            entry.pid = 0;
            entry.processes = 0;
        }
    }

    pub fn add_snapshot(&self, key: &ResourceKey, snapshot: InstanceSnapshot) {
        self.entries
            .write()
            .entry(key.clone())
            .or_insert_with(Entry::stopped)
            .snapshots
            .push(snapshot);
    }

    pub fn add_backup(&self, key: &ResourceKey, backup: InstanceBackup) {
        self.entries
            .write()
            .entry(key.clone())
            .or_insert_with(Entry::stopped)
            .backups
            .push(backup);
    }

    /// Make `query` fail with an internal error until [`heal`](Self::heal) is called.
    pub fn fail(&self, query: RuntimeQuery) {
        self.failing.write().insert(query);
    }

    pub fn heal(&self, query: RuntimeQuery) {
        self.failing.write().remove(&query);
    }

    /// Delay every query by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    async fn query(&self, query: RuntimeQuery, key: &ResourceKey) -> Result<Entry, ResourceError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().contains(&query) {
            return Err(ResourceError::Internal(format!(
                "runtime {query:?} unavailable for {key}"
            )));
        }
        Ok(self
            .entries
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(Entry::stopped))
    }
}

impl Entry {
    fn stopped() -> Self {
        Self {
            status: InstanceStatus::Stopped,
            pid: 0,
            processes: 0,
            snapshots: Vec::new(),
            backups: Vec::new(),
        }
    }
}

#[async_trait]
impl InstanceRuntime for InMemoryRuntime {
    async fn status(&self, key: &ResourceKey) -> Result<InstanceStatus, ResourceError> {
        Ok(self.query(RuntimeQuery::Status, key).await?.status)
    }

    async fn state(&self, key: &ResourceKey) -> Result<InstanceState, ResourceError> {
        let entry = self.query(RuntimeQuery::State, key).await?;
        let running = entry.status == InstanceStatus::Running;
        Ok(InstanceState {
            status: entry.status,
            status_code: entry.status.code(),
            pid: entry.pid,
            processes: entry.processes,
            cpu_usage_ns: if running { 1_500_000_000 } else { 0 },
            memory_usage_bytes: if running { 64 * 1024 * 1024 } else { 0 },
        })
    }

    async fn snapshots(&self, key: &ResourceKey) -> Result<Vec<InstanceSnapshot>, ResourceError> {
        Ok(self.query(RuntimeQuery::Snapshots, key).await?.snapshots)
    }

    async fn backups(&self, key: &ResourceKey) -> Result<Vec<InstanceBackup>, ResourceError> {
        Ok(self.query(RuntimeQuery::Backups, key).await?.backups)
    }

    async fn forget(&self, key: &ResourceKey) {
        self.entries.write().remove(key);
    }
}
