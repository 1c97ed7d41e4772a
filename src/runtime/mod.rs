//! Instance runtime collaborator.
//!
//! Live state, snapshots and backups of instances are owned by the runtime of the member
//! hosting them; the resource layer only reads them while rendering.

mod memory;

pub use memory::{InMemoryRuntime, RuntimeQuery};

use crate::error::ResourceError;
use crate::model::{InstanceBackup, InstanceSnapshot, InstanceState, InstanceStatus, ResourceKey};
use async_trait::async_trait;

#[async_trait]
pub trait InstanceRuntime: Send + Sync + 'static {
    /// Cheap status lookup used by the basic view.
    async fn status(&self, key: &ResourceKey) -> Result<InstanceStatus, ResourceError>;

    async fn state(&self, key: &ResourceKey) -> Result<InstanceState, ResourceError>;

    async fn snapshots(&self, key: &ResourceKey) -> Result<Vec<InstanceSnapshot>, ResourceError>;

    async fn backups(&self, key: &ResourceKey) -> Result<Vec<InstanceBackup>, ResourceError>;

    /// Drop whatever the runtime holds for a deleted instance.
    async fn forget(&self, key: &ResourceKey);
}
