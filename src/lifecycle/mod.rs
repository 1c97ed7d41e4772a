//! Startup and shutdown of members and in-process clusters.

mod cluster;
mod daemon;
pub mod tracing;

pub use cluster::LocalCluster;
pub use daemon::Daemon;
