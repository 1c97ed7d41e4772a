//! Data model: kinds, the persisted record, and the public view types of each kind.

pub mod instance;
pub mod kind;
pub mod network;
pub mod record;
pub mod zone;

pub use instance::*;
pub use kind::*;
pub use network::{Network, NetworkPut, NetworksPost};
pub use record::*;
pub use zone::*;
