#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # fleetd
//!
//! > **The resource-access layer of a clustered instance daemon.**
//!
//! Every member of a fleet serves the same API over the same shared database. Some
//! resources (instances) live on exactly one member; others (network zones, networks) are
//! cluster-wide, and every member keeps node-local state derived from them. This crate is
//! the layer that turns a request for `/1.0/{collection}/{name}` into the right answer no
//! matter which member received it.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One driver per kind
//! A record is loaded from the shared store and bound to the driver for its stored kind
//! ([`registry`]). All kind-specific behavior (validation, `used_by`, rendering, update,
//! delete) sits behind the [`ResourceDriver`](driver::ResourceDriver) trait, so the request
//! surface in [`api`] is written once for every kind.
//!
//! ### Location transparency
//! Node-affine resources are served by the member hosting them. The [`cluster`] locator
//! finds the owner, and the forwarder relays the request there exactly once. A request that
//! arrives already forwarded is never forwarded again.
//!
//! ### Propagation without loops
//! After a committed change to a cluster-wide resource, the member that handled the client
//! request notifies every peer in parallel. Notifications carry
//! [`ClientType::Notification`](model::ClientType) and are never propagated further, so a
//! change fans out exactly one hop.
//!
//! ## 🚀 Core Concepts
//!
//! ### ETags
//! Every rendered view comes with an [`Etag`](resource_store::Etag) over the record's
//! persisted fields. A write carrying `If-Match` is checked by [`guard`] before the driver
//! runs, and again by the store's compare-and-set at commit.
//!
//! ### Basic vs. full views
//! `recursion=1` asks for the full view. The full view is all-or-nothing: if any part of it
//! fails, the request fails. See [`render`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Surface ([`api`])
//! - **Role**: Parse a request, route it to a kind's handlers, build the response envelope.
//! - **Key items**: [`dispatch`](api::dispatch), [`ApiRequest`](api::ApiRequest).
//!
//! ### 2. The Cluster ([`cluster`])
//! - **Role**: Membership, owner lookup, forwarding, propagation and peer transports.
//! - **Key items**: [`locate`](cluster::locate), [`forward_if_remote`](cluster::forward_if_remote),
//!   [`Propagator`](cluster::Propagator).
//!
//! ### 3. The Drivers ([`driver`], [`registry`])
//! - **Role**: Kind-specific behavior and binding records to it.
//! - **Key items**: [`ZoneDriver`](driver::ZoneDriver), [`NetworkDriver`](driver::NetworkDriver),
//!   [`InstanceDriver`](driver::InstanceDriver).
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! - **Role**: Start members, wire them to the shared store, shut everything down.
//! - **Key items**: [`Daemon`](lifecycle::Daemon), [`LocalCluster`](lifecycle::LocalCluster),
//!   [`setup_tracing`](lifecycle::tracing::setup_tracing).
//!
//! ## 🚀 Quick Start
//!
//! ### Running the Demo
//!
//! ```bash
//! # Three members in one process, with info logs
//! RUST_LOG=info cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test --workspace
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod served;
pub mod state;
