//! # Resource Store
//!
//! A kind-agnostic record store built on a single Tokio task. It is the in-process
//! stand-in for the cluster-wide database that every member of a fleet shares.
//!
//! ## Why an actor?
//!
//! The store owns every record exclusively inside its task and processes requests one at
//! a time. That gives us the persistence contract the resource layer relies on for free:
//!
//! - **Compare-and-set**: an update or delete may carry the [`Etag`] the caller last saw.
//!   If the record changed in the meantime the request fails with
//!   [`StoreError::PreconditionFailed`] and nothing is written.
//! - **All-or-nothing**: an update is applied to a copy of the record and swapped in only
//!   when [`StoredRecord::apply_update`] succeeds.
//! - **Uniqueness**: a create for a key that already exists fails with
//!   [`StoreError::AlreadyExists`].
//! - **Reference checks**: a create or update may name keys that must exist
//!   ([`StoreError::MissingReference`]), and a delete may carry a predicate that blocks it
//!   while any other record matches ([`StoreError::InUse`]). Both are decided in the same
//!   step as the write.
//!
//! ## Module Tour
//!
//! - [`record`] - the [`StoredRecord`] trait a record type implements.
//! - [`actor`] - the [`StoreActor`] event loop (the "server" half).
//! - [`client`] - the cloneable [`StoreClient`] (the "client" half).
//! - [`etag`] - the opaque [`Etag`] fingerprint.
//! - [`mock`] - [`MockStore`](mock::MockStore) for scripting store behavior in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (actor, client) = StoreActor::<MyRecord>::new(64);
//! let handle = tokio::spawn(actor.run());
//!
//! let created = client.create(params).await?;
//! let updated = client.update(created.key(), Some(created.etag().clone()), change).await?;
//!
//! drop(client);
//! handle.await?;
//! ```

pub mod actor;
pub mod client;
pub mod error;
pub mod etag;
pub mod message;
pub mod mock;
pub mod record;

pub use actor::StoreActor;
pub use client::StoreClient;
pub use error::StoreError;
pub use etag::Etag;
pub use message::{Response, ScanFilter, StoreRequest};
pub use record::StoredRecord;
