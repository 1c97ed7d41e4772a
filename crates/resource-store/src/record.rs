use crate::etag::Etag;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any record type must implement to be kept by a [`StoreActor`](crate::StoreActor).
///
/// # Architecture Note
/// The store never looks inside a record. It only needs to know how to build one, where
/// to file it (its key), how to tell whether it changed (its etag) and how to apply a
/// change. Everything kind-specific lives behind this trait, so the event loop is written
/// once for every record type.
///
/// Records carry their own etag. Implementations recompute it inside
/// [`StoredRecord::from_create`] and [`StoredRecord::apply_update`] so that the value the
/// store compares against is always the one clients were shown.
pub trait StoredRecord: Clone + Send + Sync + 'static {
    /// Unique identifier of a record within the store.
    type Key: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// The data required to create a new record.
    type Create: Send + Sync + Debug;

    /// The data required to change an existing record.
    type Update: Send + Sync + Debug;

    /// The error type returned when a record rejects a create or an update.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build the record. `id` is a store-assigned numeric identifier, unique for the
    /// lifetime of the store.
    fn from_create(id: u64, params: Self::Create) -> Result<Self, Self::Error>;

    /// The key this record is filed under.
    fn key(&self) -> Self::Key;

    /// Fingerprint of the record's externally visible mutable state.
    fn etag(&self) -> &Etag;

    /// Apply a change in place, recomputing the etag.
    ///
    /// The store calls this on a copy, so a failure leaves the stored record untouched.
    fn apply_update(&mut self, update: Self::Update) -> Result<(), Self::Error>;
}
