use crate::error::StoreError;
use crate::etag::Etag;
use crate::record::StoredRecord;
use std::fmt;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the store.
pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// Predicate evaluated against every record during a [`StoreRequest::Scan`].
pub type ScanFilter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Internal message type sent to the store.
///
/// The variants map onto the persistence contract:
///
/// - **Create**: insert a new record; fails if the key is taken or any key in `requires`
///   is missing.
/// - **Get**: fetch one record by key.
/// - **Update**: compare-and-set. When `expected` is present it must equal the record's
///   current etag or nothing is written. Every key in `requires` must exist.
/// - **Delete**: remove a record, with the same optional compare-and-set guard. When
///   `referenced_by` is present, any other record matching it blocks the delete.
/// - **Scan**: return every record matching a predicate. This is how reverse indexes
///   (which records reference which) are answered without the store knowing about them.
pub enum StoreRequest<T: StoredRecord> {
    Create {
        params: T::Create,
        requires: Vec<T::Key>,
        respond_to: Response<T>,
    },
    Get {
        key: T::Key,
        respond_to: Response<Option<T>>,
    },
    Update {
        key: T::Key,
        expected: Option<Etag>,
        update: T::Update,
        requires: Vec<T::Key>,
        respond_to: Response<T>,
    },
    Delete {
        key: T::Key,
        expected: Option<Etag>,
        referenced_by: Option<ScanFilter<T>>,
        respond_to: Response<()>,
    },
    Scan {
        filter: ScanFilter<T>,
        respond_to: Response<Vec<T>>,
    },
}

impl<T: StoredRecord> fmt::Debug for StoreRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRequest::Create {
                params, requires, ..
            } => f
                .debug_struct("Create")
                .field("params", params)
                .field("requires", requires)
                .finish(),
            StoreRequest::Get { key, .. } => f.debug_struct("Get").field("key", key).finish(),
            StoreRequest::Update {
                key,
                expected,
                update,
                requires,
                ..
            } => f
                .debug_struct("Update")
                .field("key", key)
                .field("expected", expected)
                .field("update", update)
                .field("requires", requires)
                .finish(),
            StoreRequest::Delete {
                key,
                expected,
                referenced_by,
                ..
            } => f
                .debug_struct("Delete")
                .field("key", key)
                .field("expected", expected)
                .field("guarded", &referenced_by.is_some())
                .finish(),
            StoreRequest::Scan { .. } => f.debug_struct("Scan").finish_non_exhaustive(),
        }
    }
}
