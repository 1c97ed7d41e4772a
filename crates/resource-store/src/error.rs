use crate::etag::Etag;

/// Errors that can occur within the record store itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store closed")]
    Closed,
    #[error("Store dropped response channel")]
    Dropped,
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Record already exists: {0}")]
    AlreadyExists(String),
    #[error("Record changed: expected etag {expected}, current etag {current}")]
    PreconditionFailed { expected: Etag, current: Etag },
    #[error("Referenced record not found: {0}")]
    MissingReference(String),
    #[error("Record {key} is referenced by {}", by.join(", "))]
    InUse { key: String, by: Vec<String> },
    #[error("Record error: {0}")]
    Record(Box<dyn std::error::Error + Send + Sync>),
}
