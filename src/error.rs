//! Error taxonomy of the resource layer.
//!
//! Every failure a request can end with is one of these variants, and each maps to exactly
//! one HTTP status through [`ResourceError::status`]. None of them is retried by the layer
//! itself.

use crate::model::{RecordError, ResourceKind};
use http::StatusCode;
use resource_store::{Etag, StoreError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    /// The resource does not exist anywhere in the cluster.
    #[error("{0} not found")]
    NotFound(String),

    /// A kind-less lookup matched more than one kind.
    #[error("{name:?} is ambiguous in project {project:?}: matches {kinds:?}")]
    AmbiguousKind {
        project: String,
        name: String,
        kinds: Vec<ResourceKind>,
    },

    /// Bad name or config. Nothing was applied.
    #[error("{0}")]
    Validation(String),

    /// The caller's etag is stale; re-fetch and reapply.
    #[error("ETag doesn't match: supplied {supplied}, current {current}")]
    PreconditionFailed { supplied: Etag, current: Etag },

    /// The resource is still referenced.
    #[error("{0}")]
    Conflict(String),

    /// A cluster member could not be reached.
    #[error("member {member:?} unreachable: {reason}")]
    Unreachable { member: String, reason: String },

    #[error("{0}")]
    NotImplemented(String),

    /// Unexpected infrastructure failure.
    #[error("{0}")]
    Internal(String),
}

impl ResourceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
            ResourceError::AmbiguousKind { .. } => StatusCode::BAD_REQUEST,
            ResourceError::Validation(_) => StatusCode::BAD_REQUEST,
            ResourceError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            ResourceError::Conflict(_) => StatusCode::CONFLICT,
            ResourceError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ResourceError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ResourceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ResourceError::Validation(msg.into())
    }
}

impl From<StoreError> for ResourceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ResourceError::NotFound(key),
            StoreError::AlreadyExists(key) => {
                ResourceError::Conflict(format!("{key} already exists"))
            }
            StoreError::MissingReference(key) => {
                ResourceError::Validation(format!("{key} does not exist"))
            }
            StoreError::InUse { key, by } => {
                ResourceError::Conflict(format!("{key} is in use by {}", by.join(", ")))
            }
            StoreError::PreconditionFailed { expected, current } => {
                ResourceError::PreconditionFailed {
                    supplied: expected,
                    current,
                }
            }
            StoreError::Closed | StoreError::Dropped | StoreError::Record(_) => {
                ResourceError::Internal(format!("store: {err}"))
            }
        }
    }
}

impl From<RecordError> for ResourceError {
    fn from(err: RecordError) -> Self {
        ResourceError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        ResourceError::Internal(format!("encoding: {err}"))
    }
}
