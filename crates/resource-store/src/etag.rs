//! # Fingerprints
//!
//! An [`Etag`] is an opaque token over exactly the fields a record exposes for reading and
//! mutation. It is computed by serializing those fields with `serde_json` and hashing the
//! bytes with SHA-256.
//!
//! Callers build the fingerprinted value from ordered containers (`BTreeMap`, tuples,
//! `Vec`), which keeps the JSON encoding canonical: equal fields always produce equal
//! bytes, and therefore equal tags.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};

/// Opaque fingerprint of a record's mutable state, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    /// Fingerprint any serializable value.
    pub fn compute<S: Serialize + ?Sized>(fields: &S) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_vec(fields)?;
        let digest = Sha256::digest(&encoded);
        Ok(Self(hex::encode(digest)))
    }

    /// Parse a tag as it arrives in an `ETag` or `If-Match` header.
    ///
    /// Surrounding quotes and a weak-validator prefix are stripped.
    pub fn from_header(value: &str) -> Self {
        let value = value.trim();
        let value = value.strip_prefix("W/").unwrap_or(value);
        Self(value.trim_matches('"').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
