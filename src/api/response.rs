use crate::error::ResourceError;
use bytes::Bytes;
use http::StatusCode;
use resource_store::Etag;
use serde_json::{json, Value};

/// A response as relayed between members: status, raw body bytes and the etag header.
///
/// Forwarded responses are passed through as-is, so this type never re-encodes a body it
/// did not produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub etag: Option<Etag>,
}

impl ApiResponse {
    /// `{type:"sync", status:"Success", status_code:200, metadata}`.
    pub fn sync(metadata: Value, etag: Option<Etag>) -> Self {
        let envelope = json!({
            "type": "sync",
            "status": "Success",
            "status_code": StatusCode::OK.as_u16(),
            "metadata": metadata,
        });
        Self {
            status: StatusCode::OK,
            body: Bytes::from(envelope.to_string()),
            etag,
        }
    }

    /// Successful mutation: empty metadata.
    pub fn empty_sync() -> Self {
        Self::sync(json!({}), None)
    }

    /// Plain text body, for generated artifacts.
    pub fn text(content: String, etag: Option<Etag>) -> Self {
        Self {
            status: StatusCode::OK,
            body: Bytes::from(content),
            etag,
        }
    }

    /// `{type:"error", error, error_code}`.
    pub fn error(err: &ResourceError) -> Self {
        let status = err.status();
        let envelope = json!({
            "type": "error",
            "error": err.to_string(),
            "error_code": status.as_u16(),
        });
        Self {
            status,
            body: Bytes::from(envelope.to_string()),
            etag: None,
        }
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The `metadata` member of a sync envelope.
    pub fn metadata(&self) -> Option<Value> {
        self.json().ok()?.get("metadata").cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_envelope() {
        let response = ApiResponse::sync(json!({"name": "web1"}), None);
        let body = response.json().unwrap();
        assert_eq!(body["type"], "sync");
        assert_eq!(body["status"], "Success");
        assert_eq!(body["status_code"], 200);
        assert_eq!(response.metadata().unwrap()["name"], "web1");
    }

    #[test]
    fn test_error_envelope_carries_status() {
        let response = ApiResponse::error(&ResourceError::Conflict("in use".into()));
        assert_eq!(response.status, StatusCode::CONFLICT);
        let body = response.json().unwrap();
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"], "in use");
        assert_eq!(body["error_code"], 409);
    }
}
