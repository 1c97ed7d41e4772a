use super::{PeerTransport, TransportError};
use crate::api::{ApiRequest, ApiResponse};
use crate::cluster::ClusterMember;
use crate::model::ClientType;
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, ETAG, IF_MATCH};
use resource_store::Etag;
use tracing::debug;

pub const CLIENT_TYPE_HEADER: &str = "x-fleetd-client-type";
pub const FORWARDED_HEADER: &str = "x-fleetd-forwarded";

/// Sends requests to other members over HTTP(S) with reqwest.
///
/// The client type, forwarding mark and etag travel as headers so the receiving member
/// can rebuild the same [`ApiRequest`].
#[derive(Debug, Clone)]
pub struct HttpPeerTransport {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpPeerTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Self::with_client(client, "https"))
    }

    pub fn with_client(client: reqwest::Client, scheme: &'static str) -> Self {
        Self { client, scheme }
    }

    pub fn url(&self, member: &ClusterMember, request: &ApiRequest) -> String {
        format!("{}://{}{}", self.scheme, member.address, request.path)
    }
}

/// Headers carrying the request's metadata.
pub fn request_headers(request: &ApiRequest) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CLIENT_TYPE_HEADER,
        HeaderValue::from_static(request.client_type.as_str()),
    );
    if request.forwarded {
        headers.insert(FORWARDED_HEADER, HeaderValue::from_static("1"));
    }
    if let Some(etag) = &request.if_match {
        let value = HeaderValue::from_str(&format!("\"{etag}\""))
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        headers.insert(IF_MATCH, value);
    }
    Ok(headers)
}

/// Client type of an inbound request. Anything but an explicit notification is `Normal`.
pub fn read_client_type(headers: &HeaderMap) -> ClientType {
    headers
        .get(CLIENT_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(ClientType::Normal)
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send(
        &self,
        member: &ClusterMember,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url(member, &request);
        debug!(member = %member.name, %url, method = %request.method, "Sending");

        let response = self
            .client
            .request(request.method.clone(), &url)
            .query(&request.query)
            .headers(request_headers(&request)?)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    TransportError::Connect(err.to_string())
                } else {
                    TransportError::Protocol(err.to_string())
                }
            })?;

        let status = response.status();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(Etag::from_header);
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Protocol(err.to_string()))?;

        Ok(ApiResponse { status, body, etag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_headers_carry_client_type_and_etag() {
        let etag = Etag::compute(&"zone").unwrap();
        let request = ApiRequest::new(Method::PUT, "/1.0/network-zones/example.com.")
            .with_client_type(ClientType::Notification)
            .with_if_match(etag.clone());

        let headers = request_headers(&request).unwrap();
        assert_eq!(read_client_type(&headers), ClientType::Notification);
        assert!(headers.get(FORWARDED_HEADER).is_none());

        let if_match = headers.get(IF_MATCH).unwrap().to_str().unwrap();
        assert_eq!(Etag::from_header(if_match), etag);
    }

    #[test]
    fn test_missing_client_type_is_normal() {
        assert_eq!(read_client_type(&HeaderMap::new()), ClientType::Normal);
    }

    #[test]
    fn test_url_joins_address_and_path() {
        let transport = HttpPeerTransport::with_client(reqwest::Client::new(), "http");
        let member = ClusterMember {
            name: "node2".into(),
            address: "10.0.0.12:8443".into(),
            reachable: true,
        };
        let request = ApiRequest::new(Method::GET, "/1.0/instances/web1");
        assert_eq!(
            transport.url(&member, &request),
            "http://10.0.0.12:8443/1.0/instances/web1"
        );
    }
}
