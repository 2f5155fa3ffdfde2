use std::time::Duration;

use disclosure_core::{connection::ServerName, signing::SignatureAlgId};
use disclosure_engine::{
    config::{DEFAULT_MAX_RECV_DATA, DEFAULT_MAX_SENT_DATA},
    HttpRequest,
};
use disclosure_notary_client::NotaryReference;
use http::Uri;

use crate::selector::Disclosure;

/// Options of a notarization session.
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct NotarizeOptions {
    /// The notary.
    notary: NotaryReference,
    /// WebSocket proxy URL used to reach the server.
    #[builder(setter(into))]
    websocket_proxy_url: String,
    /// The request sent to the server.
    request: HttpRequest,
    /// How the disclosed ranges are selected.
    #[builder(default)]
    disclosure: Disclosure,
    /// Maximum number of bytes that can be sent.
    #[builder(default = "DEFAULT_MAX_SENT_DATA")]
    max_sent_data: usize,
    /// Maximum number of bytes that can be received.
    #[builder(default = "DEFAULT_MAX_RECV_DATA")]
    max_recv_data: usize,
    /// Signature algorithm requested from the notary.
    #[builder(default = "SignatureAlgId::SECP256K1")]
    signature_alg: SignatureAlgId,
    /// Deadline of each call to the engine.
    #[builder(setter(strip_option), default)]
    call_timeout: Option<Duration>,
}

impl NotarizeOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(request) = &self.request {
            server_name(request)?;
        }

        Ok(())
    }
}

impl NotarizeOptions {
    /// Creates a new builder for `NotarizeOptions`.
    pub fn builder() -> NotarizeOptionsBuilder {
        NotarizeOptionsBuilder::default()
    }

    /// Returns the notary.
    pub fn notary(&self) -> &NotaryReference {
        &self.notary
    }

    /// Returns the WebSocket proxy URL.
    pub fn websocket_proxy_url(&self) -> &str {
        &self.websocket_proxy_url
    }

    /// Returns the request sent to the server.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Returns how the disclosed ranges are selected.
    pub fn disclosure(&self) -> &Disclosure {
        &self.disclosure
    }

    /// Returns the maximum number of bytes that can be sent.
    pub fn max_sent_data(&self) -> usize {
        self.max_sent_data
    }

    /// Returns the maximum number of bytes that can be received.
    pub fn max_recv_data(&self) -> usize {
        self.max_recv_data
    }

    /// Returns the signature algorithm requested from the notary.
    pub fn signature_alg(&self) -> SignatureAlgId {
        self.signature_alg
    }

    /// Returns the deadline of each call to the engine.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Returns the name of the server, taken from the request URL.
    pub fn server_name(&self) -> Result<ServerName, String> {
        server_name(&self.request)
    }
}

fn server_name(request: &HttpRequest) -> Result<ServerName, String> {
    let uri: Uri = request
        .url
        .parse()
        .map_err(|err| format!("invalid request url {:?}: {err}", request.url))?;

    match uri.scheme_str() {
        Some("https") => {}
        _ => return Err(format!("request url must be https: {}", request.url)),
    }

    let host = uri
        .host()
        .ok_or_else(|| format!("request url has no host: {}", request.url))?;

    ServerName::new(host).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use disclosure_engine::fixtures::widget_request;
    use rstest::rstest;

    fn notary() -> NotaryReference {
        NotaryReference::new("https://notary.test").unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = NotarizeOptions::builder()
            .notary(notary())
            .websocket_proxy_url("wss://proxy.test")
            .request(widget_request())
            .build()
            .unwrap();

        assert_eq!(options.disclosure(), &Disclosure::Simplified);
        assert_eq!(options.max_sent_data(), DEFAULT_MAX_SENT_DATA);
        assert_eq!(options.max_recv_data(), DEFAULT_MAX_RECV_DATA);
        assert_eq!(options.call_timeout(), None);
        assert_eq!(options.server_name().unwrap().as_str(), "example.test");
    }

    #[rstest]
    #[case::plain_http("http://example.test/api/widget")]
    #[case::no_host("https:///api/widget")]
    #[case::relative("/api/widget")]
    fn test_invalid_url(#[case] url: &str) {
        let request = HttpRequest {
            url: url.to_string(),
            ..Default::default()
        };

        let result = NotarizeOptions::builder()
            .notary(notary())
            .websocket_proxy_url("wss://proxy.test")
            .request(request)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_notary() {
        let result = NotarizeOptions::builder()
            .websocket_proxy_url("wss://proxy.test")
            .request(widget_request())
            .build();

        assert!(result.is_err());
    }
}
