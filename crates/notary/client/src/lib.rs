//! Notary discovery.
//!
//! A [`NotaryReference`] names a notary by its base URL. It resolves the
//! notary's public key through the notary's `/info` endpoint, caching it for
//! its lifetime. Notarization sessions are requested through the `/session`
//! endpoint with [`request_session_url`].

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod reference;
mod url;

use async_trait::async_trait;
use disclosure_notary_common::{
    ClientType, InfoResponse, NotarizationSessionRequest, NotarizationSessionResponse,
};
use tracing::{debug, instrument};

pub use client::{default_root_store, HttpNotaryApi, HttpNotaryApiBuilder, NotaryConnection};
pub use error::ClientError;
pub use reference::NotaryReference;
pub use url::NotaryUrl;

/// The notary HTTP API.
#[async_trait]
pub trait NotaryApi: Send + Sync {
    /// Fetches the notary's information, including its public key.
    async fn info(&self, url: &NotaryUrl) -> Result<InfoResponse, ClientError>;

    /// Requests a new notarization session.
    async fn session(
        &self,
        url: &NotaryUrl,
        request: &NotarizationSessionRequest,
    ) -> Result<NotarizationSessionResponse, ClientError>;
}

/// Requests a new notarization session and returns the WebSocket URL the
/// prover connects to.
#[instrument(level = "debug", skip(api), fields(notary = %url), err)]
pub async fn request_session_url(
    api: &dyn NotaryApi,
    url: &NotaryUrl,
    max_sent_data: usize,
    max_recv_data: usize,
) -> Result<String, ClientError> {
    let request = NotarizationSessionRequest {
        client_type: ClientType::Websocket,
        max_sent_data: Some(max_sent_data),
        max_recv_data: Some(max_recv_data),
    };

    let response = api.session(url, &request).await?;

    debug!(session_id = %response.session_id, "notarization session created");

    Ok(url.session_url(&response.session_id))
}
