//! Fixtures for testing

use std::sync::Arc;

use async_trait::async_trait;
use disclosure_core::{
    attestation::Attestation,
    connection::ServerName,
    fixtures::{attestation_config, notary_provider},
    request::AttestationRequest,
};
use disclosure_notary_client::{ClientError, NotaryApi, NotaryUrl};
use disclosure_notary_common::{
    InfoResponse, NotarizationSessionRequest, NotarizationSessionResponse,
};
use tracing::debug;

use crate::{
    config::EngineConfig,
    connector::{NotaryConnector, NotarySession, ServerConnector, ServerIo},
    msg::{HttpRequest, Method},
    notary::unix_time,
    EngineError, Notary,
};

/// URL of the widget API of the server fixture.
pub const WIDGET_URL: &str = "https://example.test/api/widget";

/// WebSocket proxy URL used with the in-memory connectors.
pub const PROXY_URL: &str = "wss://proxy.test/?token=example.test";

/// Connects provers to the server fixture over an in-memory stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryServerConnector;

#[async_trait]
impl ServerConnector for MemoryServerConnector {
    async fn connect(
        &self,
        _proxy_url: &str,
        server_name: &ServerName,
        _port: u16,
    ) -> Result<Box<dyn ServerIo>, EngineError> {
        let (client, server) = tokio::io::duplex(1 << 16);

        debug!(%server_name, "serving fixture in memory");
        tokio::spawn(async move {
            if let Err(err) = disclosure_server_fixture::bind(server).await {
                debug!("server fixture connection failed: {err}");
            }
        });

        Ok(Box::new(client))
    }
}

/// Links provers to an in-process notary.
#[derive(Debug, Clone)]
pub struct MemoryNotaryConnector {
    notary: Arc<Notary>,
}

impl MemoryNotaryConnector {
    /// Creates a new connector for the given notary.
    pub fn new(notary: Notary) -> Self {
        Self {
            notary: Arc::new(notary),
        }
    }
}

impl Default for MemoryNotaryConnector {
    fn default() -> Self {
        Self::new(notary())
    }
}

#[async_trait]
impl NotaryConnector for MemoryNotaryConnector {
    async fn connect(&self, session_url: &str) -> Result<Box<dyn NotarySession>, EngineError> {
        debug!(session_url, "joined in-memory session");

        Ok(Box::new(MemoryNotarySession {
            notary: self.notary.clone(),
            connection_time: unix_time(),
        }))
    }
}

struct MemoryNotarySession {
    notary: Arc<Notary>,
    connection_time: u64,
}

#[async_trait]
impl NotarySession for MemoryNotarySession {
    async fn notarize(
        self: Box<Self>,
        request: AttestationRequest,
    ) -> Result<Attestation, EngineError> {
        self.notary.attest(request, self.connection_time)
    }
}

/// Notary API answering for the notary key fixture without any network
/// access.
///
/// Session ids name the requested limits, e.g. `session-4096-16384`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryNotaryApi;

#[async_trait]
impl NotaryApi for MemoryNotaryApi {
    async fn info(&self, _url: &NotaryUrl) -> Result<InfoResponse, ClientError> {
        Ok(InfoResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            public_key: disclosure_core::fixtures::notary_verifying_key().to_hex(),
            git_commit_hash: "dev".to_string(),
        })
    }

    async fn session(
        &self,
        _url: &NotaryUrl,
        request: &NotarizationSessionRequest,
    ) -> Result<NotarizationSessionResponse, ClientError> {
        Ok(NotarizationSessionResponse {
            session_id: format!(
                "session-{}-{}",
                request.max_sent_data.unwrap_or_default(),
                request.max_recv_data.unwrap_or_default()
            ),
        })
    }
}

/// Returns a notary signing with the notary key fixture.
pub fn notary() -> Notary {
    Notary::new(attestation_config(), notary_provider())
}

/// Returns an engine config using the in-memory connectors and notary API.
pub fn engine_config() -> EngineConfig {
    EngineConfig::builder()
        .server_connector(Arc::new(MemoryServerConnector))
        .notary_connector(Arc::new(MemoryNotaryConnector::default()))
        .notary_api(Arc::new(MemoryNotaryApi))
        .build()
        .expect("fixture engine config is valid")
}

/// Returns a description of a GET request for the widget API.
pub fn widget_request() -> HttpRequest {
    HttpRequest {
        url: WIDGET_URL.to_string(),
        method: Method::GET,
        headers: [(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]
        .into(),
        body: None,
    }
}
