//! Connections to the server and to the notary.
//!
//! The engine does not open sockets itself. A [`ServerConnector`] supplies the
//! plaintext stream to the server, and a [`NotaryConnector`] links the prover
//! to a notarization session.

mod ws;

use async_trait::async_trait;
use disclosure_core::{
    attestation::Attestation, connection::ServerName, request::AttestationRequest,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::EngineError;

pub use ws::{WsNotaryConnector, WsNotarySession, WsProxyConnector};

/// A plaintext byte stream to the server.
pub trait ServerIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ServerIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Opens connections to servers.
#[async_trait]
pub trait ServerConnector: Send + Sync {
    /// Connects to `server_name:port` through the WebSocket proxy at
    /// `proxy_url`, returning a stream carrying application data in
    /// plaintext.
    async fn connect(
        &self,
        proxy_url: &str,
        server_name: &ServerName,
        port: u16,
    ) -> Result<Box<dyn ServerIo>, EngineError>;
}

/// Links provers to notarization sessions.
#[async_trait]
pub trait NotaryConnector: Send + Sync {
    /// Joins the notarization session at `session_url`.
    async fn connect(&self, session_url: &str) -> Result<Box<dyn NotarySession>, EngineError>;
}

/// A notarization session joined by a prover.
#[async_trait]
pub trait NotarySession: Send {
    /// Sends the attestation request and returns the notary's attestation.
    async fn notarize(
        self: Box<Self>,
        request: AttestationRequest,
    ) -> Result<Attestation, EngineError>;
}
