use std::sync::Arc;

use async_trait::async_trait;
use async_tungstenite::{tungstenite::Message, WebSocketStream};
use disclosure_core::{
    attestation::Attestation, connection::ServerName, request::AttestationRequest,
};
use disclosure_notary_client::default_root_store;
use futures::{AsyncRead, AsyncWrite, StreamExt as _};
use http::Uri;
use tokio::net::TcpStream;
use tokio_rustls::{
    client::TlsStream,
    rustls::{self, ClientConfig, RootCertStore},
    TlsConnector,
};
use tokio_util::{compat::FuturesAsyncReadCompatExt, either::Either};
use tracing::debug;
use ws_stream_tungstenite::WsStream;

use super::{NotaryConnector, NotarySession, ServerConnector, ServerIo};
use crate::{EngineError, EngineErrorKind};

type Transport = Either<TcpStream, TlsStream<TcpStream>>;

/// Connects to servers through a WebSocket proxy, and establishes TLS with
/// the server over the proxied connection.
#[derive(Clone)]
pub struct WsProxyConnector {
    tls_config: Arc<ClientConfig>,
}

opaque_debug::implement!(WsProxyConnector);

impl WsProxyConnector {
    /// Creates a new connector trusting the given root certificates.
    pub fn new(root_store: RootCertStore) -> Self {
        Self {
            tls_config: Arc::new(tls_config(root_store)),
        }
    }
}

impl Default for WsProxyConnector {
    fn default() -> Self {
        Self::new(default_root_store())
    }
}

#[async_trait]
impl ServerConnector for WsProxyConnector {
    async fn connect(
        &self,
        proxy_url: &str,
        server_name: &ServerName,
        _port: u16,
    ) -> Result<Box<dyn ServerIo>, EngineError> {
        let transport = open_transport(proxy_url, &self.tls_config).await?;
        let (ws, _) = async_tungstenite::tokio::client_async(proxy_url, transport)
            .await
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Connection,
                    "websocket handshake with proxy failed",
                    err,
                )
            })?;

        debug!("connected to websocket proxy");

        let tls_name = rustls::ServerName::try_from(server_name.as_str()).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid server name", err)
        })?;

        let conn = TlsConnector::from(self.tls_config.clone())
            .connect(tls_name, WsStream::new(ws).compat())
            .await
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Connection,
                    "tls handshake with server failed",
                    err,
                )
            })?;

        debug!("established tls with server");

        Ok(Box::new(conn))
    }
}

/// Joins notarization sessions over WebSocket.
#[derive(Clone)]
pub struct WsNotaryConnector {
    tls_config: Arc<ClientConfig>,
}

opaque_debug::implement!(WsNotaryConnector);

impl WsNotaryConnector {
    /// Creates a new connector trusting the given root certificates.
    pub fn new(root_store: RootCertStore) -> Self {
        Self {
            tls_config: Arc::new(tls_config(root_store)),
        }
    }
}

impl Default for WsNotaryConnector {
    fn default() -> Self {
        Self::new(default_root_store())
    }
}

#[async_trait]
impl NotaryConnector for WsNotaryConnector {
    async fn connect(&self, session_url: &str) -> Result<Box<dyn NotarySession>, EngineError> {
        let transport = open_transport(session_url, &self.tls_config).await?;
        let (ws, _) = async_tungstenite::tokio::client_async(session_url, transport)
            .await
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Connection,
                    "websocket handshake with notary failed",
                    err,
                )
            })?;

        debug!("joined notarization session");

        Ok(Box::new(WsNotarySession::new(ws)))
    }
}

/// A notarization session over WebSocket.
///
/// The attestation request and the attestation are each carried in a single
/// binary message, encoded with bincode.
pub struct WsNotarySession<S> {
    ws: WebSocketStream<S>,
}

impl<S> WsNotarySession<S> {
    /// Creates a session over an established WebSocket.
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl<S> NotarySession for WsNotarySession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn notarize(
        mut self: Box<Self>,
        request: AttestationRequest,
    ) -> Result<Attestation, EngineError> {
        let payload = bincode::serialize(&request).map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Notarization,
                "failed to encode attestation request",
                err,
            )
        })?;

        debug!("sending attestation request");

        self.ws.send(Message::binary(payload)).await.map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Connection,
                "failed to send attestation request",
                err,
            )
        })?;

        let attestation: Result<Attestation, String> = loop {
            match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => {
                    break bincode::deserialize(&data).map_err(|err| {
                        EngineError::with_source(
                            EngineErrorKind::Notarization,
                            "malformed notary response",
                            err,
                        )
                    })?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(EngineError::new(
                        EngineErrorKind::Connection,
                        "notary closed the session before attesting",
                    ))
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return Err(EngineError::with_source(
                        EngineErrorKind::Connection,
                        "failed to receive attestation",
                        err,
                    ))
                }
            }
        };

        // Closing is best effort, the attestation has been received.
        _ = self.ws.close(None).await;

        attestation.map_err(|msg| EngineError::new(EngineErrorKind::Notarization, msg))
    }
}

/// Opens a TCP connection to the host of a `ws://` or `wss://` URL, with TLS
/// for the latter.
async fn open_transport(
    url: &str,
    tls_config: &Arc<ClientConfig>,
) -> Result<Transport, EngineError> {
    let uri: Uri = url.parse().map_err(|err| {
        EngineError::with_source(EngineErrorKind::Config, "invalid websocket url", err)
    })?;

    let tls = match uri.scheme_str() {
        Some("wss") => true,
        Some("ws") => false,
        _ => {
            return Err(EngineError::config(format!(
                "unsupported websocket url scheme: {url}"
            )))
        }
    };

    let host = uri
        .host()
        .ok_or_else(|| EngineError::config(format!("websocket url has no host: {url}")))?;
    let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });

    let socket = TcpStream::connect((host, port)).await.map_err(|err| {
        EngineError::with_source(
            EngineErrorKind::Connection,
            &format!("failed to connect to {host}:{port}"),
            err,
        )
    })?;

    if !tls {
        return Ok(Either::Left(socket));
    }

    let name = rustls::ServerName::try_from(host).map_err(|err| {
        EngineError::with_source(EngineErrorKind::Config, "invalid host name", err)
    })?;

    let conn = TlsConnector::from(tls_config.clone())
        .connect(name, socket)
        .await
        .map_err(|err| {
            EngineError::with_source(EngineErrorKind::Connection, "tls setup failed", err)
        })?;

    Ok(Either::Right(conn))
}

fn tls_config(root_store: RootCertStore) -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}
