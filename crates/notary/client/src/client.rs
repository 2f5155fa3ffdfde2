//! Notary HTTP client.
//!
//! This module sets up connections to a notary via TCP or TLS and calls its
//! `/info` and `/session` endpoints.

use async_trait::async_trait;
use disclosure_notary_common::{
    InfoResponse, NotarizationSessionRequest, NotarizationSessionResponse, X_API_KEY_HEADER,
};
use http_body_util::{BodyExt as _, Either, Empty, Full};
use hyper::{body::Bytes, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::{
    io::Error as IoError,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
    time::{timeout, Duration},
};
use tokio_rustls::{
    client::TlsStream,
    rustls::{self, ClientConfig, OwnedTrustAnchor, RootCertStore},
    TlsConnector,
};
use tracing::{debug, error};

use crate::{
    error::{ClientError, ErrorKind},
    url::NotaryUrl,
    NotaryApi,
};

/// A notary connection.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum NotaryConnection {
    /// Unencrypted TCP connection.
    Tcp(TcpStream),
    /// TLS connection.
    Tls(TlsStream<TcpStream>),
}

impl AsyncRead for NotaryConnection {
    #[inline]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<(), IoError>> {
        match self.get_mut() {
            NotaryConnection::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            NotaryConnection::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NotaryConnection {
    #[inline]
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, IoError>> {
        match self.get_mut() {
            NotaryConnection::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            NotaryConnection::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    #[inline]
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        match self.get_mut() {
            NotaryConnection::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            NotaryConnection::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    #[inline]
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        match self.get_mut() {
            NotaryConnection::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            NotaryConnection::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// [`NotaryApi`] implementation calling a notary over HTTP(S).
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(build_fn(error = "ClientError"))]
pub struct HttpNotaryApi {
    /// Root certificate store used for establishing TLS connections with the
    /// notary.
    #[builder(default = "default_root_store()")]
    root_cert_store: RootCertStore,
    /// API key used to call notary endpoints if whitelisting is enabled on the
    /// notary.
    #[builder(setter(into, strip_option), default)]
    api_key: Option<String>,
    /// The duration of each request timeout in seconds.
    #[builder(default = "60")]
    request_timeout: u64,
}

impl Default for HttpNotaryApi {
    fn default() -> Self {
        Self {
            root_cert_store: default_root_store(),
            api_key: None,
            request_timeout: 60,
        }
    }
}

impl HttpNotaryApi {
    /// Creates a new builder for `HttpNotaryApi`.
    pub fn builder() -> HttpNotaryApiBuilder {
        HttpNotaryApiBuilder::default()
    }

    /// Opens a TCP or TLS connection to the notary.
    async fn connect(&self, url: &NotaryUrl) -> Result<NotaryConnection, ClientError> {
        let socket = TcpStream::connect((url.host(), url.port()))
            .await
            .map_err(|err| ClientError::new(ErrorKind::Connection, Some(Box::new(err))))?;

        if !url.is_tls() {
            debug!("Set up tcp connection to notary");
            return Ok(NotaryConnection::Tcp(socket));
        }

        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(self.root_cert_store.clone())
            .with_no_client_auth();

        let server_name = url.host().try_into().map_err(|err| {
            error!("Failed to parse notary DNS name: {:?}", url.host());
            ClientError::new(ErrorKind::TlsSetup, Some(Box::new(err)))
        })?;

        let stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, socket)
            .await
            .map_err(|err| {
                if is_tls_mismatch_error(&err) {
                    error!("Perhaps the notary is not accepting our TLS connection");
                }
                ClientError::new(ErrorKind::TlsSetup, Some(Box::new(err)))
            })?;

        debug!("Set up tls connection to notary");

        Ok(NotaryConnection::Tls(stream))
    }

    /// Sends a single request to the notary and parses the JSON response.
    async fn call<T: DeserializeOwned>(
        &self,
        url: &NotaryUrl,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<T, ClientError> {
        let fut = async {
            let connection = self.connect(url).await?;

            let (mut request_sender, connection) =
                hyper::client::conn::http1::handshake(TokioIo::new(connection))
                    .await
                    .map_err(|err| {
                        error!("Failed to attach http client to notary socket");
                        ClientError::new(ErrorKind::Connection, Some(Box::new(err)))
                    })?;

            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    debug!("notary connection closed with error: {err}");
                }
            });

            let mut builder = Request::builder()
                .uri(url.endpoint(path))
                .method(method)
                .header("Host", url.host())
                .header("Connection", "close");

            if let Some(api_key) = &self.api_key {
                builder = builder.header(X_API_KEY_HEADER, api_key);
            }

            let request = match body {
                Some(body) => builder
                    // Need to specify application/json for axum to parse it as json.
                    .header("Content-Type", "application/json")
                    .body(Either::Left(Full::new(Bytes::from(body)))),
                None => builder.body(Either::Right(Empty::<Bytes>::new())),
            }
            .map_err(|err| {
                error!("Failed to build http request");
                ClientError::new(ErrorKind::Internal, Some(Box::new(err)))
            })?;

            debug!("Sending request: {:?}", request);

            let response = request_sender.send_request(request).await.map_err(|err| {
                error!("Failed to send http request");
                ClientError::new(ErrorKind::Http, Some(Box::new(err)))
            })?;

            if response.status() != StatusCode::OK {
                let msg = format!(
                    "{method} {path} response status is not OK: {}",
                    response.status()
                );
                return Err(ClientError::new(ErrorKind::Http, Some(msg.into())));
            }

            let payload = response
                .into_body()
                .collect()
                .await
                .map_err(|err| {
                    error!("Failed to read response body");
                    ClientError::new(ErrorKind::Http, Some(Box::new(err)))
                })?
                .to_bytes();

            serde_json::from_slice::<T>(&payload).map_err(|err| {
                error!("Failed to parse response payload");
                ClientError::new(ErrorKind::Http, Some(Box::new(err)))
            })
        };

        timeout(Duration::from_secs(self.request_timeout), fut)
            .await
            .map_err(|_| {
                ClientError::new(
                    ErrorKind::Timeout,
                    Some(format!("{method} {path} timed out").into()),
                )
            })?
    }
}

#[async_trait]
impl NotaryApi for HttpNotaryApi {
    async fn info(&self, url: &NotaryUrl) -> Result<InfoResponse, ClientError> {
        self.call(url, "GET", "/info", None).await
    }

    async fn session(
        &self,
        url: &NotaryUrl,
        request: &NotarizationSessionRequest,
    ) -> Result<NotarizationSessionResponse, ClientError> {
        let payload = serde_json::to_string(request).map_err(|err| {
            error!("Failed to serialise http request for configuration");
            ClientError::new(ErrorKind::Internal, Some(Box::new(err)))
        })?;

        self.call(url, "POST", "/session", Some(payload)).await
    }
}

/// Default root store using mozilla certs.
pub fn default_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject.as_ref(),
            ta.subject_public_key_info.as_ref(),
            ta.name_constraints.as_ref().map(|nc| nc.as_ref()),
        )
    }));

    root_store
}

// Checks whether the error is potentially related to a mismatch in TLS
// configuration between the client and the server.
fn is_tls_mismatch_error(err: &std::io::Error) -> bool {
    if let Some(rustls::Error::InvalidMessage(rustls::InvalidMessage::InvalidContentType)) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return true;
    }
    false
}
