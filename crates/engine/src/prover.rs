//! The prover: captures an HTTP exchange and obtains an attestation for it.

use std::sync::PoisonError;

use disclosure_core::{
    commit::Commit,
    request::AttestationRequest,
    transcript::{CapturedTranscript, Transcript},
};
use http::{header, HeaderName, HeaderValue, Uri};
use http_body_util::{BodyExt as _, Full};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tracing::{debug, info, info_span, instrument, Instrument as _, Span};

use crate::{
    config::{EngineConfig, ProverConfig},
    connector::NotarySession,
    io::RecordingIo,
    msg::{HttpRequest, HttpResponse, NotarizationOutput},
    EngineError, EngineErrorKind,
};

enum State {
    Initialized,
    Setup {
        notary: Box<dyn NotarySession>,
    },
    Closed {
        notary: Box<dyn NotarySession>,
        transcript: CapturedTranscript,
    },
    Complete,
    Error,
}

impl State {
    fn take(&mut self) -> Self {
        std::mem::replace(self, State::Error)
    }

    fn name(&self) -> &'static str {
        match self {
            State::Initialized => "initialized",
            State::Setup { .. } => "setup",
            State::Closed { .. } => "closed",
            State::Complete => "complete",
            State::Error => "error",
        }
    }
}

/// A prover hosted by the engine.
///
/// A failed operation leaves the prover in an error state from which no
/// further operation succeeds.
pub(crate) struct Prover {
    config: ProverConfig,
    span: Span,
    state: State,
}

impl Prover {
    pub(crate) fn new(config: ProverConfig) -> Self {
        let span = info_span!("prover", server_name = %config.server_name());
        Self {
            config,
            span,
            state: State::Initialized,
        }
    }

    /// Restores `state` and returns an error for an operation which is not
    /// valid in it.
    fn unexpected_state(&mut self, state: State, operation: &str) -> EngineError {
        let err = EngineError::state(format!("can not {operation} in {} state", state.name()));
        self.state = state;
        err
    }

    /// Links the prover to a notarization session.
    #[instrument(parent = &self.span, level = "debug", skip_all, err)]
    pub(crate) async fn setup(
        &mut self,
        engine: &EngineConfig,
        session_url: &str,
    ) -> Result<(), EngineError> {
        match self.state.take() {
            State::Initialized => {}
            state => return Err(self.unexpected_state(state, "set up")),
        }

        let notary = engine.notary_connector().connect(session_url).await?;

        info!("linked to notary");

        self.state = State::Setup { notary };

        Ok(())
    }

    /// Sends the request to the server and captures the transcript of the
    /// exchange.
    #[instrument(parent = &self.span, level = "debug", skip_all, err)]
    pub(crate) async fn send_request(
        &mut self,
        engine: &EngineConfig,
        websocket_proxy_url: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, EngineError> {
        let notary = match self.state.take() {
            State::Setup { notary } => notary,
            state => return Err(self.unexpected_state(state, "send a request")),
        };

        let uri: Uri = request.url.parse().map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid request url", err)
        })?;

        let host = uri.host().ok_or_else(|| {
            EngineError::config(format!("request url has no host: {}", request.url))
        })?;
        if host != self.config.server_name().as_str() {
            return Err(EngineError::config(format!(
                "request host {host} does not match server name {}",
                self.config.server_name()
            )));
        }
        let port = uri.port_u16().unwrap_or(443);

        let io = engine
            .server_connector()
            .connect(websocket_proxy_url, self.config.server_name(), port)
            .await?;

        info!("connected to server");

        let io = RecordingIo::new(
            io,
            self.config.max_sent_data(),
            self.config.max_recv_data(),
        );
        let recording = io.recording();

        let result = exchange(TokioIo::new(io), &uri, request)
            .instrument(self.span.clone())
            .await;

        let recording = std::mem::take(
            &mut *recording
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        if recording.limit_exceeded {
            return Err(EngineError::new(
                EngineErrorKind::Limit,
                format!(
                    "transcript exceeds limits of {} sent and {} received bytes",
                    self.config.max_sent_data(),
                    self.config.max_recv_data()
                ),
            ));
        }

        let response = result?;

        info!(
            status = response.status,
            sent = recording.sent.len(),
            received = recording.received.len(),
            "response received"
        );

        let transcript =
            CapturedTranscript::new(Transcript::new(recording.sent, recording.received));

        self.state = State::Closed { notary, transcript };

        Ok(response)
    }

    /// Returns the captured transcript.
    pub(crate) fn transcript(&self) -> Result<&CapturedTranscript, EngineError> {
        match &self.state {
            State::Closed { transcript, .. } => Ok(transcript),
            state => Err(EngineError::state(format!(
                "can not read the transcript in {} state",
                state.name()
            ))),
        }
    }

    /// Commits to the transcript and requests an attestation from the notary.
    #[instrument(parent = &self.span, level = "debug", skip_all, err)]
    pub(crate) async fn notarize(
        &mut self,
        engine: &EngineConfig,
        commit: Commit,
    ) -> Result<NotarizationOutput, EngineError> {
        let (notary, transcript) = match self.state.take() {
            State::Closed { notary, transcript } => (notary, transcript),
            state => return Err(self.unexpected_state(state, "notarize")),
        };

        let transcript = transcript.into_transcript();

        commit.validate_bounds(&transcript.length()).map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Notarization,
                "commit does not fit the transcript",
                err,
            )
        })?;

        let (request, secrets) = AttestationRequest::builder()
            .server_name(self.config.server_name().clone())
            .signature_alg(self.config.signature_alg())
            .transcript(transcript)
            .commit(commit)
            .build()
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Notarization,
                    "failed to build attestation request",
                    err,
                )
            })?;

        debug!(
            commitments = request.plaintext_hashes().len(),
            "requesting attestation"
        );

        let attestation = notary.notarize(request.clone()).await?;

        // Check the attestation is consistent with the Prover's view.
        request
            .validate(&attestation, engine.crypto_provider())
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Notarization,
                    "attestation is inconsistent with the request",
                    err,
                )
            })?;

        info!("notarization complete");

        self.state = State::Complete;

        Ok(NotarizationOutput {
            attestation,
            secrets,
        })
    }
}

/// Runs a single HTTP/1.1 exchange over `io`.
async fn exchange<T>(io: T, uri: &Uri, request: HttpRequest) -> Result<HttpResponse, EngineError>
where
    T: hyper::rt::Read + hyper::rt::Write + Send + Unpin + 'static,
{
    let (mut request_sender, connection) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|err| {
            EngineError::with_source(EngineErrorKind::Http, "http handshake failed", err)
        })?;

    let connection = tokio::spawn(connection);

    let request = build_request(uri, request)?;

    debug!("sending request: {:?}", request);

    let response = request_sender.send_request(request).await.map_err(|err| {
        EngineError::with_source(EngineErrorKind::Http, "failed to send request", err)
    })?;

    let (parts, body) = response.into_parts();

    // Read the body to the end so that it is part of the transcript.
    body.collect().await.map_err(|err| {
        EngineError::with_source(EngineErrorKind::Http, "failed to read body", err)
    })?;

    drop(request_sender);
    match connection.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!("connection closed with error: {err}"),
        Err(err) => debug!("connection task failed: {err}"),
    }

    Ok(HttpResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.as_bytes().to_vec()))
            .collect(),
    })
}

fn build_request(
    uri: &Uri,
    request: HttpRequest,
) -> Result<hyper::Request<Full<Bytes>>, EngineError> {
    let path = uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");

    let mut builder = hyper::Request::builder()
        .uri(path)
        .method(http::Method::from(request.method));

    let headers = builder
        .headers_mut()
        .ok_or_else(|| EngineError::config("invalid request description"))?;

    for (name, value) in &request.headers {
        let name = HeaderName::try_from(name.as_str()).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid header name", err)
        })?;
        let value = HeaderValue::try_from(value.as_str()).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid header value", err)
        })?;
        headers.insert(name, value);
    }

    if !headers.contains_key(header::HOST) {
        let host = uri
            .authority()
            .ok_or_else(|| EngineError::config("request url has no authority"))?;
        let host = HeaderValue::try_from(host.as_str()).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid host", err)
        })?;
        headers.insert(header::HOST, host);
    }

    // The connection carries a single exchange.
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

    // Compression would hide the plaintext from the transcript index.
    headers
        .entry(header::ACCEPT_ENCODING)
        .or_insert(HeaderValue::from_static("identity"));

    let body = Full::new(Bytes::from(request.body.unwrap_or_default()));

    builder.body(body).map_err(|err| {
        EngineError::with_source(EngineErrorKind::Config, "invalid request description", err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(url: &str) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            headers: [("Content-Type".to_string(), "application/json".to_string())].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request_adds_headers() {
        let uri: Uri = "https://example.test/api/widget?id=1".parse().unwrap();
        let request =
            build_request(&uri, describe("https://example.test/api/widget?id=1")).unwrap();

        assert_eq!(request.uri(), "/api/widget?id=1");
        assert_eq!(*request.method(), http::Method::GET);
        assert_eq!(request.headers()[header::HOST], "example.test");
        assert_eq!(request.headers()[header::CONNECTION], "close");
        assert_eq!(request.headers()[header::ACCEPT_ENCODING], "identity");
        assert_eq!(request.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_build_request_keeps_host() {
        let uri: Uri = "https://example.test:8443/".parse().unwrap();
        let mut description = describe("https://example.test:8443/");
        description
            .headers
            .insert("host".to_string(), "example.test".to_string());

        let request = build_request(&uri, description).unwrap();

        assert_eq!(request.headers()[header::HOST], "example.test");
    }

    #[test]
    fn test_build_request_invalid_header() {
        let uri: Uri = "https://example.test/".parse().unwrap();
        let mut description = describe("https://example.test/");
        description
            .headers
            .insert("bad header".to_string(), "x".to_string());

        let err = build_request(&uri, description).unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Config);
    }
}
