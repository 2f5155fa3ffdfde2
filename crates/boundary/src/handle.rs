use disclosure_core::{commit::Commit, transcript::CapturedTranscript};
use disclosure_engine::{HttpRequest, HttpResponse, NotarizationOutput, ProverId, Request, Response};

use crate::{expect_response, CallError, ExecutionBoundary};

/// Capability handle to a prover hosted in an execution context.
///
/// The handle carries only the prover's id. Every operation is a call across
/// the boundary.
#[derive(Debug, Clone)]
pub struct ProverHandle {
    id: ProverId,
    boundary: ExecutionBoundary,
}

impl ProverHandle {
    pub(crate) fn new(id: ProverId, boundary: ExecutionBoundary) -> Self {
        Self { id, boundary }
    }

    /// Returns the id of the prover.
    pub fn id(&self) -> ProverId {
        self.id
    }

    /// Links the prover to the notarization session at `session_url`.
    pub async fn setup(&self, session_url: &str) -> Result<(), CallError> {
        let response = self
            .boundary
            .call(Request::Setup {
                prover: self.id,
                session_url: session_url.to_string(),
            })
            .await?;

        expect_response!(response, Response::SetupComplete => ())
    }

    /// Sends the request to the server through the WebSocket proxy.
    pub async fn send_request(
        &self,
        websocket_proxy_url: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, CallError> {
        let response = self
            .boundary
            .call(Request::SendRequest {
                prover: self.id,
                websocket_proxy_url: websocket_proxy_url.to_string(),
                request,
            })
            .await?;

        expect_response!(response, Response::HttpResponse(response) => response)
    }

    /// Returns the captured transcript.
    pub async fn transcript(&self) -> Result<CapturedTranscript, CallError> {
        let response = self
            .boundary
            .call(Request::Transcript { prover: self.id })
            .await?;

        expect_response!(response, Response::Transcript(transcript) => transcript)
    }

    /// Notarizes the transcript, committing to the ranges of `commit`.
    pub async fn notarize(&self, commit: Commit) -> Result<NotarizationOutput, CallError> {
        let response = self
            .boundary
            .call(Request::Notarize {
                prover: self.id,
                commit,
            })
            .await?;

        expect_response!(response, Response::Notarized(output) => output)
    }

    /// Releases the prover.
    pub async fn close(self) -> Result<(), CallError> {
        let response = self
            .boundary
            .call(Request::DropProver { prover: self.id })
            .await?;

        expect_response!(response, Response::ProverDropped => ())
    }
}
