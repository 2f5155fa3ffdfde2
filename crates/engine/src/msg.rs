//! Messages exchanged with the engine.
//!
//! Every operation of the engine is expressed as a [`Request`] answered by a
//! [`Response`]. Both are plain data so that they can be carried across an
//! execution boundary.

use std::{collections::BTreeMap, fmt};

use disclosure_core::{
    attestation::Attestation,
    commit::Commit,
    presentation::{Presentation, PresentationMeta},
    secrets::Secrets,
    signing::VerifyingKey,
    transcript::CapturedTranscript,
    verification::VerificationResult,
};
use serde::{Deserialize, Serialize};

use crate::config::ProverConfig;

/// Identifies a prover hosted by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProverId(pub u64);

impl fmt::Display for ProverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prover-{}", self.0)
    }
}

/// HTTP method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for http::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::PATCH => http::Method::PATCH,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(format!("unsupported http method: {s}")),
        }
    }
}

/// Description of the HTTP request sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Target URL, e.g. `https://example.com/api/widget`.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Header mapping.
    pub headers: BTreeMap<String, String>,
    /// Optional body, sent verbatim.
    pub body: Option<Vec<u8>>,
}

/// The head of the HTTP response received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers, in the order received.
    pub headers: Vec<(String, Vec<u8>)>,
}

/// Output of notarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotarizationOutput {
    /// The attestation issued by the notary.
    pub attestation: Attestation,
    /// The prover's secrets for the attestation.
    pub secrets: Secrets,
}

/// A request to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Initializes the engine.
    Init,
    /// Creates a prover, returning its id.
    CreateProver(ProverConfig),
    /// Requests a notarization session, returning its WebSocket URL.
    NotarySession {
        /// Base URL of the notary.
        notary_url: String,
        /// Maximum number of bytes sent to the server.
        max_sent_data: usize,
        /// Maximum number of bytes received from the server.
        max_recv_data: usize,
    },
    /// Links the prover to a notary session.
    Setup {
        /// The prover.
        prover: ProverId,
        /// WebSocket URL of the notarization session.
        session_url: String,
    },
    /// Sends the HTTP request through the WebSocket proxy.
    SendRequest {
        /// The prover.
        prover: ProverId,
        /// WebSocket proxy URL.
        websocket_proxy_url: String,
        /// The request to send.
        request: HttpRequest,
    },
    /// Returns the captured transcript.
    Transcript {
        /// The prover.
        prover: ProverId,
    },
    /// Commits to the transcript and requests an attestation.
    Notarize {
        /// The prover.
        prover: ProverId,
        /// The ranges to commit.
        commit: Commit,
    },
    /// Releases the prover.
    DropProver {
        /// The prover.
        prover: ProverId,
    },
    /// Builds a presentation from notarization outputs.
    BuildPresentation {
        /// The attestation.
        attestation: Attestation,
        /// The secrets.
        secrets: Secrets,
        /// The ranges to disclose.
        commit: Commit,
        /// Presentation metadata.
        meta: PresentationMeta,
    },
    /// Verifies a serialized presentation.
    Verify {
        /// The presentation, in byte form.
        presentation: Vec<u8>,
        /// The notary's public key.
        notary_key: VerifyingKey,
    },
}

impl Request {
    /// Returns the name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Init => "init",
            Request::CreateProver(_) => "create_prover",
            Request::NotarySession { .. } => "notary_session",
            Request::Setup { .. } => "setup",
            Request::SendRequest { .. } => "send_request",
            Request::Transcript { .. } => "transcript",
            Request::Notarize { .. } => "notarize",
            Request::DropProver { .. } => "drop_prover",
            Request::BuildPresentation { .. } => "build_presentation",
            Request::Verify { .. } => "verify",
        }
    }
}

/// A response of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Response {
    Initialized,
    ProverCreated(ProverId),
    NotarySession(String),
    SetupComplete,
    HttpResponse(HttpResponse),
    Transcript(CapturedTranscript),
    Notarized(NotarizationOutput),
    ProverDropped,
    Presentation(Presentation),
    Verified(VerificationResult),
}

impl Response {
    /// Returns the name of the response variant.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Initialized => "initialized",
            Response::ProverCreated(_) => "prover_created",
            Response::NotarySession(_) => "notary_session",
            Response::SetupComplete => "setup_complete",
            Response::HttpResponse(_) => "http_response",
            Response::Transcript(_) => "transcript",
            Response::Notarized(_) => "notarized",
            Response::ProverDropped => "prover_dropped",
            Response::Presentation(_) => "presentation",
            Response::Verified(_) => "verified",
        }
    }
}
