//! The notarization engine.
//!
//! An [`Engine`] hosts provers and performs the heavy operations of the
//! workflow: requesting notarization sessions, capturing an HTTP exchange
//! with the server, obtaining an attestation from the notary, building
//! presentations and verifying them.
//! Every operation is a [`Request`] answered by a [`Response`], both plain
//! serializable data, so the engine can run in an isolated execution context.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connector;
mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod io;
pub mod msg;
mod notary;
mod prover;

use std::collections::HashMap;

use disclosure_core::{
    attestation::Attestation,
    commit::Commit,
    presentation::{Presentation, PresentationMeta},
    secrets::Secrets,
    signing::VerifyingKey,
    verification::VerificationResult,
};
use disclosure_notary_client::{request_session_url, NotaryUrl};
use tracing::{debug, info, instrument};

pub use config::{EngineConfig, ProverConfig, ProverConfigBuilder};
pub use error::{EngineError, EngineErrorKind};
pub use msg::{HttpRequest, HttpResponse, Method, NotarizationOutput, ProverId, Request, Response};
pub use notary::Notary;

use prover::Prover;

/// The notarization engine.
pub struct Engine {
    config: EngineConfig,
    initialized: bool,
    provers: HashMap<ProverId, Prover>,
    next_id: u64,
}

opaque_debug::implement!(Engine);

impl Engine {
    /// Creates a new engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            initialized: false,
            provers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Handles a request.
    #[instrument(level = "debug", skip_all, fields(op = request.name()), err)]
    pub async fn handle(&mut self, request: Request) -> Result<Response, EngineError> {
        if let Request::Init = request {
            if !self.initialized {
                self.initialized = true;
                info!("engine initialized");
            }
            return Ok(Response::Initialized);
        }

        if !self.initialized {
            return Err(EngineError::new(
                EngineErrorKind::Uninitialized,
                "engine must be initialized first",
            ));
        }

        match request {
            Request::Init => Ok(Response::Initialized),
            Request::CreateProver(config) => {
                let id = ProverId(self.next_id);
                self.next_id += 1;
                self.provers.insert(id, Prover::new(config));

                debug!(%id, "created prover");

                Ok(Response::ProverCreated(id))
            }
            Request::NotarySession {
                notary_url,
                max_sent_data,
                max_recv_data,
            } => self
                .notary_session(&notary_url, max_sent_data, max_recv_data)
                .await
                .map(Response::NotarySession),
            Request::Setup {
                prover,
                session_url,
            } => {
                let config = &self.config;
                get_prover(&mut self.provers, prover)?
                    .setup(config, &session_url)
                    .await?;

                Ok(Response::SetupComplete)
            }
            Request::SendRequest {
                prover,
                websocket_proxy_url,
                request,
            } => {
                let config = &self.config;
                let response = get_prover(&mut self.provers, prover)?
                    .send_request(config, &websocket_proxy_url, request)
                    .await?;

                Ok(Response::HttpResponse(response))
            }
            Request::Transcript { prover } => {
                let transcript = get_prover(&mut self.provers, prover)?.transcript()?;

                Ok(Response::Transcript(transcript.clone()))
            }
            Request::Notarize { prover, commit } => {
                let config = &self.config;
                let output = get_prover(&mut self.provers, prover)?
                    .notarize(config, commit)
                    .await?;

                Ok(Response::Notarized(output))
            }
            Request::DropProver { prover } => {
                self.provers.remove(&prover);

                debug!(%prover, "dropped prover");

                Ok(Response::ProverDropped)
            }
            Request::BuildPresentation {
                attestation,
                secrets,
                commit,
                meta,
            } => build_presentation(&attestation, &secrets, commit, meta)
                .map(Response::Presentation),
            Request::Verify {
                presentation,
                notary_key,
            } => self
                .verify(&presentation, &notary_key)
                .map(Response::Verified),
        }
    }

    async fn notary_session(
        &self,
        notary_url: &str,
        max_sent_data: usize,
        max_recv_data: usize,
    ) -> Result<String, EngineError> {
        let url = NotaryUrl::parse(notary_url).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Config, "invalid notary url", err)
        })?;

        let session_url = request_session_url(
            self.config.notary_api(),
            &url,
            max_sent_data,
            max_recv_data,
        )
        .await
        .map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Connection,
                "failed to request a notarization session",
                err,
            )
        })?;

        debug!(session_url, "notarization session requested");

        Ok(session_url)
    }

    fn verify(
        &self,
        presentation: &[u8],
        notary_key: &VerifyingKey,
    ) -> Result<VerificationResult, EngineError> {
        let presentation = Presentation::from_bytes(presentation).map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Verification,
                "malformed presentation",
                err,
            )
        })?;

        let result = presentation
            .verify(self.config.crypto_provider(), notary_key)
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Verification,
                    "presentation did not verify",
                    err,
                )
            })?;

        info!(server_name = %result.server_name, "presentation verified");

        Ok(result)
    }
}

fn get_prover(
    provers: &mut HashMap<ProverId, Prover>,
    id: ProverId,
) -> Result<&mut Prover, EngineError> {
    provers
        .get_mut(&id)
        .ok_or_else(|| EngineError::state(format!("unknown {id}")))
}

fn build_presentation(
    attestation: &Attestation,
    secrets: &Secrets,
    commit: Commit,
    meta: PresentationMeta,
) -> Result<Presentation, EngineError> {
    let mut builder = Presentation::builder(attestation, secrets);
    builder.commit(commit).meta(meta);

    builder.build().map_err(|err| {
        EngineError::with_source(
            EngineErrorKind::Presentation,
            "failed to build presentation",
            err,
        )
    })
}
