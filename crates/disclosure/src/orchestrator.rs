use disclosure_boundary::{BoundaryErrorKind, CallError, ExecutionBoundary};
use disclosure_core::{presentation::Presentation, verification::VerificationResult};
use disclosure_engine::{Engine, EngineConfig, ProverConfig};
use tracing::{debug, info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::{
    error::{ErrorKind, NotarizationError},
    options::NotarizeOptions,
    presentation::PresentationBuilder,
    selector::TranscriptSelector,
    state::{NotarizationSession, SessionObserver},
    verifier::{Verifier, VerifyError},
    SessionState,
};

/// Output of a successful notarization session.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    /// Id of the session.
    pub session_id: Uuid,
    /// The presentation of the disclosed ranges.
    pub presentation: Presentation,
    /// The result of verifying the presentation.
    pub result: VerificationResult,
}

/// Drives notarization sessions from start to verification.
///
/// Every session runs against a fresh engine in its own execution context,
/// which is torn down when the session ends. Sessions therefore never share
/// engine state, and an orchestrator can run any number of them
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct SessionOrchestrator {
    engine_config: EngineConfig,
}

impl SessionOrchestrator {
    /// Creates an orchestrator whose sessions run engines with the given
    /// configuration.
    pub fn new(engine_config: EngineConfig) -> Self {
        Self { engine_config }
    }

    /// Notarizes the request of `options`, then verifies the presentation of
    /// the selected ranges.
    ///
    /// Returns the verification result, or an error identifying the stage
    /// which failed. Nothing is retried.
    pub async fn notarize(
        &self,
        options: &NotarizeOptions,
    ) -> Result<VerificationResult, NotarizationError> {
        self.notarize_with_observer(options, &mut |_: Uuid, _: SessionState| {})
            .await
    }

    /// Like [`notarize`](Self::notarize), reporting every state transition of
    /// the session to `observer`.
    pub async fn notarize_with_observer(
        &self,
        options: &NotarizeOptions,
        observer: &mut dyn SessionObserver,
    ) -> Result<VerificationResult, NotarizationError> {
        self.run_session(options, observer)
            .await
            .map(|output| output.result)
    }

    /// Runs a session, returning the presentation along with its
    /// verification result.
    pub async fn run_session(
        &self,
        options: &NotarizeOptions,
        observer: &mut dyn SessionObserver,
    ) -> Result<SessionOutput, NotarizationError> {
        let mut session = NotarizationSession::new(observer);
        let span = info_span!(
            "session",
            id = %session.id(),
            endpoint = %options.request().url,
            proxy = %options.websocket_proxy_url(),
        );

        let result = self.run(&mut session, options).instrument(span).await;

        if let Err(err) = &result {
            session.fail(err);
        }

        result
    }

    async fn run(
        &self,
        session: &mut NotarizationSession<'_>,
        options: &NotarizeOptions,
    ) -> Result<SessionOutput, NotarizationError> {
        let engine = Engine::new(self.engine_config.clone());
        let boundary = ExecutionBoundary::spawn_with_deadline(engine, options.call_timeout())
            .map_err(|err| {
                NotarizationError::new(session.state(), ErrorKind::Boundary(err.kind()), err)
            })?;

        let result = drive(session, &boundary, options).await;

        if let Err(err) = boundary.shutdown().await {
            warn!("failed to shut down execution context: {err}");
        }

        result
    }
}

async fn drive(
    session: &mut NotarizationSession<'_>,
    boundary: &ExecutionBoundary,
    options: &NotarizeOptions,
) -> Result<SessionOutput, NotarizationError> {
    boundary.init().await.map_err(call_err(session.state()))?;
    session.advance(SessionState::EngineInitialized);

    let server_name = options.server_name().map_err(|err| {
        NotarizationError::new(session.state(), ErrorKind::Engine, err)
    })?;
    let config = ProverConfig::builder()
        .server_name(server_name)
        .max_sent_data(options.max_sent_data())
        .max_recv_data(options.max_recv_data())
        .signature_alg(options.signature_alg())
        .build()
        .map_err(|err| NotarizationError::new(session.state(), ErrorKind::Engine, err))?;

    let prover = boundary
        .create_prover(config)
        .await
        .map_err(call_err(session.state()))?;
    session.advance(SessionState::ProverCreated);

    // Resolve the notary key before any work is done, so that an
    // unreachable notary fails the session early.
    let notary = options.notary();
    let stage = session.state();
    notary
        .public_key()
        .await
        .map_err(|err| NotarizationError::from_notary(stage, err))?;
    let session_url = boundary
        .notary_session(
            &notary.url().to_string(),
            options.max_sent_data(),
            options.max_recv_data(),
        )
        .await
        .map_err(call_err(stage))?;

    prover
        .setup(&session_url)
        .await
        .map_err(call_err(session.state()))?;
    session.advance(SessionState::NotaryLinked);

    let response = prover
        .send_request(options.websocket_proxy_url(), options.request().clone())
        .await
        .map_err(call_err(session.state()))?;
    info!(status = response.status, "received response");
    session.advance(SessionState::RequestSent);

    let transcript = prover
        .transcript()
        .await
        .map_err(call_err(session.state()))?;
    session.advance(SessionState::TranscriptCaptured);

    let commit = TranscriptSelector::new(&transcript)
        .select(options.disclosure())
        .map_err(|err| NotarizationError::from_selection(session.state(), err))?;
    session.advance(SessionState::Committed);

    let output = prover
        .notarize(commit.clone())
        .await
        .map_err(call_err(session.state()))?;
    session.advance(SessionState::Notarized);

    if let Err(err) = prover.close().await {
        debug!("failed to release prover: {err}");
    }

    let presentation = PresentationBuilder::new(boundary)
        .build(
            output,
            commit,
            &notary.url().to_string(),
            options.websocket_proxy_url(),
        )
        .await
        .map_err(call_err(session.state()))?;
    session.advance(SessionState::PresentationBuilt);

    let stage = session.state();
    let result = Verifier::new(boundary)
        .verify(&presentation, notary)
        .await
        .map_err(|err| match err {
            VerifyError::Notary(err) => NotarizationError::from_notary(stage, err),
            VerifyError::Encoding(err) => NotarizationError::new(
                stage,
                ErrorKind::Boundary(BoundaryErrorKind::Serialization),
                err,
            ),
            VerifyError::Call(err) => NotarizationError::from_call(stage, err),
        })?;
    session.advance(SessionState::Verified);

    info!(server_name = %result.server_name, "session verified");

    Ok(SessionOutput {
        session_id: session.id(),
        presentation,
        result,
    })
}

fn call_err(stage: SessionState) -> impl FnOnce(CallError) -> NotarizationError {
    move |err| NotarizationError::from_call(stage, err)
}
