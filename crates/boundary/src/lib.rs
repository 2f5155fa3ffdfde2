//! The execution boundary.
//!
//! An [`ExecutionBoundary`] hosts an [`Engine`] on a dedicated thread and
//! exposes its operations as asynchronous calls. Requests and replies cross
//! the boundary encoded with bincode, so only plain data is exchanged. Provers
//! created by the engine are represented by [`ProverHandle`]s which carry an
//! id and forward every operation back across the boundary.
//!
//! Each boundary owns its engine exclusively and processes calls one at a
//! time, in the order they were issued.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod error;
mod handle;
mod worker;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::JoinHandle,
    time::Duration,
};

use disclosure_core::{
    attestation::Attestation,
    commit::Commit,
    presentation::{Presentation, PresentationMeta},
    secrets::Secrets,
    signing::VerifyingKey,
    verification::VerificationResult,
};
use disclosure_engine::{Engine, ProverConfig, Request, Response};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub use error::{BoundaryError, BoundaryErrorKind, CallError};
pub use handle::ProverHandle;

use worker::{Envelope, Reply};

static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(0);

/// Matches a response against the expected variant, failing with a
/// serialization error otherwise.
macro_rules! expect_response {
    ($response:expr, $variant:pat => $output:expr) => {
        match $response {
            $variant => Ok($output),
            other => Err($crate::CallError::from($crate::BoundaryError::unexpected(
                other.name(),
            ))),
        }
    };
}
pub(crate) use expect_response;

/// Bridge to an engine running in its own execution context.
///
/// Cloning the boundary shares the context. The context stops on
/// [`shutdown`](Self::shutdown), or once the boundary and every handle
/// created from it are dropped.
#[derive(Clone)]
pub struct ExecutionBoundary {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    sender: mpsc::UnboundedSender<Envelope>,
    cancel: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
    default_deadline: Option<Duration>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ExecutionBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionBoundary")
            .field("name", &self.inner.name)
            .field("default_deadline", &self.inner.default_deadline)
            .finish_non_exhaustive()
    }
}

impl ExecutionBoundary {
    /// Starts a new execution context hosting `engine`, without a default
    /// call deadline.
    pub fn spawn(engine: Engine) -> Result<Self, BoundaryError> {
        Self::spawn_with_deadline(engine, None)
    }

    /// Starts a new execution context hosting `engine`.
    ///
    /// Calls which do not complete within `default_deadline` fail with a
    /// timeout.
    pub fn spawn_with_deadline(
        engine: Engine,
        default_deadline: Option<Duration>,
    ) -> Result<Self, BoundaryError> {
        let name = format!(
            "disclosure-engine-{}",
            NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)
        );
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn({
                let cancel = cancel.clone();
                move || worker::run(engine, receiver, cancel)
            })
            .map_err(|err| BoundaryError::new(BoundaryErrorKind::Unreachable, err))?;

        info!(context = %name, "spawned execution context");

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                sender,
                cancel,
                thread: Mutex::new(Some(thread)),
                default_deadline,
            }),
        })
    }

    /// Returns the name of the execution context.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns whether the execution context is still accepting calls.
    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled() && !self.inner.sender.is_closed()
    }

    /// Calls the engine with the default deadline.
    pub async fn call(&self, request: Request) -> Result<Response, CallError> {
        self.call_inner(request, self.inner.default_deadline).await
    }

    /// Calls the engine, failing if the call does not complete within
    /// `deadline`.
    pub async fn call_with_deadline(
        &self,
        request: Request,
        deadline: Duration,
    ) -> Result<Response, CallError> {
        self.call_inner(request, Some(deadline)).await
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(context = %self.inner.name, op = request.name()),
        err
    )]
    async fn call_inner(
        &self,
        request: Request,
        deadline: Option<Duration>,
    ) -> Result<Response, CallError> {
        let op = request.name();
        let payload = bincode::serialize(&request)
            .map_err(|err| BoundaryError::new(BoundaryErrorKind::Serialization, err))?;

        let (reply_sender, reply_receiver) = oneshot::channel();
        self.inner
            .sender
            .send(Envelope {
                payload,
                reply: reply_sender,
            })
            .map_err(|_| {
                BoundaryError::new(
                    BoundaryErrorKind::Unreachable,
                    "execution context is not running",
                )
            })?;

        let reply = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, reply_receiver)
                .await
                .map_err(|_| {
                    BoundaryError::new(
                        BoundaryErrorKind::Timeout,
                        format!("{op} did not complete within {deadline:?}"),
                    )
                })?,
            None => reply_receiver.await,
        }
        .map_err(|_| {
            BoundaryError::new(
                BoundaryErrorKind::Unreachable,
                format!("execution context stopped during {op}"),
            )
        })?;

        let reply: Reply = bincode::deserialize(&reply)
            .map_err(|err| BoundaryError::new(BoundaryErrorKind::Serialization, err))?;

        match reply {
            Reply::Ok(response) => {
                debug!(response = response.name(), "call complete");
                Ok(response)
            }
            Reply::Engine(err) => Err(CallError::Engine(err)),
            Reply::Rejected(msg) => {
                Err(BoundaryError::new(BoundaryErrorKind::Serialization, msg).into())
            }
        }
    }

    /// Initializes the engine.
    pub async fn init(&self) -> Result<(), CallError> {
        let response = self.call(Request::Init).await?;

        expect_response!(response, Response::Initialized => ())
    }

    /// Creates a prover, returning a handle to it.
    pub async fn create_prover(&self, config: ProverConfig) -> Result<ProverHandle, CallError> {
        let response = self.call(Request::CreateProver(config)).await?;

        expect_response!(
            response,
            Response::ProverCreated(id) => ProverHandle::new(id, self.clone())
        )
    }

    /// Requests a notarization session from the notary at `notary_url`,
    /// returning the WebSocket URL of the session.
    pub async fn notary_session(
        &self,
        notary_url: &str,
        max_sent_data: usize,
        max_recv_data: usize,
    ) -> Result<String, CallError> {
        let response = self
            .call(Request::NotarySession {
                notary_url: notary_url.to_string(),
                max_sent_data,
                max_recv_data,
            })
            .await?;

        expect_response!(response, Response::NotarySession(session_url) => session_url)
    }

    /// Builds a presentation disclosing the ranges of `commit`.
    pub async fn build_presentation(
        &self,
        attestation: Attestation,
        secrets: Secrets,
        commit: Commit,
        meta: PresentationMeta,
    ) -> Result<Presentation, CallError> {
        let response = self
            .call(Request::BuildPresentation {
                attestation,
                secrets,
                commit,
                meta,
            })
            .await?;

        expect_response!(response, Response::Presentation(presentation) => presentation)
    }

    /// Verifies a serialized presentation against the notary's key.
    pub async fn verify(
        &self,
        presentation: Vec<u8>,
        notary_key: VerifyingKey,
    ) -> Result<VerificationResult, CallError> {
        let response = self
            .call(Request::Verify {
                presentation,
                notary_key,
            })
            .await?;

        expect_response!(response, Response::Verified(result) => result)
    }

    /// Stops the execution context and waits for its thread to exit.
    ///
    /// A call in progress is abandoned and its caller sees the context as
    /// unreachable.
    pub async fn shutdown(&self) -> Result<(), BoundaryError> {
        self.inner.cancel.cancel();

        let thread = self
            .inner
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(thread) = thread else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|err| BoundaryError::new(BoundaryErrorKind::Unreachable, err))?
            .map_err(|_| {
                BoundaryError::new(
                    BoundaryErrorKind::Unreachable,
                    "execution context panicked",
                )
            })?;

        info!(context = %self.inner.name, "execution context shut down");

        Ok(())
    }
}
