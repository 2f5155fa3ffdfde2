//! The engine side of the boundary.

use disclosure_engine::{Engine, EngineError, Request, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A call in flight: the encoded request and the channel for the encoded
/// reply.
pub(crate) struct Envelope {
    pub(crate) payload: Vec<u8>,
    pub(crate) reply: oneshot::Sender<Vec<u8>>,
}

/// Reply to a call, as encoded on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Reply {
    Ok(Response),
    Engine(EngineError),
    /// The request could not be decoded by the engine side.
    Rejected(String),
}

/// Runs the engine until the boundary is shut down or every sender is gone.
pub(crate) fn run(
    engine: Engine,
    receiver: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start engine runtime: {err}");
            return;
        }
    };

    runtime.block_on(serve(engine, receiver, cancel));
}

async fn serve(
    mut engine: Engine,
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    info!("execution context started");

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = receiver.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let reply = match bincode::deserialize::<Request>(&envelope.payload) {
            Ok(request) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = engine.handle(request) => match result {
                        Ok(response) => Reply::Ok(response),
                        Err(err) => Reply::Engine(err),
                    },
                }
            }
            Err(err) => Reply::Rejected(format!("malformed request: {err}")),
        };

        let payload = match bincode::serialize(&reply) {
            Ok(payload) => payload,
            Err(err) => {
                let rejected = Reply::Rejected(format!("failed to encode reply: {err}"));
                match bincode::serialize(&rejected) {
                    Ok(payload) => payload,
                    Err(err) => {
                        error!("failed to encode rejection: {err}");
                        continue;
                    }
                }
            }
        };

        if envelope.reply.send(payload).is_err() {
            debug!("caller stopped waiting for the reply");
        }
    }

    info!("execution context stopped");
}
