//! Notary side of a notarization session.

use async_tungstenite::{tungstenite::Message, WebSocketStream};
use disclosure_core::{
    attestation::{Attestation, AttestationConfig},
    request::AttestationRequest,
    CryptoProvider,
};
use futures::{AsyncRead, AsyncWrite, StreamExt as _};
use tracing::{debug, info, instrument, warn};

use crate::{EngineError, EngineErrorKind};

/// A notary issuing attestations.
pub struct Notary {
    config: AttestationConfig,
    provider: CryptoProvider,
}

opaque_debug::implement!(Notary);

impl Notary {
    /// Creates a new notary signing with the signers of `provider`.
    pub fn new(config: AttestationConfig, provider: CryptoProvider) -> Self {
        Self { config, provider }
    }

    /// Issues an attestation for the request, binding the given connection
    /// time.
    #[instrument(level = "debug", skip_all, fields(server_name = %request.server_name()), err)]
    pub fn attest(
        &self,
        request: AttestationRequest,
        connection_time: u64,
    ) -> Result<Attestation, EngineError> {
        let mut builder = Attestation::builder(&self.config)
            .accept_request(request)
            .map_err(|err| {
                EngineError::with_source(
                    EngineErrorKind::Notarization,
                    "notary rejected the request",
                    err,
                )
            })?;

        builder.connection_time(connection_time);

        let attestation = builder.build(&self.provider).map_err(|err| {
            EngineError::with_source(EngineErrorKind::Notarization, "notary failed to sign", err)
        })?;

        info!(uid = %attestation.body.uid(), "issued attestation");

        Ok(attestation)
    }

    /// Serves a single notarization session over WebSocket.
    ///
    /// The connection time is the time the session was accepted.
    pub async fn serve_websocket<S>(&self, mut ws: WebSocketStream<S>) -> Result<(), EngineError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let connection_time = unix_time();

        let request: AttestationRequest = loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => {
                    break bincode::deserialize(&data).map_err(|err| {
                        EngineError::with_source(
                            EngineErrorKind::Notarization,
                            "malformed attestation request",
                            err,
                        )
                    })?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("prover left the session without a request");
                    return Ok(());
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return Err(EngineError::with_source(
                        EngineErrorKind::Connection,
                        "failed to receive attestation request",
                        err,
                    ))
                }
            }
        };

        let reply = self
            .attest(request, connection_time)
            .map_err(|err| err.to_string());

        if let Err(msg) = &reply {
            warn!("refusing to notarize: {msg}");
        }

        let payload = bincode::serialize(&reply).map_err(|err| {
            EngineError::with_source(
                EngineErrorKind::Notarization,
                "failed to encode attestation",
                err,
            )
        })?;

        ws.send(Message::binary(payload)).await.map_err(|err| {
            EngineError::with_source(EngineErrorKind::Connection, "failed to send attestation", err)
        })?;

        // The prover closes the session once it has the attestation.
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
        }

        Ok(())
    }
}

pub(crate) fn unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|time| time.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use disclosure_core::{
        commit::{Commit, RangeLabel},
        fixtures::{
            attestation_config, http::request::GET_WITH_HEADER, http::response::OK_JSON,
            notary_provider, server_name, CONNECTION_TIME,
        },
        signing::SignatureAlgId,
        transcript::Transcript,
    };

    fn request(alg: SignatureAlgId) -> AttestationRequest {
        let transcript = Transcript::new(GET_WITH_HEADER, OK_JSON);
        let mut builder = Commit::builder(transcript.length());
        builder.sent(0..3, RangeLabel::Bytes).unwrap();

        let (request, _) = AttestationRequest::builder()
            .server_name(server_name())
            .transcript(transcript)
            .commit(builder.build())
            .signature_alg(alg)
            .build()
            .unwrap();

        request
    }

    #[test]
    fn test_attest() {
        let notary = Notary::new(attestation_config(), notary_provider());

        let attestation = notary
            .attest(request(SignatureAlgId::SECP256K1), CONNECTION_TIME)
            .unwrap();

        assert_eq!(attestation.body.connection_info().time, CONNECTION_TIME);
        attestation.verify(&CryptoProvider::default()).unwrap();
    }

    #[test]
    fn test_attest_unsupported_alg() {
        let notary = Notary::new(attestation_config(), notary_provider());

        let err = notary
            .attest(request(SignatureAlgId::SECP256R1), CONNECTION_TIME)
            .unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::Notarization);
    }
}
