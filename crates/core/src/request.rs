//! Attestation requests.
//!
//! After the HTTPS exchange, a Prover requests an attestation from the Notary.
//! The request carries hash commitments to the transcript ranges the Prover
//! may later want to disclose, plus one commitment to each complete direction
//! which stays hidden. The plaintext and blinders never leave the Prover; they
//! are kept in [`Secrets`].

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    attestation::Attestation,
    commit::{Commit, RangeLabel},
    connection::{ServerName, TranscriptLength},
    hash::{hash_plaintext, Blinder, PlaintextHash, PlaintextHashSecret},
    secrets::Secrets,
    signing::SignatureAlgId,
    transcript::{Direction, Transcript},
    CryptoProvider,
};

/// Attestation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub(crate) signature_alg: SignatureAlgId,
    pub(crate) server_name: ServerName,
    pub(crate) transcript_length: TranscriptLength,
    pub(crate) plaintext_hashes: Vec<PlaintextHash>,
}

impl AttestationRequest {
    /// Returns a new request builder.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Returns the requested signature algorithm.
    pub fn signature_alg(&self) -> SignatureAlgId {
        self.signature_alg
    }

    /// Returns the server name.
    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Returns the transcript length.
    pub fn transcript_length(&self) -> TranscriptLength {
        self.transcript_length
    }

    /// Returns the plaintext hash commitments.
    pub fn plaintext_hashes(&self) -> &[PlaintextHash] {
        &self.plaintext_hashes
    }

    /// Validates the content of the attestation against this request.
    pub fn validate(
        &self,
        attestation: &Attestation,
        provider: &CryptoProvider,
    ) -> Result<(), AttestationValidationError> {
        if attestation.signature.alg != self.signature_alg {
            return Err(AttestationValidationError::inconsistent(format!(
                "signature algorithm: expected {}, got {}",
                self.signature_alg, attestation.signature.alg
            )));
        }

        if attestation.body.server_name() != &self.server_name {
            return Err(AttestationValidationError::inconsistent(
                "server name does not match",
            ));
        }

        if attestation.body.connection_info().transcript_length != self.transcript_length {
            return Err(AttestationValidationError::inconsistent(
                "transcript length does not match",
            ));
        }

        if attestation.body.plaintext_hashes() != self.plaintext_hashes.as_slice() {
            return Err(AttestationValidationError::inconsistent(
                "plaintext hash commitments do not match",
            ));
        }

        attestation.verify(provider).map_err(|err| {
            AttestationValidationError::inconsistent(format!("failed to verify the signature: {err}"))
        })?;

        Ok(())
    }
}

/// Builder for [`AttestationRequest`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
    signature_alg: Option<SignatureAlgId>,
    server_name: Option<ServerName>,
    transcript: Option<Transcript>,
    commit: Option<Commit>,
}

impl RequestBuilder {
    /// Sets the signature algorithm the Notary should use.
    pub fn signature_alg(mut self, alg: SignatureAlgId) -> Self {
        self.signature_alg = Some(alg);
        self
    }

    /// Sets the server name.
    pub fn server_name(mut self, name: ServerName) -> Self {
        self.server_name = Some(name);
        self
    }

    /// Sets the transcript.
    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Sets the commit of ranges which may later be disclosed.
    pub fn commit(mut self, commit: Commit) -> Self {
        self.commit = Some(commit);
        self
    }

    /// Builds the attestation request, returning it with the Prover's secrets.
    pub fn build(self) -> Result<(AttestationRequest, Secrets), RequestBuilderError> {
        let Self {
            signature_alg,
            server_name,
            transcript,
            commit,
        } = self;

        let signature_alg = signature_alg.unwrap_or(SignatureAlgId::SECP256K1);
        let server_name =
            server_name.ok_or_else(|| RequestBuilderError::new("server name is missing"))?;
        let transcript =
            transcript.ok_or_else(|| RequestBuilderError::new("transcript is missing"))?;
        let commit = commit.unwrap_or_default();

        let length = transcript.length();
        commit
            .validate_bounds(&length)
            .map_err(|err| RequestBuilderError::new(err.to_string()))?;

        let mut rng = rand::rng();
        let mut plaintext_hashes = Vec::new();
        let mut secrets = Vec::new();

        let mut commit_range =
            |direction: Direction, range: std::ops::Range<usize>, label: RangeLabel| {
                if secrets.iter().any(|s: &PlaintextHashSecret| {
                    s.direction == direction && s.range == range && s.label == label
                }) {
                    return;
                }

                let blinder: Blinder = rng.random();
                let hash = hash_plaintext(&transcript.data(direction)[range.clone()], &blinder);

                plaintext_hashes.push(PlaintextHash {
                    direction,
                    range: range.clone(),
                    label: label.clone(),
                    hash,
                });
                secrets.push(PlaintextHashSecret {
                    direction,
                    range,
                    label,
                    blinder,
                });
            };

        for range in commit.iter() {
            commit_range(range.direction(), range.range(), range.label().clone());
        }

        // Hidden commitments to each complete direction.
        for direction in [Direction::Sent, Direction::Received] {
            let len = transcript.len_of_direction(direction);
            if len > 0 {
                commit_range(direction, 0..len, RangeLabel::Bytes);
            }
        }

        let request = AttestationRequest {
            signature_alg,
            server_name: server_name.clone(),
            transcript_length: length,
            plaintext_hashes,
        };

        let secrets = Secrets {
            server_name,
            transcript,
            plaintext_hashes: secrets,
        };

        Ok((request, secrets))
    }
}

/// Error for [`RequestBuilder`].
#[derive(Debug, thiserror::Error)]
#[error("request builder error: {0}")]
pub struct RequestBuilderError(String);

impl RequestBuilderError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Error for [`AttestationRequest::validate`].
#[derive(Debug, thiserror::Error)]
#[error("attestation validation error: {kind}: {message}")]
pub struct AttestationValidationError {
    kind: ErrorKind,
    message: String,
}

impl AttestationValidationError {
    fn inconsistent(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Inconsistent,
            message: msg.into(),
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Inconsistent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Inconsistent => write!(f, "inconsistent"),
        }
    }
}
