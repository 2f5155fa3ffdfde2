//! Verifiable presentation.
//!
//! A presentation is a proof of an attestation from a Notary together with the
//! selectively disclosed ranges of the transcript. It is self-contained: a
//! Verifier needs nothing but the Notary's [`VerifyingKey`] to check it, and it
//! can be stored or transmitted in its byte or JSON form and verified later.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    attestation::{Attestation, AttestationError},
    commit::{Commit, CommitError},
    hash::{OpeningError, PlaintextHashOpening},
    secrets::Secrets,
    signing::VerifyingKey,
    transcript::Direction,
    verification::{DisclosedData, DisclosedSlice, VerificationResult},
    CryptoProvider,
};

/// Metadata describing where a presentation was notarized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationMeta {
    /// Base URL of the Notary.
    pub notary_url: Option<String>,
    /// URL of the WebSocket proxy the connection was tunneled through.
    pub websocket_proxy_url: Option<String>,
}

/// A verifiable presentation.
///
/// See the [module level documentation](crate::presentation) for more
/// information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    attestation: Attestation,
    commit: Commit,
    openings: Vec<PlaintextHashOpening>,
    meta: PresentationMeta,
}

impl Presentation {
    /// Creates a new builder.
    pub fn builder<'a>(attestation: &'a Attestation, secrets: &'a Secrets) -> PresentationBuilder<'a> {
        PresentationBuilder::new(attestation, secrets)
    }

    /// Returns the attestation.
    pub fn attestation(&self) -> &Attestation {
        &self.attestation
    }

    /// Returns the commit of disclosed ranges.
    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    /// Returns the presentation metadata.
    pub fn meta(&self) -> &PresentationMeta {
        &self.meta
    }

    /// Returns the verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.attestation.body.verifying_key()
    }

    /// Verifies the presentation against the key of a trusted Notary.
    pub fn verify(
        &self,
        provider: &CryptoProvider,
        notary_key: &VerifyingKey,
    ) -> Result<VerificationResult, PresentationError> {
        let body = &self.attestation.body;

        self.attestation.verify(provider)?;

        if body.verifying_key() != notary_key {
            return Err(PresentationError::new(
                ErrorKind::Key,
                format!(
                    "attestation was signed by {}, expected {}",
                    body.verifying_key().to_hex(),
                    notary_key.to_hex()
                ),
            ));
        }

        let length = body.connection_info().transcript_length;
        self.commit.validate_bounds(&length)?;

        if self.openings.len() != self.commit.len() {
            return Err(PresentationError::new(
                ErrorKind::Opening,
                format!(
                    "expected {} openings, got {}",
                    self.commit.len(),
                    self.openings.len()
                ),
            ));
        }

        let mut sent = DisclosedData::new(length.sent as usize);
        let mut recv = DisclosedData::new(length.received as usize);

        for (range, opening) in self.commit.iter().zip(&self.openings) {
            if opening.direction() != range.direction() || opening.range() != range.range() {
                return Err(PresentationError::new(
                    ErrorKind::Opening,
                    format!(
                        "opening of {} {:?} does not match committed range {:?}",
                        opening.direction(),
                        opening.range(),
                        range.range()
                    ),
                ));
            }

            let commitment = body
                .plaintext_hashes()
                .iter()
                .find(|hash| {
                    hash.direction == range.direction()
                        && hash.range == range.range()
                        && &hash.label == range.label()
                })
                .ok_or_else(|| {
                    PresentationError::new(
                        ErrorKind::Opening,
                        format!(
                            "{} range {:?} labeled {} is not attested",
                            range.direction(),
                            range.range(),
                            range.label()
                        ),
                    )
                })?;

            let data = opening.verify(commitment)?;

            let slice = DisclosedSlice {
                range: range.range(),
                label: range.label().clone(),
                data: data.to_vec(),
            };

            match range.direction() {
                Direction::Sent => sent.push(slice),
                Direction::Received => recv.push(slice),
            }
        }

        Ok(VerificationResult {
            time: body.connection_info().time,
            verifying_key: body.verifying_key().to_hex(),
            notary_key: notary_key.to_hex(),
            server_name: body.server_name().to_string(),
            sent,
            recv,
        })
    }

    /// Serializes the presentation to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PresentationError> {
        bincode::serialize(self).map_err(|err| PresentationError::new(ErrorKind::Serialization, err))
    }

    /// Deserializes a presentation from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PresentationError> {
        bincode::deserialize(bytes)
            .map_err(|err| PresentationError::new(ErrorKind::Serialization, err))
    }

    /// Serializes the presentation to JSON.
    pub fn to_json(&self) -> Result<String, PresentationError> {
        serde_json::to_string(self)
            .map_err(|err| PresentationError::new(ErrorKind::Serialization, err))
    }

    /// Deserializes a presentation from JSON.
    pub fn from_json(json: &str) -> Result<Self, PresentationError> {
        serde_json::from_str(json)
            .map_err(|err| PresentationError::new(ErrorKind::Serialization, err))
    }
}

/// Builder for [`Presentation`].
pub struct PresentationBuilder<'a> {
    attestation: &'a Attestation,
    secrets: &'a Secrets,
    commit: Commit,
    meta: PresentationMeta,
}

impl<'a> PresentationBuilder<'a> {
    pub(crate) fn new(attestation: &'a Attestation, secrets: &'a Secrets) -> Self {
        Self {
            attestation,
            secrets,
            commit: Commit::default(),
            meta: PresentationMeta::default(),
        }
    }

    /// Sets the ranges to disclose.
    pub fn commit(&mut self, commit: Commit) -> &mut Self {
        self.commit = commit;
        self
    }

    /// Sets the presentation metadata.
    pub fn meta(&mut self, meta: PresentationMeta) -> &mut Self {
        self.meta = meta;
        self
    }

    /// Builds the presentation.
    pub fn build(self) -> Result<Presentation, PresentationBuilderError> {
        let body = &self.attestation.body;

        if body.server_name() != self.secrets.server_name() {
            return Err(PresentationBuilderError::new(
                "secrets do not belong to the attestation: server name mismatch",
            ));
        }

        if body.connection_info().transcript_length != self.secrets.transcript().length() {
            return Err(PresentationBuilderError::new(
                "secrets do not belong to the attestation: transcript length mismatch",
            ));
        }

        let mut openings = Vec::with_capacity(self.commit.len());
        for range in self.commit.iter() {
            let attested = body.plaintext_hashes().iter().any(|hash| {
                hash.direction == range.direction()
                    && hash.range == range.range()
                    && &hash.label == range.label()
            });

            let opening = attested
                .then(|| {
                    self.secrets
                        .open(range.direction(), range.range(), range.label())
                })
                .flatten()
                .ok_or_else(|| {
                    PresentationBuilderError::new(format!(
                        "{} range {:?} labeled {} was not committed during notarization",
                        range.direction(),
                        range.range(),
                        range.label()
                    ))
                })?;

            openings.push(opening);
        }

        Ok(Presentation {
            attestation: self.attestation.clone(),
            commit: self.commit,
            openings,
            meta: self.meta,
        })
    }
}

/// Error for [`PresentationBuilder`].
#[derive(Debug, thiserror::Error)]
#[error("presentation builder error: {0}")]
pub struct PresentationBuilderError(String);

impl PresentationBuilderError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Error for [`Presentation`].
#[derive(Debug, thiserror::Error)]
pub struct PresentationError {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PresentationError {
    fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    /// Returns whether the presentation was signed by a different key than
    /// the expected Notary key.
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::Key)
    }

    /// Returns whether the presentation could not be (de)serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }
}

#[derive(Debug)]
enum ErrorKind {
    Attestation,
    Key,
    Commit,
    Opening,
    Serialization,
}

impl fmt::Display for PresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("presentation error: ")?;

        match self.kind {
            ErrorKind::Attestation => f.write_str("attestation error")?,
            ErrorKind::Key => f.write_str("notary key mismatch")?,
            ErrorKind::Commit => f.write_str("commit error")?,
            ErrorKind::Opening => f.write_str("opening error")?,
            ErrorKind::Serialization => f.write_str("serialization error")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

impl From<AttestationError> for PresentationError {
    fn from(error: AttestationError) -> Self {
        Self::new(ErrorKind::Attestation, error)
    }
}

impl From<CommitError> for PresentationError {
    fn from(error: CommitError) -> Self {
        Self::new(ErrorKind::Commit, error)
    }
}

impl From<OpeningError> for PresentationError {
    fn from(error: OpeningError) -> Self {
        Self::new(ErrorKind::Opening, error)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        attestation::Attestation,
        commit::RangeLabel,
        fixtures::{self, http::request::GET_WITH_HEADER, http::response::OK_JSON},
        request::AttestationRequest,
        transcript::Transcript,
    };

    struct Notarized {
        provider: CryptoProvider,
        attestation: Attestation,
        secrets: Secrets,
        commit: Commit,
    }

    #[fixture]
    fn notarized() -> Notarized {
        let transcript = Transcript::new(GET_WITH_HEADER, OK_JSON);
        let mut commit = Commit::builder(transcript.length());
        commit
            .sent(0..3, RangeLabel::Bytes)
            .unwrap()
            .recv(0..15, RangeLabel::Info)
            .unwrap();
        let commit = commit.build();

        let (request, secrets) = AttestationRequest::builder()
            .server_name(fixtures::server_name())
            .transcript(transcript)
            .commit(commit.clone())
            .build()
            .unwrap();

        let provider = fixtures::notary_provider();
        let attestation = fixtures::attest(&provider, request);

        Notarized {
            provider,
            attestation,
            secrets,
            commit,
        }
    }

    fn present(notarized: &Notarized) -> Presentation {
        let mut builder = Presentation::builder(&notarized.attestation, &notarized.secrets);
        builder.commit(notarized.commit.clone());
        builder.build().unwrap()
    }

    #[rstest]
    fn test_presentation_discloses_committed_ranges(notarized: Notarized) {
        let presentation = present(&notarized);
        let result = presentation
            .verify(&notarized.provider, &fixtures::notary_verifying_key())
            .unwrap();

        assert_eq!(result.server_name, "example.test");
        assert_eq!(result.sent.bytes(), b"GET");
        assert_eq!(result.recv.bytes(), b"HTTP/1.1 200 OK");
        assert_eq!(result.sent.length(), GET_WITH_HEADER.len());
        assert_eq!(result.verifying_key, result.notary_key);
    }

    #[rstest]
    fn test_presentation_wrong_notary_key(notarized: Notarized) {
        let presentation = present(&notarized);
        let other_key = crate::signing::Signer::verifying_key(
            &crate::signing::Secp256k1Signer::new(&[2u8; 32]).unwrap(),
        );

        let err = presentation
            .verify(&notarized.provider, &other_key)
            .unwrap_err();
        assert!(err.is_key_mismatch());
    }

    #[rstest]
    fn test_presentation_tampered_opening(notarized: Notarized) {
        let mut presentation = present(&notarized);
        presentation.openings[0].data = b"PUT".to_vec();

        assert!(presentation
            .verify(&notarized.provider, &fixtures::notary_verifying_key())
            .is_err());
    }

    #[rstest]
    fn test_presentation_relabeled_range(notarized: Notarized) {
        let mut presentation = present(&notarized);
        let mut commit = Commit::builder(notarized.secrets.transcript().length());
        commit
            .sent(0..3, RangeLabel::Header("authorization".into()))
            .unwrap()
            .recv(0..15, RangeLabel::Info)
            .unwrap();
        presentation.commit = commit.build();

        // Openings still match the plaintext, only the label differs.
        assert!(presentation
            .verify(&notarized.provider, &fixtures::notary_verifying_key())
            .is_err());
    }

    #[rstest]
    fn test_presentation_relabeled_commit(notarized: Notarized) {
        let mut commit = Commit::builder(notarized.secrets.transcript().length());
        commit
            .sent(0..3, RangeLabel::Header("authorization".into()))
            .unwrap();

        let mut builder = Presentation::builder(&notarized.attestation, &notarized.secrets);
        builder.commit(commit.build());

        assert!(builder.build().is_err());
    }

    #[rstest]
    fn test_presentation_uncommitted_range(notarized: Notarized) {
        let mut commit = Commit::builder(notarized.secrets.transcript().length());
        commit.sent(4..8, RangeLabel::Bytes).unwrap();

        let mut builder = Presentation::builder(&notarized.attestation, &notarized.secrets);
        builder.commit(commit.build());

        assert!(builder.build().is_err());
    }

    #[rstest]
    fn test_presentation_subset_of_commit(notarized: Notarized) {
        let mut commit = Commit::builder(notarized.secrets.transcript().length());
        commit.recv(0..15, RangeLabel::Info).unwrap();

        let mut builder = Presentation::builder(&notarized.attestation, &notarized.secrets);
        builder.commit(commit.build());
        let presentation = builder.build().unwrap();

        let result = presentation
            .verify(&notarized.provider, &fixtures::notary_verifying_key())
            .unwrap();
        assert!(result.sent.slices().is_empty());
        assert_eq!(result.recv.slices().len(), 1);
    }

    #[rstest]
    fn test_presentation_serialization(notarized: Notarized) {
        let presentation = present(&notarized);
        let key = fixtures::notary_verifying_key();
        let expected = presentation.verify(&notarized.provider, &key).unwrap();

        let from_bytes = Presentation::from_bytes(&presentation.to_bytes().unwrap()).unwrap();
        let from_json = Presentation::from_json(&presentation.to_json().unwrap()).unwrap();

        assert_eq!(from_bytes, presentation);
        assert_eq!(from_bytes.verify(&notarized.provider, &key).unwrap(), expected);
        assert_eq!(from_json.verify(&notarized.provider, &key).unwrap(), expected);
    }

    #[test]
    fn test_presentation_from_garbage() {
        let err = Presentation::from_bytes(b"garbage").unwrap_err();
        assert!(err.is_serialization());
    }
}
