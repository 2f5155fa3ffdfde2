//! Attestation types.
//!
//! An attestation is a cryptographically signed document issued by a Notary who
//! witnessed an HTTPS session. It binds the server name and connection
//! information to hash commitments of the transcript, without the Notary
//! learning the committed plaintext.
//!
//! The Notary signs the domain separated hash of the canonical encoding of the
//! [`AttestationBody`].

use std::fmt;

use rand::distr::{Distribution, StandardUniform};
use serde::{Deserialize, Serialize};

use crate::{
    connection::{ConnectionInfo, ServerName},
    hash::{hash_separated, PlaintextHash},
    request::AttestationRequest,
    serialize::impl_domain_separator,
    signing::{Signature, SignatureAlgId, VerifyingKey},
    CryptoProvider,
};

/// Unique identifier for an attestation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(pub [u8; 16]);

impl From<[u8; 16]> for Uid {
    fn from(id: [u8; 16]) -> Self {
        Self(id)
    }
}

impl Distribution<Uid> for StandardUniform {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Uid {
        Uid(self.sample(rng))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Attestation body.
///
/// This is the data structure which is signed by the Notary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationBody {
    pub(crate) uid: Uid,
    pub(crate) verifying_key: VerifyingKey,
    pub(crate) server_name: ServerName,
    pub(crate) connection_info: ConnectionInfo,
    pub(crate) plaintext_hashes: Vec<PlaintextHash>,
}

impl_domain_separator!(AttestationBody);

impl AttestationBody {
    /// Returns the attestation identifier.
    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Returns the key the attestation was signed with.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Returns the server name.
    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Returns the connection information.
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }

    /// Returns the attested plaintext hash commitments.
    pub fn plaintext_hashes(&self) -> &[PlaintextHash] {
        &self.plaintext_hashes
    }

    fn signing_message(&self) -> [u8; 32] {
        *hash_separated(self).as_bytes()
    }
}

/// An attestation document.
///
/// See [module level documentation](crate::attestation) for more information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The body of the attestation.
    pub body: AttestationBody,
    /// Signature of the attestation.
    pub signature: Signature,
}

impl Attestation {
    /// Returns an attestation builder.
    pub fn builder(config: &AttestationConfig) -> AttestationBuilder<'_> {
        AttestationBuilder::new(config)
    }

    /// Verifies the signature of the attestation with the key embedded in
    /// its body.
    pub fn verify(&self, provider: &CryptoProvider) -> Result<(), AttestationError> {
        let verifier = provider
            .signature
            .get(&self.signature.alg)
            .map_err(|err| AttestationError::new(ErrorKind::Provider, err))?;

        verifier
            .verify(
                &self.body.verifying_key,
                &self.body.signing_message(),
                &self.signature.data,
            )
            .map_err(|err| AttestationError::new(ErrorKind::Signature, err))
    }

    /// Serializes the attestation to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AttestationError> {
        bincode::serialize(self).map_err(|err| AttestationError::new(ErrorKind::Serialization, err))
    }

    /// Deserializes an attestation from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AttestationError> {
        bincode::deserialize(bytes)
            .map_err(|err| AttestationError::new(ErrorKind::Serialization, err))
    }
}

/// Error for [`Attestation`].
#[derive(Debug, thiserror::Error)]
pub struct AttestationError {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AttestationError {
    fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            source: Some(source.into()),
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Provider,
    Signature,
    Serialization,
}

impl fmt::Display for AttestationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("attestation error: ")?;

        match self.kind {
            ErrorKind::Provider => f.write_str("provider error")?,
            ErrorKind::Signature => f.write_str("signature error")?,
            ErrorKind::Serialization => f.write_str("serialization error")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

/// Notary configuration for issuing attestations.
#[derive(Debug, Clone)]
pub struct AttestationConfig {
    supported_signature_algs: Vec<SignatureAlgId>,
    max_sent_data: usize,
    max_recv_data: usize,
}

impl AttestationConfig {
    /// Creates a new builder.
    pub fn builder() -> AttestationConfigBuilder {
        AttestationConfigBuilder::default()
    }

    /// Returns the supported signature algorithms.
    pub fn supported_signature_algs(&self) -> &[SignatureAlgId] {
        &self.supported_signature_algs
    }
}

/// Builder for [`AttestationConfig`].
#[derive(Debug)]
pub struct AttestationConfigBuilder {
    supported_signature_algs: Vec<SignatureAlgId>,
    max_sent_data: usize,
    max_recv_data: usize,
}

impl Default for AttestationConfigBuilder {
    fn default() -> Self {
        Self {
            supported_signature_algs: Vec::new(),
            max_sent_data: usize::MAX,
            max_recv_data: usize::MAX,
        }
    }
}

impl AttestationConfigBuilder {
    /// Sets the supported signature algorithms.
    pub fn supported_signature_algs(
        &mut self,
        supported_signature_algs: impl Into<Vec<SignatureAlgId>>,
    ) -> &mut Self {
        self.supported_signature_algs = supported_signature_algs.into();
        self
    }

    /// Sets the maximum number of bytes the Prover may have sent.
    pub fn max_sent_data(&mut self, max_sent_data: usize) -> &mut Self {
        self.max_sent_data = max_sent_data;
        self
    }

    /// Sets the maximum number of bytes the Prover may have received.
    pub fn max_recv_data(&mut self, max_recv_data: usize) -> &mut Self {
        self.max_recv_data = max_recv_data;
        self
    }

    /// Builds the configuration.
    pub fn build(&self) -> Result<AttestationConfig, AttestationConfigError> {
        if self.supported_signature_algs.is_empty() {
            return Err(AttestationConfigError(
                "at least one signature algorithm must be supported".to_string(),
            ));
        }

        Ok(AttestationConfig {
            supported_signature_algs: self.supported_signature_algs.clone(),
            max_sent_data: self.max_sent_data,
            max_recv_data: self.max_recv_data,
        })
    }
}

/// Error for [`AttestationConfigBuilder`].
#[derive(Debug, thiserror::Error)]
#[error("attestation config error: {0}")]
pub struct AttestationConfigError(String);

/// Attestation builder state for accepting a request.
#[derive(Debug)]
pub struct Accept {}

/// Attestation builder state for signing.
#[derive(Debug)]
pub struct Sign {
    request: AttestationRequest,
    time: Option<u64>,
}

/// An attestation builder, used by the Notary.
#[derive(Debug)]
pub struct AttestationBuilder<'a, T = Accept> {
    config: &'a AttestationConfig,
    state: T,
}

impl<'a> AttestationBuilder<'a, Accept> {
    /// Creates a new attestation builder.
    pub fn new(config: &'a AttestationConfig) -> Self {
        Self {
            config,
            state: Accept {},
        }
    }

    /// Accepts the attestation request.
    pub fn accept_request(
        self,
        request: AttestationRequest,
    ) -> Result<AttestationBuilder<'a, Sign>, AttestationBuilderError> {
        let config = self.config;

        if !config
            .supported_signature_algs
            .contains(&request.signature_alg)
        {
            return Err(AttestationBuilderError::new(
                BuilderErrorKind::Request,
                format!("unsupported signature algorithm: {}", request.signature_alg),
            ));
        }

        let length = request.transcript_length;
        if length.sent as usize > config.max_sent_data {
            return Err(AttestationBuilderError::new(
                BuilderErrorKind::Request,
                format!(
                    "sent data length {} exceeds limit {}",
                    length.sent, config.max_sent_data
                ),
            ));
        }

        if length.received as usize > config.max_recv_data {
            return Err(AttestationBuilderError::new(
                BuilderErrorKind::Request,
                format!(
                    "received data length {} exceeds limit {}",
                    length.received, config.max_recv_data
                ),
            ));
        }

        for commitment in &request.plaintext_hashes {
            let len = match commitment.direction {
                crate::transcript::Direction::Sent => length.sent,
                crate::transcript::Direction::Received => length.received,
            } as usize;

            if commitment.range.is_empty() || commitment.range.end > len {
                return Err(AttestationBuilderError::new(
                    BuilderErrorKind::Request,
                    format!(
                        "invalid {} commitment range {:?}",
                        commitment.direction, commitment.range
                    ),
                ));
            }
        }

        Ok(AttestationBuilder {
            config: self.config,
            state: Sign {
                request,
                time: None,
            },
        })
    }
}

impl AttestationBuilder<'_, Sign> {
    /// Sets the UNIX time of the connection.
    pub fn connection_time(&mut self, time: u64) -> &mut Self {
        self.state.time = Some(time);
        self
    }

    /// Builds the attestation.
    pub fn build(self, provider: &CryptoProvider) -> Result<Attestation, AttestationBuilderError> {
        let Sign { request, time } = self.state;

        let time = time.ok_or_else(|| {
            AttestationBuilderError::new(BuilderErrorKind::Field, "connection time was not set")
        })?;

        let signer = provider.signer.get(&request.signature_alg).map_err(|_| {
            AttestationBuilderError::new(
                BuilderErrorKind::Config,
                format!(
                    "no signer configured for signature algorithm: {}",
                    request.signature_alg
                ),
            )
        })?;

        let body = AttestationBody {
            uid: rand::random(),
            verifying_key: signer.verifying_key(),
            server_name: request.server_name,
            connection_info: ConnectionInfo {
                time,
                transcript_length: request.transcript_length,
            },
            plaintext_hashes: request.plaintext_hashes,
        };

        let signature = signer
            .sign(&body.signing_message())
            .map_err(|err| AttestationBuilderError::new(BuilderErrorKind::Signature, err))?;

        Ok(Attestation { body, signature })
    }
}

/// Error for [`AttestationBuilder`].
#[derive(Debug, thiserror::Error)]
pub struct AttestationBuilderError {
    kind: BuilderErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
enum BuilderErrorKind {
    Request,
    Config,
    Field,
    Signature,
}

impl AttestationBuilderError {
    fn new<E>(kind: BuilderErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            source: Some(error.into()),
        }
    }

    /// Returns whether the error originates from an invalid request.
    pub fn is_request(&self) -> bool {
        matches!(self.kind, BuilderErrorKind::Request)
    }
}

impl fmt::Display for AttestationBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("attestation builder error: ")?;

        match self.kind {
            BuilderErrorKind::Request => f.write_str("request error")?,
            BuilderErrorKind::Config => f.write_str("config error")?,
            BuilderErrorKind::Field => f.write_str("field error")?,
            BuilderErrorKind::Signature => f.write_str("signature error")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}
