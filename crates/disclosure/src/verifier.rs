use disclosure_boundary::{CallError, ExecutionBoundary};
use disclosure_core::{
    presentation::{Presentation, PresentationError},
    verification::VerificationResult,
};
use disclosure_notary_client::{ClientError, NotaryReference};
use tracing::{info, instrument};

/// Error for [`Verifier`].
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The notary key could not be resolved.
    #[error("failed to resolve notary key: {0}")]
    Notary(#[from] ClientError),
    /// The presentation could not be encoded.
    #[error("failed to encode presentation: {0}")]
    Encoding(#[from] PresentationError),
    /// The call to the engine failed, or the presentation did not verify.
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Verifies presentations against a notary's public key.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    boundary: &'a ExecutionBoundary,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier using the engine behind `boundary`.
    pub fn new(boundary: &'a ExecutionBoundary) -> Self {
        Self { boundary }
    }

    /// Verifies the presentation against the key of `notary`.
    pub async fn verify(
        &self,
        presentation: &Presentation,
        notary: &NotaryReference,
    ) -> Result<VerificationResult, VerifyError> {
        self.verify_bytes(presentation.to_bytes()?, notary).await
    }

    /// Verifies a presentation in byte form against the key of `notary`.
    ///
    /// The key is fetched on first use and reused afterwards.
    #[instrument(level = "debug", skip_all, fields(notary = %notary.url()), err)]
    pub async fn verify_bytes(
        &self,
        presentation: Vec<u8>,
        notary: &NotaryReference,
    ) -> Result<VerificationResult, VerifyError> {
        let notary_key = notary.public_key().await?;

        let result = self.boundary.verify(presentation, notary_key).await?;

        info!(
            server_name = %result.server_name,
            time = result.time,
            sent = result.sent.disclosed_len(),
            recv = result.recv.disclosed_len(),
            "verified presentation"
        );

        Ok(result)
    }
}
