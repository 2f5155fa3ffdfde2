use disclosure_boundary::{CallError, ExecutionBoundary};
use disclosure_core::{
    commit::Commit,
    presentation::{Presentation, PresentationMeta},
};
use disclosure_engine::NotarizationOutput;
use tracing::{debug, instrument};

/// Builds presentations from notarization outputs.
#[derive(Debug, Clone, Copy)]
pub struct PresentationBuilder<'a> {
    boundary: &'a ExecutionBoundary,
}

impl<'a> PresentationBuilder<'a> {
    /// Creates a builder using the engine behind `boundary`.
    pub fn new(boundary: &'a ExecutionBoundary) -> Self {
        Self { boundary }
    }

    /// Builds a presentation disclosing the ranges of `commit`.
    ///
    /// The notary and proxy URLs are recorded in the presentation so that it
    /// can be verified without the session which produced it.
    #[instrument(level = "debug", skip_all, err)]
    pub async fn build(
        &self,
        output: NotarizationOutput,
        commit: Commit,
        notary_url: &str,
        websocket_proxy_url: &str,
    ) -> Result<Presentation, CallError> {
        let meta = PresentationMeta {
            notary_url: Some(notary_url.to_string()),
            websocket_proxy_url: Some(websocket_proxy_url.to_string()),
        };

        let presentation = self
            .boundary
            .build_presentation(output.attestation, output.secrets, commit, meta)
            .await?;

        debug!(ranges = presentation.commit().len(), "built presentation");

        Ok(presentation)
    }
}
