use std::path::Path;

use anyhow::Context as _;
use disclosure::{NotarizationError, SessionObserver, SessionOrchestrator, SessionState, Verifier};
use disclosure_boundary::ExecutionBoundary;
use disclosure_core::{presentation::Presentation, verification::VerificationResult};
use disclosure_engine::{Engine, EngineConfig};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{cli::VerifyArgs, settings::Settings};

/// Reports session progress through the log.
struct Progress;

impl SessionObserver for Progress {
    fn on_transition(&mut self, session: Uuid, state: SessionState) {
        info!(%session, "session {state}");
    }

    fn on_failure(&mut self, session: Uuid, error: &NotarizationError) {
        warn!(%session, stage = %error.stage(), "session failed");
    }
}

/// Notarizes the configured request, then writes the presentation and its
/// verification result.
pub async fn notarize(settings: &Settings) -> anyhow::Result<()> {
    let options = settings.notarize_options()?;

    let output = SessionOrchestrator::new(settings.engine_config()?)
        .run_session(&options, &mut Progress)
        .await?;

    let presentation = output.presentation.to_json()?;
    let path = &settings.output.presentation;
    tokio::fs::write(path, presentation)
        .await
        .with_context(|| format!("failed to write presentation to {}", path.display()))?;

    info!("presentation written to {}", path.display());

    write_result(&output.result, settings.output.result.as_deref()).await
}

/// Verifies the stored presentation of `args` and prints the result.
pub async fn verify(settings: &Settings, args: &VerifyArgs) -> anyhow::Result<()> {
    let presentation = read_presentation(&args.presentation).await?;

    let notary = match presentation.meta().notary_url.as_ref() {
        Some(url) if args.use_embedded_notary => {
            let mut settings = settings.clone();
            settings.notary.url = url.clone();
            settings.notary_reference()?
        }
        None if args.use_embedded_notary => {
            anyhow::bail!("presentation does not name its notary")
        }
        _ => settings.notary_reference()?,
    };

    let boundary = ExecutionBoundary::spawn(Engine::new(EngineConfig::default()))?;

    let result = async {
        boundary.init().await?;
        Verifier::new(&boundary)
            .verify(&presentation, &notary)
            .await
            .map_err(anyhow::Error::from)
    }
    .await;

    if let Err(err) = boundary.shutdown().await {
        warn!("failed to shut down execution context: {err}");
    }

    write_result(&result?, None).await
}

/// Reads a presentation stored either as JSON or in binary form.
pub async fn read_presentation(path: &Path) -> anyhow::Result<Presentation> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read presentation from {}", path.display()))?;

    let presentation = match std::str::from_utf8(&bytes) {
        Ok(json) if json.trim_start().starts_with('{') => Presentation::from_json(json)?,
        _ => Presentation::from_bytes(&bytes)?,
    };

    Ok(presentation)
}

async fn write_result(result: &VerificationResult, path: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;

    match path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("failed to write result to {}", path.display()))?;
            info!("verification result written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
