//! Command line interface of the `disclosure` workspace.
//!
//! `disclosure notarize` runs a notarization session and writes the
//! presentation of the disclosed ranges, `disclosure verify` checks a stored
//! presentation against the notary's key.

mod cli;
mod commands;
mod settings;
mod cli_tracing;

pub use cli::{Cli, Command, NotarizeArgs, VerifyArgs};
pub use commands::{notarize, read_presentation, verify};
pub use settings::{
    DisclosureMode, DisclosureSettings, LimitSettings, LogFormat, LogSettings, NotarySettings,
    OutputSettings, ProxySettings, RequestSettings, Settings, ENV_PREFIX,
};
pub use cli_tracing::init_tracing;

/// Runs the command of `cli`.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::new(&cli)?;

    init_tracing(&settings.logging)?;

    match &cli.command {
        Command::Notarize(_) => notarize(&settings).await,
        Command::Verify(args) => verify(&settings, args).await,
    }
}
