use std::str::FromStr;

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::settings::{LogFormat, LogSettings};

/// Crates whose events are enabled at the configured level.
const CRATES: [&str; 5] = [
    "disclosure",
    "disclosure_boundary",
    "disclosure_cli",
    "disclosure_engine",
    "disclosure_notary_client",
];

fn format_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // Logs go to stderr, stdout carries the command output.
    let f = fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_thread_names(true);
    match format {
        LogFormat::Compact => f.compact().boxed(),
        LogFormat::Json => f.json().boxed(),
    }
}

/// Returns the filter directives of `logging`.
pub(crate) fn directives(logging: &LogSettings) -> anyhow::Result<String> {
    Ok(match &logging.filter {
        // Use custom filter that is provided by user
        Some(filter) => filter.clone(),
        // Use the default filter when only verbosity level is provided
        None => {
            let level = Level::from_str(&logging.level)?;
            CRATES
                .iter()
                .map(|name| format!("{name}={level}"))
                .collect::<Vec<_>>()
                .join(",")
        }
    })
}

pub fn init_tracing(logging: &LogSettings) -> anyhow::Result<()> {
    let filter_layer = EnvFilter::builder().parse(directives(logging)?)?;

    Registry::default()
        .with(filter_layer)
        .with(format_layer(logging.format))
        .try_init()?;

    Ok(())
}
