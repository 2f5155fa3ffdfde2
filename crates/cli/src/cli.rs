use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use disclosure_core::commit::RangeSpec;

#[derive(Debug, Parser)]
#[command(version, about, name = "disclosure", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Configuration file path.
    #[arg(short, long, default_value = "disclosure.toml", env = "DISCLOSURE_CONFIG")]
    pub config: PathBuf,
    /// Log level of the crates of this workspace, e.g. INFO.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Base URL of the notary.
    #[arg(long)]
    pub notary_url: Option<String>,
    /// Pinned public key of the notary, PEM or hex encoded.
    #[arg(long)]
    pub notary_key: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// notarizes an HTTPS request and writes the presentation of the
    /// disclosed ranges.
    Notarize(NotarizeArgs),
    /// verifies a stored presentation against the notary's key.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct NotarizeArgs {
    /// Target URL of the request.
    #[arg(long)]
    pub url: Option<String>,
    /// HTTP method of the request.
    #[arg(short = 'X', long)]
    pub method: Option<String>,
    /// Request header as `name: value`. May be repeated.
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// Request body, sent verbatim.
    #[arg(short, long)]
    pub body: Option<String>,
    /// URL of the WebSocket proxy used to reach the server.
    #[arg(long)]
    pub proxy_url: Option<String>,
    /// Range of the request to disclose, e.g. `header:host`, `body` or
    /// `bytes:0..16`. May be repeated. Selects detailed disclosure.
    #[arg(long, value_name = "RANGE")]
    pub reveal_sent: Vec<RangeSpec>,
    /// Range of the response to disclose, e.g. `json:data.id`. May be
    /// repeated. Selects detailed disclosure.
    #[arg(long, value_name = "RANGE")]
    pub reveal_recv: Vec<RangeSpec>,
    /// Output path of the presentation.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Output path of the verification result. Printed when unset.
    #[arg(long)]
    pub result: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Path of the presentation, JSON or binary encoded.
    pub presentation: PathBuf,
    /// Resolve the notary from the presentation's metadata instead of the
    /// configured notary.
    #[arg(long)]
    pub use_embedded_notary: bool,
}

fn parse_header(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("expected `name: value`, got {header:?}"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {header:?}"));
    }

    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Accept: application/json", ("Accept", "application/json"))]
    #[case("x-token:abc:def", ("x-token", "abc:def"))]
    #[case("Empty:", ("Empty", ""))]
    fn test_parse_header(#[case] header: &str, #[case] expected: (&str, &str)) {
        let (name, value) = parse_header(header).unwrap();

        assert_eq!((name.as_str(), value.as_str()), expected);
    }

    #[rstest]
    #[case("no separator")]
    #[case(": value")]
    fn test_parse_header_invalid(#[case] header: &str) {
        assert!(parse_header(header).is_err());
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::parse_from(["disclosure", "verify", "out.json", "--use-embedded-notary"]);

        match cli.command {
            Command::Verify(args) => {
                assert_eq!(args.presentation, PathBuf::from("out.json"));
                assert!(args.use_embedded_notary);
            }
            command => panic!("unexpected command: {command:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_range() {
        let result = Cli::try_parse_from([
            "disclosure",
            "notarize",
            "--reveal-recv",
            "bytes:ten..twenty",
        ]);

        assert!(result.is_err());
    }
}
