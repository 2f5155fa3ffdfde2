use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use disclosure::{Disclosure, NotarizeOptions};
use disclosure_core::{commit::RangeSpec, signing::VerifyingKey};
use disclosure_engine::{
    config::{DEFAULT_MAX_RECV_DATA, DEFAULT_MAX_SENT_DATA},
    EngineConfig, HttpRequest, Method,
};
use disclosure_notary_client::{HttpNotaryApi, NotaryReference};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command};

/// Prefix of the environment variables read into the settings, e.g.
/// `DISCLOSURE__NOTARY__URL`.
pub const ENV_PREFIX: &str = "DISCLOSURE";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notary: NotarySettings,
    pub proxy: ProxySettings,
    pub request: RequestSettings,
    pub disclosure: DisclosureSettings,
    pub limits: LimitSettings,
    pub output: OutputSettings,
    pub logging: LogSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotarySettings {
    /// Base URL of the notary.
    pub url: String,
    /// API key sent to notaries which whitelist their clients.
    pub api_key: Option<String>,
    /// Pinned public key of the notary, PEM or hex encoded. Fetched from the
    /// notary when unset.
    pub public_key: Option<String>,
    /// Timeout of each notary request in seconds.
    pub request_timeout: u64,
}

impl Default for NotarySettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7047".to_string(),
            api_key: None,
            public_key: None,
            request_timeout: 60,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// URL of the WebSocket proxy used to reach the server.
    pub url: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:55688".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisclosureMode {
    #[default]
    Simplified,
    Detailed,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisclosureSettings {
    pub mode: DisclosureMode,
    /// Ranges of the request, in textual form, e.g. `header:host`.
    pub sent: Vec<String>,
    /// Ranges of the response, in textual form, e.g. `json:data.id`.
    pub recv: Vec<String>,
}

impl DisclosureSettings {
    pub fn to_disclosure(&self) -> Result<Disclosure, anyhow::Error> {
        let parse = |specs: &[String]| {
            specs
                .iter()
                .map(|spec| spec.parse::<RangeSpec>())
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(match self.mode {
            DisclosureMode::Simplified => Disclosure::Simplified,
            DisclosureMode::Detailed => Disclosure::Detailed {
                sent: parse(&self.sent)?,
                recv: parse(&self.recv)?,
            },
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_sent_data: usize,
    pub max_recv_data: usize,
    /// Deadline of each engine call in milliseconds.
    pub call_timeout_ms: Option<u64>,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_sent_data: DEFAULT_MAX_SENT_DATA,
            max_recv_data: DEFAULT_MAX_RECV_DATA,
            call_timeout_ms: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Path the presentation is written to.
    pub presentation: PathBuf,
    /// Path the verification result is written to. Printed when unset.
    pub result: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            presentation: PathBuf::from("presentation.json"),
            result: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Log verbosity level of the crates of this workspace. Default is DEBUG.
    pub level: String,
    /// Custom filtering logic, refer to the syntax here https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#example-syntax
    /// This will override the default filtering logic based on `level`.
    pub filter: Option<String>,
    /// Log format. Available options are "COMPACT" and "JSON".
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "DEBUG".to_string(),
            filter: None,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl Settings {
    /// Loads the settings from the defaults, the config file, the
    /// environment and the command line, in increasing precedence.
    pub fn new(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        // Add the config file if it exists
        if cli.config.exists() {
            info!("Loading configuration from: {}", cli.config.display());
            builder = builder.add_source(File::from(cli.config.as_path()));
        } else {
            warn!(
                "Config file not found: {}. Using defaults and overrides.",
                cli.config.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        // Add CLI overrides
        if let Some(log_level) = &cli.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }
        if let Some(notary_url) = &cli.notary_url {
            builder = builder.set_override("notary.url", notary_url.clone())?;
        }
        if let Some(notary_key) = &cli.notary_key {
            builder = builder.set_override("notary.public_key", notary_key.clone())?;
        }
        if let Command::Notarize(args) = &cli.command {
            if let Some(url) = &args.url {
                builder = builder.set_override("request.url", url.clone())?;
            }
            if let Some(method) = &args.method {
                builder = builder.set_override("request.method", method.clone())?;
            }
            if let Some(body) = &args.body {
                builder = builder.set_override("request.body", body.clone())?;
            }
            if let Some(proxy_url) = &args.proxy_url {
                builder = builder.set_override("proxy.url", proxy_url.clone())?;
            }
            if let Some(output) = &args.output {
                builder = builder.set_override("output.presentation", path_value(output))?;
            }
            if let Some(result) = &args.result {
                builder = builder.set_override("output.result", path_value(result))?;
            }
        }

        let config = builder.build()?;

        let mut settings: Settings = config.try_deserialize()?;

        if let Command::Notarize(args) = &cli.command {
            settings
                .request
                .headers
                .extend(args.headers.iter().cloned());

            if !args.reveal_sent.is_empty() || !args.reveal_recv.is_empty() {
                settings.disclosure = DisclosureSettings {
                    mode: DisclosureMode::Detailed,
                    sent: args.reveal_sent.iter().map(ToString::to_string).collect(),
                    recv: args.reveal_recv.iter().map(ToString::to_string).collect(),
                };
            }
        }

        debug!("Loaded settings: {:?}", settings.redacted());

        Ok(settings)
    }

    /// Returns a copy without secrets, for logging.
    fn redacted(&self) -> Self {
        let mut settings = self.clone();
        if settings.notary.api_key.is_some() {
            settings.notary.api_key = Some("<redacted>".to_string());
        }
        settings
    }

    /// Returns the client of the notary API described by the settings.
    pub fn notary_api(&self) -> Result<HttpNotaryApi, anyhow::Error> {
        let mut api = HttpNotaryApi::builder();
        api.request_timeout(self.notary.request_timeout);
        if let Some(api_key) = &self.notary.api_key {
            api.api_key(api_key.clone());
        }

        Ok(api.build()?)
    }

    /// Returns the notary reference described by the settings.
    pub fn notary_reference(&self) -> Result<NotaryReference, anyhow::Error> {
        let api = Arc::new(self.notary_api()?);
        let mut notary = NotaryReference::with_api(&self.notary.url, api)?;
        if let Some(key) = &self.notary.public_key {
            notary = notary.with_public_key(VerifyingKey::parse(key)?);
        }

        Ok(notary)
    }

    /// Returns the configuration of the engines running sessions, which
    /// request notarization sessions with the configured API key.
    pub fn engine_config(&self) -> Result<EngineConfig, anyhow::Error> {
        Ok(EngineConfig::builder()
            .notary_api(Arc::new(self.notary_api()?))
            .build()?)
    }

    /// Returns the request described by the settings.
    pub fn http_request(&self) -> Result<HttpRequest, anyhow::Error> {
        if self.request.url.is_empty() {
            anyhow::bail!("no request url configured, set request.url or pass --url");
        }

        let method = if self.request.method.is_empty() {
            Method::default()
        } else {
            self.request
                .method
                .parse::<Method>()
                .map_err(anyhow::Error::msg)?
        };

        Ok(HttpRequest {
            url: self.request.url.clone(),
            method,
            headers: self.request.headers.clone(),
            body: self.request.body.clone().map(String::into_bytes),
        })
    }

    /// Returns the options of a notarization session.
    pub fn notarize_options(&self) -> Result<NotarizeOptions, anyhow::Error> {
        let mut builder = NotarizeOptions::builder();
        builder
            .notary(self.notary_reference()?)
            .websocket_proxy_url(self.proxy.url.clone())
            .request(self.http_request()?)
            .disclosure(self.disclosure.to_disclosure()?)
            .max_sent_data(self.limits.max_sent_data)
            .max_recv_data(self.limits.max_recv_data);

        if let Some(timeout) = self.limits.call_timeout_ms {
            builder.call_timeout(Duration::from_millis(timeout));
        }

        Ok(builder.build()?)
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["disclosure", "--config", "does-not-exist.toml"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::new(&cli(&["verify", "presentation.json"])).unwrap();

        assert_eq!(settings.notary.url, "http://127.0.0.1:7047");
        assert_eq!(settings.logging.level, "DEBUG");
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert_eq!(settings.limits.max_sent_data, DEFAULT_MAX_SENT_DATA);
        assert_eq!(settings.disclosure.mode, DisclosureMode::Simplified);
        assert_eq!(settings.output.presentation, PathBuf::from("presentation.json"));
    }

    #[test]
    fn test_cli_overrides() {
        let settings = Settings::new(&cli(&[
            "--log-level",
            "INFO",
            "--notary-url",
            "https://notary.test",
            "notarize",
            "--url",
            "https://example.test/api/widget",
            "-H",
            "Accept: application/json",
            "--reveal-sent",
            "header:host",
            "--reveal-recv",
            "json:price.amount",
            "--output",
            "out.json",
        ]))
        .unwrap();

        assert_eq!(settings.logging.level, "INFO");
        assert_eq!(settings.notary.url, "https://notary.test");
        assert_eq!(settings.request.url, "https://example.test/api/widget");
        assert_eq!(settings.request.headers["Accept"], "application/json");
        assert_eq!(settings.output.presentation, PathBuf::from("out.json"));
        assert_eq!(
            settings.disclosure.to_disclosure().unwrap(),
            Disclosure::Detailed {
                sent: vec![RangeSpec::Header("host".to_string())],
                recv: vec![RangeSpec::Json("price.amount".to_string())],
            }
        );
    }

    #[test]
    fn test_config_file() {
        let path = write_config(
            "disclosure-settings",
            r#"
[notary]
url = "https://notary.example"
request_timeout = 5

[request]
url = "https://example.test/api/order"
method = "POST"
body = '{"item":"widget","quantity":2}'

[request.headers]
content-type = "application/json"

[disclosure]
mode = "detailed"
sent = ["info", "body"]
recv = ["bytes:0..12"]

[limits]
call_timeout_ms = 2500

[logging]
format = "JSON"
"#,
        );
        let config = path.to_string_lossy().into_owned();
        let cli = Cli::parse_from(["disclosure", "--config", config.as_str(), "notarize"]);

        let settings = Settings::new(&cli).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.notary.url, "https://notary.example");
        assert_eq!(settings.notary.request_timeout, 5);
        assert_eq!(settings.logging.format, LogFormat::Json);
        // Sections absent from the file keep their defaults.
        assert_eq!(settings.proxy.url, "ws://127.0.0.1:55688");

        let request = settings.http_request().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"item":"widget","quantity":2}"#.as_slice())
        );

        let options = settings.notarize_options().unwrap();
        assert_eq!(options.call_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(
            options.disclosure(),
            &Disclosure::Detailed {
                sent: vec![RangeSpec::Info, RangeSpec::Body],
                recv: vec![RangeSpec::Bytes { start: 0, end: 12 }],
            }
        );
        assert!(settings.engine_config().is_ok());
    }

    #[rstest]
    #[case::missing_url(&[] as &[&str])]
    #[case::bad_method(&["--url", "https://example.test/", "--method", "TRACE"])]
    fn test_invalid_request(#[case] args: &[&str]) {
        let mut argv = vec!["notarize"];
        argv.extend_from_slice(args);

        let settings = Settings::new(&cli(&argv)).unwrap();

        assert!(settings.http_request().is_err());
    }

    #[test]
    fn test_invalid_range_spec() {
        let settings = DisclosureSettings {
            mode: DisclosureMode::Detailed,
            sent: vec!["bytes:0-10".to_string()],
            recv: Vec::new(),
        };

        assert!(settings.to_disclosure().is_err());
    }

    #[test]
    fn test_notary_reference_pinned_key() {
        let mut settings = Settings::default();
        settings.notary.public_key = Some("not a key".to_string());

        assert!(settings.notary_reference().is_err());
    }
}
