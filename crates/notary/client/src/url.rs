//! Notary base URLs.

use http::Uri;
use std::{fmt, str::FromStr};

use crate::error::{ClientError, ErrorKind};

/// The base URL of a notary, e.g. `https://notary.example.com:7047/v1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryUrl {
    tls: bool,
    host: String,
    port: u16,
    path_prefix: String,
}

impl NotaryUrl {
    /// Parses a notary base URL.
    ///
    /// The scheme must be `http` or `https`. The port defaults to 80 or 443.
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let uri: Uri = url
            .parse()
            .map_err(|err| ClientError::new(ErrorKind::Url, Some(Box::new(err))))?;

        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => {
                return Err(ClientError::new(
                    ErrorKind::Url,
                    Some(format!("unsupported notary url scheme: {url}").into()),
                ))
            }
        };

        let host = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                ClientError::new(
                    ErrorKind::Url,
                    Some(format!("notary url has no host: {url}").into()),
                )
            })?
            .to_string();

        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path_prefix = uri.path().trim_end_matches('/').to_string();

        Ok(Self {
            tls,
            host,
            port,
            path_prefix,
        })
    }

    /// Returns whether the notary is reached over TLS.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Returns the notary host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the notary port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the path prefix, without a trailing slash.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    fn authority(&self) -> String {
        match (self.tls, self.port) {
            (true, 443) | (false, 80) => self.host.clone(),
            (_, port) => format!("{}:{}", self.host, port),
        }
    }

    /// Returns the HTTP URL of an endpoint of the notary API.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}{}{path}", self.authority(), self.path_prefix)
    }

    /// Returns the WebSocket URL of a notarization session.
    pub fn session_url(&self, session_id: &str) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!(
            "{scheme}://{}{}/notarize?sessionId={session_id}",
            self.authority(),
            self.path_prefix
        )
    }
}

impl FromStr for NotaryUrl {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NotaryUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{scheme}://{}{}", self.authority(), self.path_prefix)
    }
}
