//! Connection types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ServerName(String);

impl ServerName {
    /// Creates a new server name.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidServerName> {
        let name = name.into();
        validate_dns_name(&name)?;

        Ok(Self(name))
    }

    /// Returns the server name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServerName {
    type Error = InvalidServerName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ServerName {
    type Error = InvalidServerName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Error returned when a server name is not a valid DNS name.
#[derive(Debug, thiserror::Error)]
#[error("invalid server name: {0:?}")]
pub struct InvalidServerName(String);

fn validate_dns_name(name: &str) -> Result<(), InvalidServerName> {
    let invalid = || InvalidServerName(name.to_string());

    if name.is_empty() || name.len() > 253 {
        return Err(invalid());
    }

    for label in name.trim_end_matches('.').split('.') {
        if label.is_empty()
            || label.len() > 63
            || label.starts_with('-')
            || label.ends_with('-')
            || !label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid());
        }
    }

    Ok(())
}

/// Transcript length information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptLength {
    /// Number of bytes sent by the Prover to the Server.
    pub sent: u32,
    /// Number of bytes received by the Prover from the Server.
    pub received: u32,
}

/// Connection information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// UNIX time when the connection was notarized.
    pub time: u64,
    /// Transcript length.
    pub transcript_length: TranscriptLength,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::simple("example.test")]
    #[case::subdomain("api.example.test")]
    #[case::localhost("localhost")]
    #[case::trailing_dot("example.test.")]
    fn test_server_name_valid(#[case] name: &str) {
        assert_eq!(ServerName::new(name).unwrap().as_str(), name);
    }

    #[rstest]
    #[case::empty("")]
    #[case::empty_label("example..test")]
    #[case::hyphen("-example.test")]
    #[case::space("exa mple.test")]
    #[case::port("example.test:443")]
    fn test_server_name_invalid(#[case] name: &str) {
        assert!(ServerName::new(name).is_err());
    }

    #[test]
    fn test_server_name_deserialize_validates() {
        assert!(serde_json::from_str::<ServerName>("\"example.test\"").is_ok());
        assert!(serde_json::from_str::<ServerName>("\"bad name\"").is_err());
    }
}
