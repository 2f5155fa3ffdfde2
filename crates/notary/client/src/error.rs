//! Notary client errors.
//!
//! This module handles errors that might occur while discovering a notary:
//! connecting to it, calling its HTTP API and resolving its public key.

use derive_builder::UninitializedFieldError;
use std::{error::Error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub(crate) enum ErrorKind {
    Internal,
    Builder,
    Url,
    Connection,
    TlsSetup,
    Http,
    Timeout,
    Key,
}

/// Error for the notary client.
#[derive(Debug, thiserror::Error)]
pub struct ClientError {
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ClientError {
    pub(crate) fn new(kind: ErrorKind, source: Option<Box<dyn Error + Send + Sync>>) -> Self {
        Self { kind, source }
    }

    /// Returns whether the notary could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Connection | ErrorKind::TlsSetup | ErrorKind::Timeout
        )
    }

    /// Returns whether the notary's public key could not be parsed.
    pub fn is_key(&self) -> bool {
        matches!(self.kind, ErrorKind::Key)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("client error: ")?;

        match self.kind {
            ErrorKind::Internal => f.write_str("internal error")?,
            ErrorKind::Builder => f.write_str("builder error")?,
            ErrorKind::Url => f.write_str("invalid notary url")?,
            ErrorKind::Connection => f.write_str("connection error")?,
            ErrorKind::TlsSetup => f.write_str("tls setup error")?,
            ErrorKind::Http => f.write_str("http error")?,
            ErrorKind::Timeout => f.write_str("request timed out")?,
            ErrorKind::Key => f.write_str("invalid notary key")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

impl From<UninitializedFieldError> for ClientError {
    fn from(ufe: UninitializedFieldError) -> Self {
        ClientError::new(ErrorKind::Builder, Some(Box::new(ufe)))
    }
}
