use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

/// Kind of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineErrorKind {
    /// The engine has not been initialized.
    Uninitialized,
    /// The operation is not valid in the current prover state, or the prover
    /// handle is unknown.
    State,
    /// Invalid configuration or request description.
    Config,
    /// Connecting to the server or the notary failed.
    Connection,
    /// The HTTP exchange with the server failed.
    Http,
    /// The transcript exceeds the configured data limits.
    Limit,
    /// The notary refused to notarize, or its attestation is inconsistent with
    /// the request.
    Notarization,
    /// The presentation could not be built.
    Presentation,
    /// The presentation did not verify.
    Verification,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErrorKind::Uninitialized => f.write_str("uninitialized"),
            EngineErrorKind::State => f.write_str("state"),
            EngineErrorKind::Config => f.write_str("config"),
            EngineErrorKind::Connection => f.write_str("connection"),
            EngineErrorKind::Http => f.write_str("http"),
            EngineErrorKind::Limit => f.write_str("limit"),
            EngineErrorKind::Notarization => f.write_str("notarization"),
            EngineErrorKind::Presentation => f.write_str("presentation"),
            EngineErrorKind::Verification => f.write_str("verification"),
        }
    }
}

/// Error reported by the engine.
///
/// Engine errors cross the execution boundary, so the cause is carried as a
/// rendered message rather than a live error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub struct EngineError {
    kind: EngineErrorKind,
    message: String,
}

impl EngineError {
    /// Creates a new engine error.
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn with_source<E>(kind: EngineErrorKind, context: &str, source: E) -> Self
    where
        E: Error,
    {
        let mut message = format!("{context}: {source}");
        let mut cause = source.source();
        while let Some(err) = cause {
            let err_msg = err.to_string();
            if !message.contains(&err_msg) {
                message.push_str(" caused by: ");
                message.push_str(&err_msg);
            }
            cause = err.source();
        }

        Self { kind, message }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::State, message)
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Config, message)
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine error: {} error: {}", self.kind, self.message)
    }
}
