//! Errors of the notarization workflow.

use std::{error::Error, fmt};

use disclosure_boundary::{BoundaryErrorKind, CallError};
use disclosure_engine::EngineErrorKind;
use disclosure_notary_client::ClientError;

use crate::{selector::SelectionError, SessionState};

/// Kind of a [`NotarizationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The execution context or the notary could not be reached, a message
    /// was rejected, or a call timed out.
    Boundary(BoundaryErrorKind),
    /// The engine reported a failure.
    Engine,
    /// A requested disclosure could not be resolved against the transcript.
    Selection,
    /// The notary refused to notarize the commit.
    Notarization,
    /// The presentation did not verify.
    Verification,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Boundary(BoundaryErrorKind::Unreachable) => f.write_str("unreachable"),
            ErrorKind::Boundary(BoundaryErrorKind::Serialization) => {
                f.write_str("serialization error")
            }
            ErrorKind::Boundary(BoundaryErrorKind::Timeout) => f.write_str("timeout"),
            ErrorKind::Engine => f.write_str("engine error"),
            ErrorKind::Selection => f.write_str("selection error"),
            ErrorKind::Notarization => f.write_str("notarization failure"),
            ErrorKind::Verification => f.write_str("verification failure"),
        }
    }
}

/// Error for a notarization session.
///
/// Identifies the stage of the workflow which failed: the state the session
/// was in when the failing step started.
#[derive(Debug, thiserror::Error)]
pub struct NotarizationError {
    stage: SessionState,
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl NotarizationError {
    pub(crate) fn new<E>(stage: SessionState, kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            stage,
            kind,
            source: Some(source.into()),
        }
    }

    /// Returns the stage at which the session failed.
    pub fn stage(&self) -> SessionState {
        self.stage
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns whether a requested disclosure could not be resolved.
    pub fn is_selection(&self) -> bool {
        matches!(self.kind, ErrorKind::Selection)
    }

    pub(crate) fn from_call(stage: SessionState, err: CallError) -> Self {
        let kind = match &err {
            CallError::Boundary(err) => ErrorKind::Boundary(err.kind()),
            CallError::Engine(err) => match err.kind() {
                EngineErrorKind::Notarization => ErrorKind::Notarization,
                EngineErrorKind::Verification => ErrorKind::Verification,
                _ => ErrorKind::Engine,
            },
        };

        Self::new(stage, kind, err)
    }

    pub(crate) fn from_notary(stage: SessionState, err: ClientError) -> Self {
        let kind = if err.is_unreachable() {
            ErrorKind::Boundary(BoundaryErrorKind::Unreachable)
        } else {
            ErrorKind::Engine
        };

        Self::new(stage, kind, err)
    }

    pub(crate) fn from_selection(stage: SessionState, err: SelectionError) -> Self {
        Self::new(stage, ErrorKind::Selection, err)
    }
}

impl fmt::Display for NotarizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notarization error: {} in {} state", self.kind, self.stage)?;

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}
