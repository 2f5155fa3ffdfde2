use std::{error::Error, fmt};

use disclosure_engine::EngineError;

/// Kind of a [`BoundaryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryErrorKind {
    /// The execution context is not running.
    Unreachable,
    /// A message could not be encoded or decoded.
    Serialization,
    /// The call did not complete within its deadline.
    Timeout,
}

/// A transport failure of the execution boundary.
#[derive(Debug, thiserror::Error)]
pub struct BoundaryError {
    kind: BoundaryErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl BoundaryError {
    pub(crate) fn new<E>(kind: BoundaryErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    pub(crate) fn unexpected(response: &str) -> Self {
        Self::new(
            BoundaryErrorKind::Serialization,
            format!("unexpected response: {response}"),
        )
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> BoundaryErrorKind {
        self.kind
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("boundary error: ")?;

        match self.kind {
            BoundaryErrorKind::Unreachable => f.write_str("execution context unreachable")?,
            BoundaryErrorKind::Serialization => f.write_str("serialization error")?,
            BoundaryErrorKind::Timeout => f.write_str("call timed out")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

/// Error for a call across the execution boundary.
///
/// A call either fails in transport, or the engine reports that the operation
/// itself failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The call did not reach the engine, or its reply did not come back.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    /// The engine reported a failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CallError {
    /// Returns the transport failure, if any.
    pub fn boundary(&self) -> Option<&BoundaryError> {
        match self {
            CallError::Boundary(err) => Some(err),
            CallError::Engine(_) => None,
        }
    }

    /// Returns the engine failure, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            CallError::Boundary(_) => None,
            CallError::Engine(err) => Some(err),
        }
    }
}
