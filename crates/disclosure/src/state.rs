//! State of a notarization session.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NotarizationError;

/// State of a notarization session.
///
/// A session moves through the states in declaration order. It ends in
/// [`Verified`](SessionState::Verified), or in
/// [`Failed`](SessionState::Failed) from any earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing has happened yet.
    Idle,
    /// A fresh engine is running and initialized.
    EngineInitialized,
    /// The engine hosts a prover for the session.
    ProverCreated,
    /// The prover is linked to a notarization session.
    NotaryLinked,
    /// The request was sent to the server and answered.
    RequestSent,
    /// The transcript of the exchange was captured.
    TranscriptCaptured,
    /// The ranges to disclose were selected.
    Committed,
    /// The notary attested to the transcript.
    Notarized,
    /// A presentation of the disclosed ranges was built.
    PresentationBuilt,
    /// The presentation verified.
    Verified,
    /// The session failed.
    Failed,
}

impl SessionState {
    /// Returns whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Verified | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::EngineInitialized => "engine initialized",
            SessionState::ProverCreated => "prover created",
            SessionState::NotaryLinked => "notary linked",
            SessionState::RequestSent => "request sent",
            SessionState::TranscriptCaptured => "transcript captured",
            SessionState::Committed => "committed",
            SessionState::Notarized => "notarized",
            SessionState::PresentationBuilt => "presentation built",
            SessionState::Verified => "verified",
            SessionState::Failed => "failed",
        };

        f.write_str(name)
    }
}

/// Observes the state transitions of notarization sessions.
pub trait SessionObserver: Send {
    /// Called after the session with the given id entered `state`.
    fn on_transition(&mut self, session_id: Uuid, state: SessionState);

    /// Called when the session failed, after the transition to
    /// [`SessionState::Failed`].
    fn on_failure(&mut self, session_id: Uuid, error: &NotarizationError) {
        let _ = (session_id, error);
    }
}

impl<F> SessionObserver for F
where
    F: FnMut(Uuid, SessionState) + Send,
{
    fn on_transition(&mut self, session_id: Uuid, state: SessionState) {
        self(session_id, state)
    }
}

/// One end-to-end notarization attempt.
///
/// Owned by the orchestrator for the duration of a single call. The artifacts
/// of each stage are owned by the running workflow, so a failed session
/// leaves none behind.
pub(crate) struct NotarizationSession<'a> {
    id: Uuid,
    state: SessionState,
    observer: &'a mut dyn SessionObserver,
}

impl<'a> NotarizationSession<'a> {
    pub(crate) fn new(observer: &'a mut dyn SessionObserver) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            observer,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to the next state.
    pub(crate) fn advance(&mut self, state: SessionState) {
        debug_assert!(state > self.state && !self.state.is_terminal());

        tracing::debug!(session = %self.id, from = %self.state, to = %state, "transition");

        self.state = state;
        self.observer.on_transition(self.id, state);
    }

    /// Fails the session.
    pub(crate) fn fail(&mut self, error: &NotarizationError) {
        tracing::warn!(session = %self.id, stage = %self.state, "session failed: {error}");

        self.state = SessionState::Failed;
        self.observer.on_transition(self.id, SessionState::Failed);
        self.observer.on_failure(self.id, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, BoundaryErrorKind};

    #[test]
    fn test_transitions_are_reported() {
        let mut states = Vec::new();
        let mut observer = |_: Uuid, state: SessionState| states.push(state);

        let mut session = NotarizationSession::new(&mut observer);
        session.advance(SessionState::EngineInitialized);
        session.advance(SessionState::ProverCreated);

        let err = NotarizationError::new(
            session.state(),
            ErrorKind::Boundary(BoundaryErrorKind::Timeout),
            "deadline elapsed",
        );
        session.fail(&err);
        assert_eq!(session.state(), SessionState::Failed);
        drop(session);

        assert_eq!(
            states,
            vec![
                SessionState::EngineInitialized,
                SessionState::ProverCreated,
                SessionState::Failed
            ]
        );
        assert_eq!(err.stage(), SessionState::ProverCreated);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Verified.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::PresentationBuilt.is_terminal());
        assert!(SessionState::Idle < SessionState::Verified);
    }

    #[test]
    fn test_error_display() {
        let err = NotarizationError::new(
            SessionState::TranscriptCaptured,
            ErrorKind::Selection,
            "request has no header:x-missing",
        );

        assert_eq!(
            err.to_string(),
            "notarization error: selection error in transcript captured state caused by: \
             request has no header:x-missing"
        );
    }
}
