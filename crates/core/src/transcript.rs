//! Transcript types.
//!
//! All application data communicated with the server is referred to as a
//! [`Transcript`]. A transcript is essentially just two vectors of bytes, each
//! corresponding to a [`Direction`].
//!
//! The transcript itself carries no application layer semantics. For HTTP,
//! the engine recovers them by parsing each direction and recording the byte
//! ranges of the start line, headers, line breaks, body and JSON members in a
//! [`MessageIndex`]. A transcript together with its indices forms a
//! [`CapturedTranscript`], which is what the selection logic operates on.

mod http;
mod json;

use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::connection::TranscriptLength;

pub use http::{HeaderSpan, HttpParseError, JsonSpan, MessageIndex};

/// A transcript contains all the data communicated with the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Data sent from the Prover to the Server.
    sent: Vec<u8>,
    /// Data received by the Prover from the Server.
    received: Vec<u8>,
}

opaque_debug::implement!(Transcript);

impl Transcript {
    /// Creates a new transcript.
    pub fn new(sent: impl Into<Vec<u8>>, received: impl Into<Vec<u8>>) -> Self {
        Self {
            sent: sent.into(),
            received: received.into(),
        }
    }

    /// Returns a reference to the sent data.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Returns a reference to the received data.
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Returns the data of the given direction.
    pub fn data(&self, direction: Direction) -> &[u8] {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.received,
        }
    }

    /// Returns the length of the sent and received data, respectively.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> (usize, usize) {
        (self.sent.len(), self.received.len())
    }

    /// Returns the length of the transcript in the given direction.
    pub fn len_of_direction(&self, direction: Direction) -> usize {
        self.data(direction).len()
    }

    /// Returns the transcript length.
    pub fn length(&self) -> TranscriptLength {
        TranscriptLength {
            sent: self.sent.len() as u32,
            received: self.received.len() as u32,
        }
    }

    /// Returns the bytes of `range` in the given direction, or `None` if the
    /// range is out of bounds.
    pub fn get(&self, direction: Direction, range: Range<usize>) -> Option<&[u8]> {
        self.data(direction).get(range)
    }
}

/// A transcript captured by the engine, indexed with the semantic sub-ranges
/// of each HTTP message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedTranscript {
    transcript: Transcript,
    sent_index: MessageIndex,
    recv_index: MessageIndex,
}

impl CapturedTranscript {
    /// Indexes a transcript containing one HTTP request and its response.
    ///
    /// A direction which can not be parsed as an HTTP message gets an empty
    /// index.
    pub fn new(transcript: Transcript) -> Self {
        let sent_index = MessageIndex::parse_request(transcript.sent()).unwrap_or_else(|err| {
            tracing::warn!("failed to index sent data: {err}");
            MessageIndex::default()
        });
        let recv_index = MessageIndex::parse_response(transcript.received()).unwrap_or_else(|err| {
            tracing::warn!("failed to index received data: {err}");
            MessageIndex::default()
        });

        Self {
            transcript,
            sent_index,
            recv_index,
        }
    }

    /// Creates a captured transcript from precomputed indices.
    pub fn from_parts(
        transcript: Transcript,
        sent_index: MessageIndex,
        recv_index: MessageIndex,
    ) -> Self {
        Self {
            transcript,
            sent_index,
            recv_index,
        }
    }

    /// Returns the transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the index of the given direction.
    pub fn index(&self, direction: Direction) -> &MessageIndex {
        match direction {
            Direction::Sent => &self.sent_index,
            Direction::Received => &self.recv_index,
        }
    }

    /// Returns the transcript, discarding the indices.
    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }
}

/// The direction of data communicated with the server.
///
/// This is used to differentiate between data sent from the Prover to the
/// server, and data received by the Prover from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent from the Prover to the server.
    Sent = 0x00,
    /// Received by the Prover from the server.
    Received = 0x01,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Sent => write!(f, "sent"),
            Direction::Received => write!(f, "received"),
        }
    }
}
