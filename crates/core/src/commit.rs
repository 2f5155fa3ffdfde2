//! Transcript commits.
//!
//! A [`Commit`] is the selection of transcript byte ranges which will be
//! revealed in a presentation. Every range is tagged with the [`Direction`] it
//! belongs to and a [`RangeLabel`] describing what it covers. All transcript
//! bytes outside of a commit remain committed by the Notary but hidden.
//!
//! Ranges of one direction are kept strictly increasing and non-overlapping,
//! which makes two commits over the same selection compare equal.

use std::{fmt, ops::Range, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{connection::TranscriptLength, transcript::Direction};

/// Semantic label of a [`TranscriptRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeLabel {
    /// The request line or status line.
    Info,
    /// A header line, labelled with the lowercase header name.
    Header(String),
    /// A line break in the message head.
    LineBreak,
    /// The message body.
    Body,
    /// A JSON member, labelled with its dotted path.
    Json(String),
    /// Raw bytes without further semantics.
    Bytes,
}

impl fmt::Display for RangeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeLabel::Info => write!(f, "info"),
            RangeLabel::Header(name) => write!(f, "header:{name}"),
            RangeLabel::LineBreak => write!(f, "line-break"),
            RangeLabel::Body => write!(f, "body"),
            RangeLabel::Json(path) => write!(f, "json:{path}"),
            RangeLabel::Bytes => write!(f, "bytes"),
        }
    }
}

/// A half-open byte interval of one transcript direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "validation::TranscriptRangeUnchecked")]
pub struct TranscriptRange {
    direction: Direction,
    start: usize,
    end: usize,
    label: RangeLabel,
}

impl TranscriptRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty.
    pub fn new(
        direction: Direction,
        range: Range<usize>,
        label: RangeLabel,
    ) -> Result<Self, CommitError> {
        if range.start >= range.end {
            return Err(CommitError::new(
                ErrorKind::Empty,
                format!("range {range:?} is empty"),
            ));
        }

        Ok(Self {
            direction,
            start: range.start,
            end: range.end,
            label,
        })
    }

    /// Returns the direction of the range.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the start of the range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the end of the range, non-inclusive.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns the byte range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Returns the number of bytes in the range.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns the label of the range.
    pub fn label(&self) -> &RangeLabel {
        &self.label
    }
}

/// Selection of transcript ranges to reveal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "validation::CommitUnchecked")]
pub struct Commit {
    sent: Vec<TranscriptRange>,
    recv: Vec<TranscriptRange>,
}

impl Commit {
    /// Creates a new builder for a transcript of the given length.
    pub fn builder(length: TranscriptLength) -> CommitBuilder {
        CommitBuilder::new(length)
    }

    /// Returns the ranges of sent data.
    pub fn sent(&self) -> &[TranscriptRange] {
        &self.sent
    }

    /// Returns the ranges of received data.
    pub fn recv(&self) -> &[TranscriptRange] {
        &self.recv
    }

    /// Returns the ranges of the given direction.
    pub fn ranges(&self, direction: Direction) -> &[TranscriptRange] {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.recv,
        }
    }

    /// Returns an iterator over all ranges, sent before received.
    pub fn iter(&self) -> impl Iterator<Item = &TranscriptRange> {
        self.sent.iter().chain(self.recv.iter())
    }

    /// Returns the total number of ranges.
    pub fn len(&self) -> usize {
        self.sent.len() + self.recv.len()
    }

    /// Returns whether the commit contains no ranges.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty() && self.recv.is_empty()
    }

    /// Checks that every range lies within a transcript of the given length.
    pub fn validate_bounds(&self, length: &TranscriptLength) -> Result<(), CommitError> {
        for range in self.iter() {
            let len = direction_len(length, range.direction);
            if range.end > len {
                return Err(CommitError::new(
                    ErrorKind::OutOfBounds,
                    format!(
                        "{} range {:?} exceeds transcript length {len}",
                        range.direction,
                        range.range()
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for [`Commit`].
///
/// Ranges must be added in increasing order per direction.
#[derive(Debug)]
pub struct CommitBuilder {
    length: TranscriptLength,
    sent: Vec<TranscriptRange>,
    recv: Vec<TranscriptRange>,
}

impl CommitBuilder {
    /// Creates a new builder for a transcript of the given length.
    pub fn new(length: TranscriptLength) -> Self {
        Self {
            length,
            sent: Vec::new(),
            recv: Vec::new(),
        }
    }

    /// Adds a range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds of the transcript, or if
    /// it does not start after the previous range of the same direction ends.
    pub fn range(&mut self, range: TranscriptRange) -> Result<&mut Self, CommitError> {
        let len = direction_len(&self.length, range.direction);
        if range.end > len {
            return Err(CommitError::new(
                ErrorKind::OutOfBounds,
                format!(
                    "{} range {:?} exceeds transcript length {len}",
                    range.direction,
                    range.range()
                ),
            ));
        }

        let ranges = match range.direction {
            Direction::Sent => &mut self.sent,
            Direction::Received => &mut self.recv,
        };

        push_ordered(ranges, range)?;

        Ok(self)
    }

    /// Adds a range of sent data.
    pub fn sent(
        &mut self,
        range: Range<usize>,
        label: RangeLabel,
    ) -> Result<&mut Self, CommitError> {
        self.range(TranscriptRange::new(Direction::Sent, range, label)?)
    }

    /// Adds a range of received data.
    pub fn recv(
        &mut self,
        range: Range<usize>,
        label: RangeLabel,
    ) -> Result<&mut Self, CommitError> {
        self.range(TranscriptRange::new(Direction::Received, range, label)?)
    }

    /// Builds the commit.
    pub fn build(self) -> Commit {
        Commit {
            sent: self.sent,
            recv: self.recv,
        }
    }
}

fn direction_len(length: &TranscriptLength, direction: Direction) -> usize {
    match direction {
        Direction::Sent => length.sent as usize,
        Direction::Received => length.received as usize,
    }
}

fn push_ordered(ranges: &mut Vec<TranscriptRange>, range: TranscriptRange) -> Result<(), CommitError> {
    if let Some(last) = ranges.last() {
        if range.start < last.end {
            let kind = if range.start < last.start {
                ErrorKind::Order
            } else {
                ErrorKind::Overlap
            };

            return Err(CommitError::new(
                kind,
                format!(
                    "{} range {:?} does not follow {:?}",
                    range.direction,
                    range.range(),
                    last.range()
                ),
            ));
        }
    }

    ranges.push(range);

    Ok(())
}

/// A range specification, either explicit bytes or a named handle resolved
/// against the semantic index of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpec {
    /// An explicit byte interval.
    Bytes {
        /// Start of the interval.
        start: usize,
        /// End of the interval, non-inclusive.
        end: usize,
    },
    /// The request line or status line.
    Info,
    /// All header lines with the given name.
    Header(String),
    /// Every line break in the message head.
    LineBreaks,
    /// The message body.
    Body,
    /// The JSON member at the given dotted path.
    Json(String),
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpec::Bytes { start, end } => write!(f, "bytes:{start}..{end}"),
            RangeSpec::Info => write!(f, "info"),
            RangeSpec::Header(name) => write!(f, "header:{name}"),
            RangeSpec::LineBreaks => write!(f, "line-breaks"),
            RangeSpec::Body => write!(f, "body"),
            RangeSpec::Json(path) => write!(f, "json:{path}"),
        }
    }
}

impl FromStr for RangeSpec {
    type Err = InvalidRangeSpec;

    /// Parses the textual form, e.g. `header:host`, `json:data.id`,
    /// `bytes:0..10`, `info`, `body` or `line-breaks`. A bare name is a
    /// header name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRangeSpec(s.to_string());

        match s.split_once(':') {
            Some(("header", name)) if !name.is_empty() => Ok(RangeSpec::Header(name.to_string())),
            Some(("json", path)) if !path.is_empty() => Ok(RangeSpec::Json(path.to_string())),
            Some(("bytes", range)) => {
                let (start, end) = range.split_once("..").ok_or_else(invalid)?;
                Ok(RangeSpec::Bytes {
                    start: start.trim().parse().map_err(|_| invalid())?,
                    end: end.trim().parse().map_err(|_| invalid())?,
                })
            }
            Some(_) => Err(invalid()),
            None => match s {
                "info" => Ok(RangeSpec::Info),
                "body" => Ok(RangeSpec::Body),
                "line-breaks" => Ok(RangeSpec::LineBreaks),
                "" => Err(invalid()),
                name => Ok(RangeSpec::Header(name.to_string())),
            },
        }
    }
}

/// Error for an unparseable [`RangeSpec`].
#[derive(Debug, thiserror::Error)]
#[error("invalid range specification: {0:?}")]
pub struct InvalidRangeSpec(String);

/// Error for [`Commit`] construction.
#[derive(Debug, thiserror::Error)]
pub struct CommitError {
    kind: ErrorKind,
    msg: String,
}

impl CommitError {
    fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    /// Returns whether the error was caused by overlapping ranges.
    pub fn is_overlap(&self) -> bool {
        matches!(self.kind, ErrorKind::Overlap)
    }

    /// Returns whether the error was caused by an out of order range.
    pub fn is_out_of_order(&self) -> bool {
        matches!(self.kind, ErrorKind::Order)
    }

    /// Returns whether the error was caused by an out of bounds range.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.kind, ErrorKind::OutOfBounds)
    }
}

#[derive(Debug)]
enum ErrorKind {
    Empty,
    OutOfBounds,
    Overlap,
    Order,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("commit error: ")?;

        match self.kind {
            ErrorKind::Empty => f.write_str("empty range")?,
            ErrorKind::OutOfBounds => f.write_str("out of bounds")?,
            ErrorKind::Overlap => f.write_str("overlapping ranges")?,
            ErrorKind::Order => f.write_str("ranges out of order")?,
        }

        write!(f, ": {}", self.msg)
    }
}

mod validation {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct TranscriptRangeUnchecked {
        direction: Direction,
        start: usize,
        end: usize,
        label: RangeLabel,
    }

    impl TryFrom<TranscriptRangeUnchecked> for TranscriptRange {
        type Error = CommitError;

        fn try_from(unchecked: TranscriptRangeUnchecked) -> Result<Self, Self::Error> {
            TranscriptRange::new(
                unchecked.direction,
                unchecked.start..unchecked.end,
                unchecked.label,
            )
        }
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct CommitUnchecked {
        sent: Vec<TranscriptRange>,
        recv: Vec<TranscriptRange>,
    }

    impl TryFrom<CommitUnchecked> for Commit {
        type Error = CommitError;

        fn try_from(unchecked: CommitUnchecked) -> Result<Self, Self::Error> {
            let mut commit = Commit::default();

            for (direction, ranges, dest) in [
                (Direction::Sent, unchecked.sent, &mut commit.sent),
                (Direction::Received, unchecked.recv, &mut commit.recv),
            ] {
                for range in ranges {
                    if range.direction != direction {
                        return Err(CommitError::new(
                            ErrorKind::Order,
                            format!("{} range listed under {direction}", range.direction),
                        ));
                    }

                    push_ordered(dest, range)?;
                }
            }

            Ok(commit)
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn length() -> TranscriptLength {
        TranscriptLength {
            sent: 100,
            received: 200,
        }
    }

    #[rstest]
    fn test_commit_builder(length: TranscriptLength) {
        let mut builder = Commit::builder(length);
        builder
            .sent(0..10, RangeLabel::Info)
            .unwrap()
            .sent(12..20, RangeLabel::Header("host".into()))
            .unwrap()
            .recv(0..200, RangeLabel::Bytes)
            .unwrap();

        let commit = builder.build();

        assert_eq!(commit.len(), 3);
        assert_eq!(commit.sent()[1].range(), 12..20);
        assert_eq!(
            commit.iter().map(|r| r.direction()).collect::<Vec<_>>(),
            [Direction::Sent, Direction::Sent, Direction::Received]
        );
    }

    #[rstest]
    fn test_commit_rejects_overlap(length: TranscriptLength) {
        let mut builder = Commit::builder(length);
        builder.sent(0..10, RangeLabel::Bytes).unwrap();

        let err = builder.sent(5..15, RangeLabel::Bytes).unwrap_err();
        assert!(err.is_overlap());
    }

    #[rstest]
    fn test_commit_rejects_out_of_order(length: TranscriptLength) {
        let mut builder = Commit::builder(length);
        builder.recv(20..30, RangeLabel::Bytes).unwrap();

        let err = builder.recv(0..10, RangeLabel::Bytes).unwrap_err();
        assert!(err.is_out_of_order());
    }

    #[rstest]
    fn test_commit_adjacent_ranges(length: TranscriptLength) {
        let mut builder = Commit::builder(length);
        builder.sent(0..10, RangeLabel::Bytes).unwrap();

        assert!(builder.sent(10..11, RangeLabel::Bytes).is_ok());
    }

    #[rstest]
    fn test_commit_rejects_out_of_bounds(length: TranscriptLength) {
        let mut builder = Commit::builder(length);

        let err = builder.sent(90..101, RangeLabel::Bytes).unwrap_err();
        assert!(err.is_out_of_bounds());
    }

    #[test]
    fn test_range_rejects_empty() {
        assert!(TranscriptRange::new(Direction::Sent, 5..5, RangeLabel::Bytes).is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = 6..5;
        assert!(TranscriptRange::new(Direction::Sent, reversed, RangeLabel::Bytes).is_err());
    }

    #[rstest]
    fn test_commit_deserialize_validates(length: TranscriptLength) {
        let mut builder = Commit::builder(length);
        builder
            .sent(0..10, RangeLabel::Bytes)
            .unwrap()
            .sent(20..30, RangeLabel::Bytes)
            .unwrap();
        let commit = builder.build();

        let mut json = serde_json::to_value(&commit).unwrap();
        assert_eq!(serde_json::from_value::<Commit>(json.clone()).unwrap(), commit);

        // Swap the ranges so they are out of order.
        let sent = json["sent"].as_array_mut().unwrap();
        sent.swap(0, 1);
        assert!(serde_json::from_value::<Commit>(json).is_err());
    }

    #[test]
    fn test_commit_deserialize_rejects_wrong_direction() {
        let json = serde_json::json!({
            "sent": [],
            "recv": [{ "direction": "sent", "start": 0, "end": 1, "label": "bytes" }],
        });

        assert!(serde_json::from_value::<Commit>(json).is_err());
    }

    #[rstest]
    #[case::header("header:host", RangeSpec::Header("host".into()))]
    #[case::bare("content-type", RangeSpec::Header("content-type".into()))]
    #[case::json("json:data.id", RangeSpec::Json("data.id".into()))]
    #[case::bytes("bytes:0..10", RangeSpec::Bytes { start: 0, end: 10 })]
    #[case::info("info", RangeSpec::Info)]
    #[case::body("body", RangeSpec::Body)]
    #[case::line_breaks("line-breaks", RangeSpec::LineBreaks)]
    fn test_range_spec_from_str(#[case] s: &str, #[case] expected: RangeSpec) {
        assert_eq!(s.parse::<RangeSpec>().unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::bad_bytes("bytes:0-10")]
    #[case::unknown_kind("xpath://a")]
    fn test_range_spec_from_str_invalid(#[case] s: &str) {
        assert!(s.parse::<RangeSpec>().is_err());
    }

    #[test]
    fn test_range_spec_display_roundtrips() {
        for spec in [
            RangeSpec::Header("host".into()),
            RangeSpec::Json("a.b".into()),
            RangeSpec::Bytes { start: 1, end: 2 },
            RangeSpec::Info,
        ] {
            assert_eq!(spec.to_string().parse::<RangeSpec>().unwrap(), spec);
        }
    }
}
