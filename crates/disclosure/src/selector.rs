//! Selection of the transcript ranges to disclose.

use std::ops::Range;

use disclosure_core::{
    commit::{Commit, CommitError, RangeLabel, RangeSpec},
    transcript::{CapturedTranscript, Direction, MessageIndex},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of leading bytes of each direction revealed in simplified mode.
pub const SIMPLIFIED_PREFIX_LEN: usize = 50;

/// How to select the disclosed ranges of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disclosure {
    /// Reveals the first [`SIMPLIFIED_PREFIX_LEN`] bytes of each direction.
    ///
    /// Intended for demonstration. The prefix is fixed and not aware of the
    /// message structure.
    #[default]
    Simplified,
    /// Reveals the start line of each direction, plus the given ranges.
    Detailed {
        /// Ranges of the request.
        sent: Vec<RangeSpec>,
        /// Ranges of the response.
        recv: Vec<RangeSpec>,
    },
}

impl Disclosure {
    /// Returns a detailed disclosure of the named request headers.
    pub fn request_headers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Disclosure::Detailed {
            sent: names
                .into_iter()
                .map(|name| RangeSpec::Header(name.into()))
                .collect(),
            recv: Vec::new(),
        }
    }
}

/// Error for [`TranscriptSelector`].
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A named range is not present in the transcript.
    #[error("{direction} transcript has no {spec}")]
    Missing {
        /// The direction searched.
        direction: Direction,
        /// The unresolved specification.
        spec: RangeSpec,
    },
    /// An explicit byte range is empty or exceeds the transcript.
    #[error("invalid {direction} byte range {range:?}, transcript length is {len}")]
    InvalidRange {
        /// The direction of the range.
        direction: Direction,
        /// The range.
        range: Range<usize>,
        /// Length of the direction.
        len: usize,
    },
    /// The resolved ranges do not form a valid commit, e.g. they overlap.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl SelectionError {
    /// Returns whether a named range was missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, SelectionError::Missing { .. })
    }

    /// Returns whether ranges overlapped.
    pub fn is_overlap(&self) -> bool {
        matches!(self, SelectionError::Commit(err) if err.is_overlap())
    }
}

/// Builds a [`Commit`] from a captured transcript.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptSelector<'a> {
    transcript: &'a CapturedTranscript,
}

impl<'a> TranscriptSelector<'a> {
    /// Creates a selector over the given transcript.
    pub fn new(transcript: &'a CapturedTranscript) -> Self {
        Self { transcript }
    }

    /// Selects the ranges of `disclosure`.
    ///
    /// Every named range must be present in the transcript index. Within a
    /// direction, the resolved ranges are ordered by position and duplicates
    /// are collapsed, so equal inputs always produce equal commits.
    pub fn select(&self, disclosure: &Disclosure) -> Result<Commit, SelectionError> {
        let (sent, recv) = match disclosure {
            Disclosure::Simplified => (
                self.prefix(Direction::Sent).into_iter().collect(),
                self.prefix(Direction::Received).into_iter().collect(),
            ),
            Disclosure::Detailed { sent, recv } => (
                self.resolve(Direction::Sent, sent)?,
                self.resolve(Direction::Received, recv)?,
            ),
        };

        let mut builder = Commit::builder(self.transcript.transcript().length());
        for (range, label) in sent {
            builder.sent(range, label)?;
        }
        for (range, label) in recv {
            builder.recv(range, label)?;
        }

        let commit = builder.build();

        debug!(
            sent = commit.sent().len(),
            recv = commit.recv().len(),
            "selected ranges"
        );

        Ok(commit)
    }

    fn prefix(&self, direction: Direction) -> Option<(Range<usize>, RangeLabel)> {
        let len = self
            .transcript
            .transcript()
            .len_of_direction(direction)
            .min(SIMPLIFIED_PREFIX_LEN);

        (len > 0).then_some((0..len, RangeLabel::Bytes))
    }

    /// Resolves the specs of one direction, with the start line first.
    fn resolve(
        &self,
        direction: Direction,
        specs: &[RangeSpec],
    ) -> Result<Vec<(Range<usize>, RangeLabel)>, SelectionError> {
        let index = self.transcript.index(direction);
        let len = self.transcript.transcript().len_of_direction(direction);

        let mut resolved = Vec::new();
        for spec in std::iter::once(&RangeSpec::Info).chain(specs) {
            resolve_spec(index, direction, len, spec, &mut resolved)?;
        }

        resolved.sort_by(|(a, _), (b, _)| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        resolved.dedup_by(|(a, _), (b, _)| a == b);

        Ok(resolved)
    }
}

fn resolve_spec(
    index: &MessageIndex,
    direction: Direction,
    len: usize,
    spec: &RangeSpec,
    resolved: &mut Vec<(Range<usize>, RangeLabel)>,
) -> Result<(), SelectionError> {
    let missing = || SelectionError::Missing {
        direction,
        spec: spec.clone(),
    };

    match spec {
        RangeSpec::Bytes { start, end } => {
            if start >= end || *end > len {
                return Err(SelectionError::InvalidRange {
                    direction,
                    range: *start..*end,
                    len,
                });
            }
            resolved.push((*start..*end, RangeLabel::Bytes));
        }
        RangeSpec::Info => {
            let range = index.info().ok_or_else(missing)?;
            resolved.push((range, RangeLabel::Info));
        }
        RangeSpec::Header(name) => {
            let label = RangeLabel::Header(name.to_ascii_lowercase());
            let before = resolved.len();
            resolved.extend(
                index
                    .headers_with_name(name)
                    .map(|range| (range, label.clone())),
            );
            if resolved.len() == before {
                return Err(missing());
            }
        }
        RangeSpec::LineBreaks => {
            if index.line_breaks().is_empty() {
                return Err(missing());
            }
            resolved.extend(
                index
                    .line_breaks()
                    .iter()
                    .map(|range| (range.clone(), RangeLabel::LineBreak)),
            );
        }
        RangeSpec::Body => {
            let range = index.body().ok_or_else(missing)?;
            resolved.push((range, RangeLabel::Body));
        }
        RangeSpec::Json(path) => {
            let range = index.json_member(path).ok_or_else(missing)?;
            resolved.push((range, RangeLabel::Json(path.clone())));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use disclosure_core::{
        fixtures::http::{request::GET_WITH_HEADER, response::OK_JSON},
        transcript::Transcript,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn transcript() -> CapturedTranscript {
        CapturedTranscript::new(Transcript::new(GET_WITH_HEADER, OK_JSON))
    }

    fn disclosed(
        transcript: &CapturedTranscript,
        commit: &Commit,
        direction: Direction,
    ) -> Vec<u8> {
        commit
            .ranges(direction)
            .iter()
            .flat_map(|range| {
                transcript
                    .transcript()
                    .get(direction, range.range())
                    .unwrap()
                    .to_vec()
            })
            .collect()
    }

    #[rstest]
    fn test_simplified(transcript: CapturedTranscript) {
        let commit = TranscriptSelector::new(&transcript)
            .select(&Disclosure::Simplified)
            .unwrap();

        assert_eq!(commit.sent().len(), 1);
        assert_eq!(commit.sent()[0].range(), 0..SIMPLIFIED_PREFIX_LEN);
        assert_eq!(commit.recv()[0].range(), 0..SIMPLIFIED_PREFIX_LEN);
    }

    #[test]
    fn test_simplified_short_transcript() {
        let transcript = CapturedTranscript::new(Transcript::new(b"GET / HTTP/1.1\r\n\r\n", b""));

        let commit = TranscriptSelector::new(&transcript)
            .select(&Disclosure::Simplified)
            .unwrap();

        assert_eq!(commit.sent()[0].range(), 0..18);
        assert!(commit.recv().is_empty());
    }

    #[rstest]
    fn test_detailed_headers(transcript: CapturedTranscript) {
        let commit = TranscriptSelector::new(&transcript)
            .select(&Disclosure::request_headers(["host", "content-type"]))
            .unwrap();

        let labels: Vec<_> = commit
            .sent()
            .iter()
            .map(|range| range.label().clone())
            .collect();
        assert_eq!(labels[0], RangeLabel::Info);
        assert_eq!(labels.len(), 3);
        assert!(labels.contains(&RangeLabel::Header("host".to_string())));
        assert!(labels.contains(&RangeLabel::Header("content-type".to_string())));

        // Sorted by position regardless of the requested order.
        assert!(commit.sent().windows(2).all(|w| w[0].end() <= w[1].start()));

        let sent = String::from_utf8(disclosed(&transcript, &commit, Direction::Sent)).unwrap();
        assert!(sent.starts_with("GET /api/widget HTTP/1.1"));
        assert!(sent.contains("host: example.test"));

        // Only the status line of the response.
        assert_eq!(commit.recv().len(), 1);
        assert_eq!(commit.recv()[0].label(), &RangeLabel::Info);
    }

    #[rstest]
    fn test_detailed_missing_header(transcript: CapturedTranscript) {
        let err = TranscriptSelector::new(&transcript)
            .select(&Disclosure::request_headers(["x-missing"]))
            .unwrap_err();

        assert!(err.is_missing());
    }

    #[rstest]
    fn test_detailed_json(transcript: CapturedTranscript) {
        let disclosure = Disclosure::Detailed {
            sent: vec![],
            recv: vec![RangeSpec::Json("name".to_string())],
        };

        let commit = TranscriptSelector::new(&transcript)
            .select(&disclosure)
            .unwrap();

        assert_eq!(commit.recv().len(), 2);
        assert_eq!(commit.recv()[1].label(), &RangeLabel::Json("name".to_string()));
    }

    #[rstest]
    fn test_duplicates_collapse(transcript: CapturedTranscript) {
        let disclosure = Disclosure::Detailed {
            sent: vec![RangeSpec::Info, RangeSpec::Header("host".to_string())],
            recv: vec![],
        };

        let commit = TranscriptSelector::new(&transcript)
            .select(&disclosure)
            .unwrap();

        assert_eq!(commit.sent().len(), 2);
    }

    #[rstest]
    fn test_overlap_rejected(transcript: CapturedTranscript) {
        let disclosure = Disclosure::Detailed {
            sent: vec![RangeSpec::Bytes { start: 0, end: 10 }],
            recv: vec![],
        };

        let err = TranscriptSelector::new(&transcript)
            .select(&disclosure)
            .unwrap_err();

        assert!(err.is_overlap());
    }

    #[rstest]
    #[case::empty(RangeSpec::Bytes { start: 5, end: 5 })]
    #[case::out_of_bounds(RangeSpec::Bytes { start: 0, end: 100_000 })]
    fn test_invalid_range(transcript: CapturedTranscript, #[case] spec: RangeSpec) {
        let disclosure = Disclosure::Detailed {
            sent: vec![],
            recv: vec![spec],
        };

        let err = TranscriptSelector::new(&transcript)
            .select(&disclosure)
            .unwrap_err();

        assert!(matches!(err, SelectionError::InvalidRange { .. }));
    }

    #[rstest]
    fn test_deterministic(transcript: CapturedTranscript) {
        let a = Disclosure::request_headers(["content-type", "host"]);
        let b = Disclosure::request_headers(["host", "content-type"]);

        let selector = TranscriptSelector::new(&transcript);
        assert_eq!(selector.select(&a).unwrap(), selector.select(&b).unwrap());
    }
}
