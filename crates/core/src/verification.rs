//! Output of presentation verification.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::commit::RangeLabel;

/// Result of verifying a [`Presentation`](crate::presentation::Presentation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// UNIX time of the notarized connection.
    pub time: u64,
    /// Hex encoded key which signed the attestation.
    pub verifying_key: String,
    /// Hex encoded key of the Notary the presentation was verified against.
    pub notary_key: String,
    /// Name of the server.
    pub server_name: String,
    /// Disclosed data sent to the server.
    pub sent: DisclosedData,
    /// Disclosed data received from the server.
    pub recv: DisclosedData,
}

/// Disclosed data of one transcript direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedData {
    length: usize,
    slices: Vec<DisclosedSlice>,
}

/// A disclosed range of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedSlice {
    /// Range of the slice in the transcript.
    pub range: Range<usize>,
    /// Label of the range.
    pub label: RangeLabel,
    /// The authenticated bytes.
    pub data: Vec<u8>,
}

impl DisclosedData {
    pub(crate) fn new(length: usize) -> Self {
        Self {
            length,
            slices: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, slice: DisclosedSlice) {
        self.slices.push(slice);
    }

    /// Returns the total length of the direction, including hidden bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns the disclosed slices in transcript order.
    pub fn slices(&self) -> &[DisclosedSlice] {
        &self.slices
    }

    /// Returns the number of disclosed bytes.
    pub fn disclosed_len(&self) -> usize {
        self.slices.iter().map(|slice| slice.data.len()).sum()
    }

    /// Returns the disclosed bytes, concatenated in transcript order.
    pub fn bytes(&self) -> Vec<u8> {
        self.slices
            .iter()
            .flat_map(|slice| slice.data.iter().copied())
            .collect()
    }

    /// Returns whether the byte at `pos` is disclosed.
    pub fn is_disclosed(&self, pos: usize) -> bool {
        self.slices.iter().any(|slice| slice.range.contains(&pos))
    }

    /// Renders the complete direction as text, replacing hidden bytes with
    /// `placeholder`.
    pub fn to_redacted_string(&self, placeholder: char) -> String {
        let mut out = String::with_capacity(self.length);
        let mut pos = 0;

        for slice in &self.slices {
            out.extend(std::iter::repeat(placeholder).take(slice.range.start - pos));
            out.push_str(&String::from_utf8_lossy(&slice.data));
            pos = slice.range.end;
        }

        out.extend(std::iter::repeat(placeholder).take(self.length.saturating_sub(pos)));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> DisclosedData {
        let mut data = DisclosedData::new(10);
        data.push(DisclosedSlice {
            range: 1..3,
            label: RangeLabel::Bytes,
            data: b"ab".to_vec(),
        });
        data.push(DisclosedSlice {
            range: 6..8,
            label: RangeLabel::Bytes,
            data: b"cd".to_vec(),
        });
        data
    }

    #[test]
    fn test_redacted_string() {
        assert_eq!(data().to_redacted_string('X'), "XabXXXcdXX");
    }

    #[test]
    fn test_disclosed_bytes() {
        let data = data();

        assert_eq!(data.bytes(), b"abcd");
        assert_eq!(data.disclosed_len(), 4);
        assert!(data.is_disclosed(2));
        assert!(!data.is_disclosed(3));
    }

    #[test]
    fn test_result_json_shape() {
        let result = VerificationResult {
            time: 1,
            verifying_key: "aa".into(),
            notary_key: "aa".into(),
            server_name: "example.test".into(),
            sent: DisclosedData::default(),
            recv: DisclosedData::default(),
        };

        let json = serde_json::to_value(&result).unwrap();
        for key in ["time", "verifyingKey", "notaryKey", "serverName", "sent", "recv"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
