//! Hash commitments to transcript plaintext.
//!
//! Each committed range of the transcript is hashed together with a random
//! [`Blinder`] using BLAKE3. The Notary attests to the resulting
//! [`PlaintextHash`] without learning the plaintext, and the Prover later opens
//! selected commitments by revealing the plaintext and its blinder in a
//! [`PlaintextHashOpening`].

use std::{fmt, ops::Range};

use rand::distr::{Distribution, StandardUniform};
use serde::{Deserialize, Serialize};

use crate::{
    commit::RangeLabel,
    serialize::{impl_domain_separator, CanonicalSerialize, DomainSeparator},
    transcript::Direction,
};

/// A 32 byte BLAKE3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Creates a hash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the hash as bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A hash blinder.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blinder([u8; 16]);

opaque_debug::implement!(Blinder);

impl Blinder {
    /// Returns the blinder as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 16]> for Blinder {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl Distribution<Blinder> for StandardUniform {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Blinder {
        Blinder(self.sample(rng))
    }
}

/// Hashes a type with its domain separator.
pub(crate) fn hash_separated<T>(data: &T) -> Hash
where
    T: CanonicalSerialize + DomainSeparator,
{
    let mut hasher = blake3::Hasher::new();
    hasher.update(data.domain());
    hasher.update(&data.serialize());

    Hash(hasher.finalize().into())
}

/// Hashes plaintext with a blinder.
pub fn hash_plaintext(data: &[u8], blinder: &Blinder) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.update(blinder.as_bytes());

    Hash(hasher.finalize().into())
}

/// Commitment to a range of transcript plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextHash {
    /// Direction of the plaintext.
    pub direction: Direction,
    /// Range of the plaintext.
    pub range: Range<usize>,
    /// Label of the range, attested together with the hash.
    pub label: RangeLabel,
    /// Blinded hash of the plaintext.
    pub hash: Hash,
}

impl_domain_separator!(PlaintextHash);

/// Secret data of a [`PlaintextHash`], held by the Prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextHashSecret {
    /// Direction of the plaintext.
    pub direction: Direction,
    /// Range of the plaintext.
    pub range: Range<usize>,
    /// Label of the range.
    pub label: RangeLabel,
    /// Blinder used for the commitment.
    pub blinder: Blinder,
}

/// Opening of a [`PlaintextHash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextHashOpening {
    pub(crate) direction: Direction,
    pub(crate) range: Range<usize>,
    pub(crate) data: Vec<u8>,
    pub(crate) blinder: Blinder,
}

impl PlaintextHashOpening {
    /// Returns the direction of the opened plaintext.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the range of the opened plaintext.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Verifies the opening against a commitment, returning the plaintext.
    pub(crate) fn verify(&self, commitment: &PlaintextHash) -> Result<&[u8], OpeningError> {
        if commitment.direction != self.direction || commitment.range != self.range {
            return Err(OpeningError::new("opening does not correspond to commitment"));
        }

        if self.data.len() != self.range.len() {
            return Err(OpeningError::new(format!(
                "opening of {} bytes does not match range length {}",
                self.data.len(),
                self.range.len()
            )));
        }

        if hash_plaintext(&self.data, &self.blinder) != commitment.hash {
            return Err(OpeningError::new("hash does not match commitment"));
        }

        Ok(&self.data)
    }
}

/// Error for [`PlaintextHashOpening`].
#[derive(Debug, thiserror::Error)]
#[error("invalid plaintext hash opening: {0}")]
pub struct OpeningError(String);

impl OpeningError {
    fn new<T: Into<String>>(msg: T) -> Self {
        Self(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn commit(data: &[u8], range: Range<usize>) -> (PlaintextHash, PlaintextHashOpening) {
        let mut rng = StdRng::seed_from_u64(0);
        let blinder: Blinder = rng.random();
        let plaintext = data[range.clone()].to_vec();

        (
            PlaintextHash {
                direction: Direction::Sent,
                range: range.clone(),
                label: RangeLabel::Bytes,
                hash: hash_plaintext(&plaintext, &blinder),
            },
            PlaintextHashOpening {
                direction: Direction::Sent,
                range,
                data: plaintext,
                blinder,
            },
        )
    }

    #[test]
    fn test_opening_verifies() {
        let (commitment, opening) = commit(b"hello world", 0..5);

        assert_eq!(opening.verify(&commitment).unwrap(), b"hello");
    }

    #[test]
    fn test_opening_wrong_data() {
        let (commitment, mut opening) = commit(b"hello world", 0..5);
        opening.data = b"jello".to_vec();

        assert!(opening.verify(&commitment).is_err());
    }

    #[test]
    fn test_opening_wrong_blinder() {
        let (commitment, mut opening) = commit(b"hello world", 0..5);
        opening.blinder = Blinder::from([0u8; 16]);

        assert!(opening.verify(&commitment).is_err());
    }

    #[test]
    fn test_opening_wrong_range() {
        let (commitment, mut opening) = commit(b"hello world", 0..5);
        opening.range = 1..6;

        assert!(opening.verify(&commitment).is_err());
    }

    #[test]
    fn test_blinder_changes_hash() {
        assert_ne!(
            hash_plaintext(b"data", &Blinder::from([0u8; 16])),
            hash_plaintext(b"data", &Blinder::from([1u8; 16]))
        );
    }
}
