//! Prover secrets.

use serde::{Deserialize, Serialize};

use crate::{
    commit::RangeLabel,
    connection::ServerName,
    hash::{PlaintextHashOpening, PlaintextHashSecret},
    transcript::{Direction, Transcript},
};

/// Secret data of an [`Attestation`](crate::attestation::Attestation).
#[derive(Clone, Serialize, Deserialize)]
pub struct Secrets {
    pub(crate) server_name: ServerName,
    pub(crate) transcript: Transcript,
    pub(crate) plaintext_hashes: Vec<PlaintextHashSecret>,
}

opaque_debug::implement!(Secrets);

impl Secrets {
    /// Returns the server name.
    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Returns the transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Opens the commitment to the given labeled range, if one was made.
    pub(crate) fn open(
        &self,
        direction: Direction,
        range: std::ops::Range<usize>,
        label: &RangeLabel,
    ) -> Option<PlaintextHashOpening> {
        let secret = self.plaintext_hashes.iter().find(|secret| {
            secret.direction == direction && secret.range == range && &secret.label == label
        })?;

        let data = self.transcript.get(direction, range.clone())?.to_vec();

        Some(PlaintextHashOpening {
            direction,
            range,
            data,
            blinder: secret.blinder.clone(),
        })
    }
}
