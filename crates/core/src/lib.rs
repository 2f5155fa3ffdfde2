//! Core types for notarized selective disclosure of HTTPS transcripts.
//!
//! # Introduction
//!
//! A Prover exchanges an HTTP request and response with a Server while a
//! Notary attests to the session. The [`Transcript`](transcript::Transcript)
//! of that exchange is indexed into semantic ranges (start line, headers, line
//! breaks, body and JSON members), from which the Prover selects a
//! [`Commit`](commit::Commit) of ranges to reveal.
//!
//! # Committing
//!
//! Before the Notary signs, the Prover commits to each selected range, and to
//! each complete direction of the transcript, using blinded BLAKE3 hashes in an
//! [`AttestationRequest`](request::AttestationRequest). The plaintext and the
//! blinders remain in the Prover's [`Secrets`](secrets::Secrets).
//!
//! # Attestation
//!
//! The Notary issues an [`Attestation`](attestation::Attestation) binding the
//! server name, the connection time and the transcript commitments, signed with
//! its secp256k1 or secp256r1 key.
//!
//! # Selective disclosure
//!
//! The Prover builds a [`Presentation`](presentation::Presentation) opening the
//! committed ranges it wishes to disclose. A Verifier who trusts the Notary's
//! [`VerifyingKey`](signing::VerifyingKey) checks the presentation and obtains a
//! [`VerificationResult`](verification::VerificationResult) carrying exactly
//! the disclosed bytes.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod attestation;
pub mod commit;
pub mod connection;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod hash;
pub mod presentation;
mod provider;
pub mod request;
pub mod secrets;
mod serialize;
pub mod signing;
pub mod transcript;
pub mod verification;

pub use provider::CryptoProvider;
