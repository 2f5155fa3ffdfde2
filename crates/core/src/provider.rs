use crate::signing::{SignatureVerifierProvider, SignerProvider};

/// Cryptography provider.
///
/// Algorithms are uniquely identified using an 8-bit ID, eg.
/// [`SignatureAlgId`](crate::signing::SignatureAlgId). Additional algorithms
/// can be registered with the respective providers.
#[derive(Default)]
pub struct CryptoProvider {
    /// Signer provider.
    ///
    /// This is used for signing attestations.
    pub signer: SignerProvider,
    /// Signature verifier provider.
    ///
    /// This is used for verifying signatures of attestations.
    pub signature: SignatureVerifierProvider,
}

opaque_debug::implement!(CryptoProvider);
