//! Cryptographic signatures.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Key algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAlgId(u8);

impl KeyAlgId {
    /// secp256k1 elliptic curve key algorithm.
    pub const K256: Self = Self(1);
    /// NIST P-256 elliptic curve key algorithm.
    pub const P256: Self = Self(2);

    /// Returns the id as a `u8`.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for KeyAlgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            KeyAlgId::K256 => write!(f, "k256"),
            KeyAlgId::P256 => write!(f, "p256"),
            _ => write!(f, "custom({:02x})", self.0),
        }
    }
}

/// Signature algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureAlgId(u8);

impl SignatureAlgId {
    /// secp256k1 signature algorithm.
    pub const SECP256K1: Self = Self(1);
    /// secp256r1 signature algorithm.
    pub const SECP256R1: Self = Self(2);

    /// Returns the id as a `u8`.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SignatureAlgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SignatureAlgId::SECP256K1 => write!(f, "secp256k1"),
            SignatureAlgId::SECP256R1 => write!(f, "secp256r1"),
            _ => write!(f, "custom({:02x})", self.0),
        }
    }
}

impl std::str::FromStr for SignatureAlgId {
    type Err = UnknownSignatureAlgId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "secp256k1" | "k256" => Ok(SignatureAlgId::SECP256K1),
            "secp256r1" | "p256" => Ok(SignatureAlgId::SECP256R1),
            _ => Err(UnknownSignatureAlgId(s.to_string())),
        }
    }
}

/// Unknown signature algorithm error.
#[derive(Debug, thiserror::Error)]
#[error("unknown signature algorithm: {0}")]
pub struct UnknownSignatureAlgId(String);

/// Provider of signers.
#[derive(Default)]
pub struct SignerProvider {
    signers: HashMap<SignatureAlgId, Box<dyn Signer + Send + Sync>>,
}

impl SignerProvider {
    /// Returns the supported signature algorithms.
    pub fn supported_algs(&self) -> impl Iterator<Item = SignatureAlgId> + '_ {
        self.signers.keys().copied()
    }

    /// Configures a signer.
    pub fn set_signer(&mut self, signer: Box<dyn Signer + Send + Sync>) {
        self.signers.insert(signer.alg_id(), signer);
    }

    /// Configures a secp256k1 signer with the provided signing key.
    pub fn set_secp256k1(&mut self, key: &[u8]) -> Result<&mut Self, SignerError> {
        self.set_signer(Box::new(Secp256k1Signer::new(key)?));

        Ok(self)
    }

    /// Configures a secp256r1 signer with the provided signing key.
    pub fn set_secp256r1(&mut self, key: &[u8]) -> Result<&mut Self, SignerError> {
        self.set_signer(Box::new(Secp256r1Signer::new(key)?));

        Ok(self)
    }

    /// Returns a signer for the given algorithm.
    pub(crate) fn get(
        &self,
        alg: &SignatureAlgId,
    ) -> Result<&(dyn Signer + Send + Sync), UnknownSignatureAlgId> {
        self.signers
            .get(alg)
            .map(|s| &**s)
            .ok_or(UnknownSignatureAlgId(alg.to_string()))
    }
}

/// Error for [`Signer`].
#[derive(Debug, thiserror::Error)]
#[error("signer error: {0}")]
pub struct SignerError(String);

/// Cryptographic signer.
pub trait Signer {
    /// Returns the algorithm used by this signer.
    fn alg_id(&self) -> SignatureAlgId;

    /// Signs the message.
    fn sign(&self, msg: &[u8]) -> Result<Signature, SignatureError>;

    /// Returns the verifying key for this signer.
    fn verifying_key(&self) -> VerifyingKey;
}

/// Provider of signature verifiers.
pub struct SignatureVerifierProvider {
    verifiers: HashMap<SignatureAlgId, Box<dyn SignatureVerifier + Send + Sync>>,
}

impl Default for SignatureVerifierProvider {
    fn default() -> Self {
        let mut verifiers = HashMap::new();

        verifiers.insert(SignatureAlgId::SECP256K1, Box::new(Secp256k1Verifier) as _);
        verifiers.insert(SignatureAlgId::SECP256R1, Box::new(Secp256r1Verifier) as _);

        Self { verifiers }
    }
}

impl SignatureVerifierProvider {
    /// Configures a signature verifier.
    pub fn set_verifier(&mut self, verifier: Box<dyn SignatureVerifier + Send + Sync>) {
        self.verifiers.insert(verifier.alg_id(), verifier);
    }

    /// Returns the verifier for the given algorithm.
    pub(crate) fn get(
        &self,
        alg: &SignatureAlgId,
    ) -> Result<&(dyn SignatureVerifier + Send + Sync), UnknownSignatureAlgId> {
        self.verifiers
            .get(alg)
            .map(|s| &**s)
            .ok_or(UnknownSignatureAlgId(alg.to_string()))
    }
}

/// Signature verifier.
pub trait SignatureVerifier {
    /// Returns the algorithm used by this verifier.
    fn alg_id(&self) -> SignatureAlgId;

    /// Verifies the signature.
    fn verify(&self, key: &VerifyingKey, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError>;
}

/// Verifying key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyingKey {
    /// The key algorithm.
    pub alg: KeyAlgId,
    /// The SEC1 encoded key data.
    pub data: Vec<u8>,
}

impl VerifyingKey {
    /// Parses a public key in SPKI PEM form.
    ///
    /// Both secp256k1 and NIST P-256 keys are recognized.
    pub fn from_public_key_pem(pem: &str) -> Result<Self, KeyError> {
        use k256::pkcs8::DecodePublicKey as _;

        if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_pem(pem) {
            return Ok(Self {
                alg: KeyAlgId::P256,
                data: key.to_encoded_point(true).as_bytes().to_vec(),
            });
        }

        if let Ok(key) = k256::ecdsa::VerifyingKey::from_public_key_pem(pem) {
            return Ok(Self {
                alg: KeyAlgId::K256,
                data: key.to_encoded_point(true).as_bytes().to_vec(),
            });
        }

        Err(KeyError("unsupported or malformed public key pem".to_string()))
    }

    /// Parses a SEC1 encoded public key of the given algorithm.
    pub fn from_sec1_bytes(alg: KeyAlgId, bytes: &[u8]) -> Result<Self, KeyError> {
        let data = match alg {
            KeyAlgId::K256 => k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(|key| key.to_encoded_point(true).as_bytes().to_vec()),
            KeyAlgId::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(|key| key.to_encoded_point(true).as_bytes().to_vec()),
            _ => return Err(KeyError(format!("unsupported key algorithm: {alg}"))),
        }
        .map_err(|_| KeyError(format!("invalid {alg} key")))?;

        Ok(Self { alg, data })
    }

    /// Parses a public key given either in PEM form, or as hex encoded SEC1
    /// bytes. Hex keys are interpreted as NIST P-256 keys.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let key = key.trim();

        if key.starts_with("-----BEGIN") {
            return Self::from_public_key_pem(key);
        }

        let bytes = hex::decode(key.trim_start_matches("0x"))
            .map_err(|err| KeyError(format!("invalid hex key: {err}")))?;

        Self::from_sec1_bytes(KeyAlgId::P256, &bytes)
    }

    /// Encodes the key in SPKI PEM form.
    pub fn to_public_key_pem(&self) -> Result<String, KeyError> {
        use k256::pkcs8::{EncodePublicKey as _, LineEnding};

        let pem = match self.alg {
            KeyAlgId::K256 => k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.data)
                .map_err(|_| KeyError("invalid k256 key".to_string()))?
                .to_public_key_pem(LineEnding::LF),
            KeyAlgId::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(&self.data)
                .map_err(|_| KeyError("invalid p256 key".to_string()))?
                .to_public_key_pem(LineEnding::LF),
            alg => return Err(KeyError(format!("unsupported key algorithm: {alg}"))),
        };

        pem.map_err(|err| KeyError(err.to_string()))
    }

    /// Returns the hex encoding of the key data.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

/// Error for parsing a [`VerifyingKey`].
#[derive(Debug, thiserror::Error)]
#[error("key error: {0}")]
pub struct KeyError(String);

/// Error occurred while verifying a signature.
#[derive(Debug, thiserror::Error)]
#[error("signature verification failed: {0}")]
pub struct SignatureError(String);

/// A signature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Signature {
    /// The algorithm used to sign the data.
    pub alg: SignatureAlgId,
    /// The signature data.
    pub data: Vec<u8>,
}

mod secp256k1 {
    use k256::ecdsa::{
        signature::{Signer as _, Verifier},
        Signature as Secp256K1Signature, SigningKey,
    };

    use super::*;

    /// secp256k1 signer.
    pub struct Secp256k1Signer(SigningKey);

    impl Secp256k1Signer {
        /// Creates a new secp256k1 signer with the provided signing key.
        pub fn new(key: &[u8]) -> Result<Self, SignerError> {
            SigningKey::from_slice(key)
                .map(Self)
                .map_err(|_| SignerError("invalid key".to_string()))
        }
    }

    impl Signer for Secp256k1Signer {
        fn alg_id(&self) -> SignatureAlgId {
            SignatureAlgId::SECP256K1
        }

        fn sign(&self, msg: &[u8]) -> Result<Signature, SignatureError> {
            let sig: Secp256K1Signature = self
                .0
                .try_sign(msg)
                .map_err(|err| SignatureError(err.to_string()))?;

            Ok(Signature {
                alg: SignatureAlgId::SECP256K1,
                data: sig.to_vec(),
            })
        }

        fn verifying_key(&self) -> VerifyingKey {
            VerifyingKey {
                alg: KeyAlgId::K256,
                data: self
                    .0
                    .verifying_key()
                    .to_encoded_point(true)
                    .as_bytes()
                    .to_vec(),
            }
        }
    }

    /// secp256k1 verifier.
    pub struct Secp256k1Verifier;

    impl SignatureVerifier for Secp256k1Verifier {
        fn alg_id(&self) -> SignatureAlgId {
            SignatureAlgId::SECP256K1
        }

        fn verify(&self, key: &VerifyingKey, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError> {
            if key.alg != KeyAlgId::K256 {
                return Err(SignatureError("key algorithm is not k256".to_string()));
            }

            let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&key.data)
                .map_err(|_| SignatureError("invalid k256 key".to_string()))?;

            let sig = Secp256K1Signature::from_slice(sig)
                .map_err(|_| SignatureError("invalid secp256k1 signature".to_string()))?;

            key.verify(msg, &sig).map_err(|_| {
                SignatureError("secp256k1 signature verification failed".to_string())
            })?;

            Ok(())
        }
    }
}

mod secp256r1 {
    use p256::ecdsa::{
        signature::{Signer as _, Verifier},
        Signature as Secp256R1Signature, SigningKey,
    };

    use super::*;

    /// secp256r1 signer.
    pub struct Secp256r1Signer(SigningKey);

    impl Secp256r1Signer {
        /// Creates a new secp256r1 signer with the provided signing key.
        pub fn new(key: &[u8]) -> Result<Self, SignerError> {
            SigningKey::from_slice(key)
                .map(Self)
                .map_err(|_| SignerError("invalid key".to_string()))
        }
    }

    impl Signer for Secp256r1Signer {
        fn alg_id(&self) -> SignatureAlgId {
            SignatureAlgId::SECP256R1
        }

        fn sign(&self, msg: &[u8]) -> Result<Signature, SignatureError> {
            let sig: Secp256R1Signature = self
                .0
                .try_sign(msg)
                .map_err(|err| SignatureError(err.to_string()))?;

            Ok(Signature {
                alg: SignatureAlgId::SECP256R1,
                data: sig.to_vec(),
            })
        }

        fn verifying_key(&self) -> VerifyingKey {
            VerifyingKey {
                alg: KeyAlgId::P256,
                data: self
                    .0
                    .verifying_key()
                    .to_encoded_point(true)
                    .as_bytes()
                    .to_vec(),
            }
        }
    }

    /// secp256r1 verifier.
    pub struct Secp256r1Verifier;

    impl SignatureVerifier for Secp256r1Verifier {
        fn alg_id(&self) -> SignatureAlgId {
            SignatureAlgId::SECP256R1
        }

        fn verify(&self, key: &VerifyingKey, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError> {
            if key.alg != KeyAlgId::P256 {
                return Err(SignatureError("key algorithm is not p256".to_string()));
            }

            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&key.data)
                .map_err(|_| SignatureError("invalid p256 key".to_string()))?;

            let sig = Secp256R1Signature::from_slice(sig)
                .map_err(|_| SignatureError("invalid secp256r1 signature".to_string()))?;

            key.verify(msg, &sig).map_err(|_| {
                SignatureError("secp256r1 signature verification failed".to_string())
            })?;

            Ok(())
        }
    }
}

pub use secp256k1::{Secp256k1Signer, Secp256k1Verifier};
pub use secp256r1::{Secp256r1Signer, Secp256r1Verifier};

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn signer(alg: SignatureAlgId) -> Box<dyn Signer + Send + Sync> {
        match alg {
            SignatureAlgId::SECP256K1 => Box::new(Secp256k1Signer::new(&[1u8; 32]).unwrap()),
            _ => Box::new(Secp256r1Signer::new(&[1u8; 32]).unwrap()),
        }
    }

    #[rstest]
    #[case::k256(SignatureAlgId::SECP256K1)]
    #[case::p256(SignatureAlgId::SECP256R1)]
    fn test_sign_and_verify(#[case] alg: SignatureAlgId) {
        let signer = signer(alg);
        let provider = SignatureVerifierProvider::default();

        let sig = signer.sign(b"message").unwrap();
        let verifier = provider.get(&sig.alg).unwrap();

        assert!(verifier
            .verify(&signer.verifying_key(), b"message", &sig.data)
            .is_ok());
        assert!(verifier
            .verify(&signer.verifying_key(), b"tampered", &sig.data)
            .is_err());
    }

    #[test]
    fn test_verify_wrong_key_alg() {
        let signer = signer(SignatureAlgId::SECP256K1);
        let sig = signer.sign(b"message").unwrap();

        let mut key = signer.verifying_key();
        key.alg = KeyAlgId::P256;

        assert!(Secp256k1Verifier.verify(&key, b"message", &sig.data).is_err());
    }

    #[rstest]
    #[case::k256(SignatureAlgId::SECP256K1)]
    #[case::p256(SignatureAlgId::SECP256R1)]
    fn test_verifying_key_pem(#[case] alg: SignatureAlgId) {
        let key = signer(alg).verifying_key();
        let pem = key.to_public_key_pem().unwrap();

        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(VerifyingKey::from_public_key_pem(&pem).unwrap(), key);
        assert_eq!(VerifyingKey::parse(&pem).unwrap(), key);
    }

    #[test]
    fn test_verifying_key_parse_hex() {
        let key = signer(SignatureAlgId::SECP256R1).verifying_key();

        assert_eq!(VerifyingKey::parse(&key.to_hex()).unwrap(), key);
        assert!(VerifyingKey::parse("zz").is_err());
    }

    #[test]
    fn test_signature_alg_from_str() {
        assert_eq!(
            "secp256k1".parse::<SignatureAlgId>().unwrap(),
            SignatureAlgId::SECP256K1
        );
        assert_eq!(
            "P256".parse::<SignatureAlgId>().unwrap(),
            SignatureAlgId::SECP256R1
        );
        assert!("ed25519".parse::<SignatureAlgId>().is_err());
    }
}
