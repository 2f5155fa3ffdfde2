//! Fixtures for testing

use crate::{
    attestation::{Attestation, AttestationConfig},
    connection::ServerName,
    request::AttestationRequest,
    signing::{Secp256k1Signer, SignatureAlgId, Signer, VerifyingKey},
    CryptoProvider,
};

macro_rules! define_fixture {
    ($name:ident, $doc:tt, $path:tt) => {
        #[doc = $doc]
        ///
        /// ```text
        #[doc = include_str!($path)]
        /// ```
        pub const $name: &[u8] = include_bytes!($path);
    };
}

/// HTTP data fixtures
pub mod http {
    /// HTTP requests
    pub mod request {
        define_fixture!(
            GET_EMPTY,
            "A GET request without a body or headers.",
            "fixtures/data/http/request_get_empty"
        );
        define_fixture!(
            GET_WITH_HEADER,
            "A GET request for the widget API with headers.",
            "fixtures/data/http/request_get_with_header"
        );
        define_fixture!(
            POST_JSON,
            "A POST request with a JSON body.",
            "fixtures/data/http/request_post_json"
        );
    }

    /// HTTP responses
    pub mod response {
        define_fixture!(
            OK_EMPTY,
            "An OK response without a body.",
            "fixtures/data/http/response_empty"
        );
        define_fixture!(
            OK_JSON,
            "An OK response with a JSON body.",
            "fixtures/data/http/response_json"
        );
    }
}

/// Notary signing key fixture.
pub const NOTARY_SIGNING_KEY: [u8; 32] = [1u8; 32];

/// Notary connection time fixture.
pub const CONNECTION_TIME: u64 = 1671637529;

/// Returns the server name fixture.
pub fn server_name() -> ServerName {
    ServerName::new("example.test").expect("fixture server name is valid")
}

/// Returns a crypto provider configured with the notary signing key.
pub fn notary_provider() -> CryptoProvider {
    let mut provider = CryptoProvider::default();
    provider
        .signer
        .set_secp256k1(&NOTARY_SIGNING_KEY)
        .expect("fixture key is valid");
    provider
}

/// Returns the verifying key of the notary signing key.
pub fn notary_verifying_key() -> VerifyingKey {
    Secp256k1Signer::new(&NOTARY_SIGNING_KEY)
        .expect("fixture key is valid")
        .verifying_key()
}

/// Returns an attestation config fixture.
pub fn attestation_config() -> AttestationConfig {
    AttestationConfig::builder()
        .supported_signature_algs([SignatureAlgId::SECP256K1])
        .build()
        .expect("fixture config is valid")
}

/// Issues an attestation for the request, as the notary would.
pub fn attest(provider: &CryptoProvider, request: AttestationRequest) -> Attestation {
    let config = attestation_config();
    let mut builder = Attestation::builder(&config)
        .accept_request(request)
        .expect("request is acceptable");

    builder.connection_time(CONNECTION_TIME);
    builder.build(provider).expect("attestation builds")
}
