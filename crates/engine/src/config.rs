//! Engine and prover configuration.

use std::sync::Arc;

use disclosure_core::{connection::ServerName, signing::SignatureAlgId, CryptoProvider};
use disclosure_notary_client::{HttpNotaryApi, NotaryApi};
use serde::{Deserialize, Serialize};

use crate::connector::{NotaryConnector, ServerConnector, WsNotaryConnector, WsProxyConnector};

/// Default limit on the number of bytes sent to the server.
pub const DEFAULT_MAX_SENT_DATA: usize = 4096;
/// Default limit on the number of bytes received from the server.
pub const DEFAULT_MAX_RECV_DATA: usize = 16384;

/// Configuration for a prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
pub struct ProverConfig {
    /// The server name.
    server_name: ServerName,
    /// Maximum number of bytes that can be sent.
    #[builder(default = "DEFAULT_MAX_SENT_DATA")]
    max_sent_data: usize,
    /// Maximum number of bytes that can be received.
    #[builder(default = "DEFAULT_MAX_RECV_DATA")]
    max_recv_data: usize,
    /// Signature algorithm requested from the notary.
    #[builder(default = "SignatureAlgId::SECP256K1")]
    signature_alg: SignatureAlgId,
}

impl ProverConfig {
    /// Creates a new builder for `ProverConfig`.
    pub fn builder() -> ProverConfigBuilder {
        ProverConfigBuilder::default()
    }

    /// Returns the server name.
    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Returns the maximum number of bytes that can be sent.
    pub fn max_sent_data(&self) -> usize {
        self.max_sent_data
    }

    /// Returns the maximum number of bytes that can be received.
    pub fn max_recv_data(&self) -> usize {
        self.max_recv_data
    }

    /// Returns the signature algorithm requested from the notary.
    pub fn signature_alg(&self) -> SignatureAlgId {
        self.signature_alg
    }
}

/// Configuration for an engine.
#[derive(Clone, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct EngineConfig {
    /// Connects provers to servers.
    #[builder(default = "Arc::new(WsProxyConnector::default())")]
    server_connector: Arc<dyn ServerConnector>,
    /// Connects provers to notaries.
    #[builder(default = "Arc::new(WsNotaryConnector::default())")]
    notary_connector: Arc<dyn NotaryConnector>,
    /// Requests notarization sessions from notaries.
    #[builder(default = "Arc::new(HttpNotaryApi::default())")]
    notary_api: Arc<dyn NotaryApi>,
    /// Crypto provider used to validate attestations and verify
    /// presentations.
    #[builder(default)]
    crypto_provider: Arc<CryptoProvider>,
}

opaque_debug::implement!(EngineConfig);

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_connector: Arc::new(WsProxyConnector::default()),
            notary_connector: Arc::new(WsNotaryConnector::default()),
            notary_api: Arc::new(HttpNotaryApi::default()),
            crypto_provider: Arc::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub(crate) fn server_connector(&self) -> &Arc<dyn ServerConnector> {
        &self.server_connector
    }

    pub(crate) fn notary_connector(&self) -> &Arc<dyn NotaryConnector> {
        &self.notary_connector
    }

    pub(crate) fn notary_api(&self) -> &dyn NotaryApi {
        self.notary_api.as_ref()
    }

    pub(crate) fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disclosure_core::fixtures::server_name;

    #[test]
    fn test_prover_config_defaults() {
        let config = ProverConfig::builder()
            .server_name(server_name())
            .build()
            .unwrap();

        assert_eq!(config.max_sent_data(), 4096);
        assert_eq!(config.max_recv_data(), 16384);
        assert_eq!(config.signature_alg(), SignatureAlgId::SECP256K1);
    }

    #[test]
    fn test_prover_config_requires_server_name() {
        assert!(ProverConfig::builder().build().is_err());
    }
}
