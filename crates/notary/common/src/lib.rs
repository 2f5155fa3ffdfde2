//! Wire types of the notary HTTP API.

use serde::{Deserialize, Serialize};

/// Custom HTTP header used for specifying a whitelisted API key.
pub const X_API_KEY_HEADER: &str = "X-API-Key";

/// Types of client that the prover is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    /// Client that has access to the transport layer.
    Tcp,
    /// Client that cannot directly access the transport layer, e.g. a browser
    /// extension.
    Websocket,
}

/// Request object of the /session API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarizationSessionRequest {
    /// Type of client.
    pub client_type: ClientType,
    /// Maximum data that can be sent by the prover.
    pub max_sent_data: Option<usize>,
    /// Maximum data that can be received by the prover.
    pub max_recv_data: Option<usize>,
}

/// Response object of the /session API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarizationSessionResponse {
    /// Unique session id that is generated by the notary and shared to the
    /// prover.
    pub session_id: String,
}

/// Request query of the /notarize API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarizationRequestQuery {
    /// Session id that is returned from /session API.
    pub session_id: String,
}

/// Response object of the /info API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    /// Current version of the notary.
    pub version: String,
    /// Public key of the notary signing key, PEM or hex encoded.
    pub public_key: String,
    /// Git commit hash the notary was built from.
    #[serde(default)]
    pub git_commit_hash: String,
}
