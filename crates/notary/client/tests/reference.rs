use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{extract::State, http::HeaderMap, routing::get, routing::post, Json, Router};
use disclosure_core::signing::{Secp256r1Signer, Signer, VerifyingKey};
use disclosure_notary_client::{request_session_url, HttpNotaryApi, NotaryReference, NotaryUrl};
use disclosure_notary_common::{
    ClientType, InfoResponse, NotarizationSessionRequest, NotarizationSessionResponse,
    X_API_KEY_HEADER,
};
use tokio::net::TcpListener;

#[derive(Clone)]
struct MockNotary {
    public_key: String,
    info_calls: Arc<AtomicUsize>,
}

async fn info(State(notary): State<MockNotary>) -> Json<InfoResponse> {
    notary.info_calls.fetch_add(1, Ordering::SeqCst);
    Json(InfoResponse {
        version: "0.1.0".to_string(),
        public_key: notary.public_key.clone(),
        git_commit_hash: "dev".to_string(),
    })
}

async fn session(
    headers: HeaderMap,
    Json(request): Json<NotarizationSessionRequest>,
) -> Json<NotarizationSessionResponse> {
    assert_eq!(request.client_type, ClientType::Websocket);
    assert_eq!(request.max_sent_data, Some(4096));
    assert_eq!(request.max_recv_data, Some(16384));

    let key = headers
        .get(X_API_KEY_HEADER)
        .map(|value| value.to_str().unwrap().to_string())
        .unwrap_or_default();

    Json(NotarizationSessionResponse {
        session_id: format!("session-{key}"),
    })
}

async fn spawn_notary(public_key: String) -> (SocketAddr, Arc<AtomicUsize>) {
    let info_calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/info", get(info))
        .route("/v1/session", post(session))
        .with_state(MockNotary {
            public_key,
            info_calls: info_calls.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, info_calls)
}

fn notary_key() -> VerifyingKey {
    Secp256r1Signer::new(&[7u8; 32]).unwrap().verifying_key()
}

#[tokio::test]
async fn test_public_key_is_fetched_once() {
    let key = notary_key();
    let (addr, info_calls) = spawn_notary(key.to_public_key_pem().unwrap()).await;

    let notary = NotaryReference::new(&format!("http://{addr}/v1")).unwrap();

    assert_eq!(notary.public_key().await.unwrap(), key);
    assert_eq!(notary.clone().public_key().await.unwrap(), key);
    assert_eq!(info_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_public_key_hex() {
    let key = notary_key();
    let (addr, _) = spawn_notary(key.to_hex()).await;

    let notary = NotaryReference::new(&format!("http://{addr}/v1")).unwrap();

    assert_eq!(notary.public_key().await.unwrap(), key);
}

#[tokio::test]
async fn test_public_key_malformed() {
    let (addr, _) = spawn_notary("not a key".to_string()).await;

    let notary = NotaryReference::new(&format!("http://{addr}/v1")).unwrap();

    let err = notary.public_key().await.unwrap_err();
    assert!(err.is_key());
}

#[tokio::test]
async fn test_public_key_unreachable() {
    // Bind and drop a listener to find a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let notary = NotaryReference::new(&format!("http://{addr}")).unwrap();

    let err = notary.public_key().await.unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_provided_public_key_skips_lookup() {
    let key = notary_key();
    let (addr, info_calls) = spawn_notary("not a key".to_string()).await;

    let notary = NotaryReference::new(&format!("http://{addr}/v1"))
        .unwrap()
        .with_public_key(key.clone());

    assert_eq!(notary.public_key().await.unwrap(), key);
    assert_eq!(info_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_url() {
    let (addr, _) = spawn_notary(notary_key().to_hex()).await;

    let api = HttpNotaryApi::builder().api_key("secret").build().unwrap();
    let notary = NotaryUrl::parse(&format!("http://{addr}/v1/")).unwrap();

    let url = request_session_url(&api, &notary, 4096, 16384).await.unwrap();

    assert_eq!(
        url,
        format!("ws://{addr}/v1/notarize?sessionId=session-secret")
    );
}
