use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use disclosure_boundary::{BoundaryErrorKind, CallError, ExecutionBoundary};
use disclosure_core::{
    commit::{Commit, RangeLabel},
    connection::ServerName,
    fixtures::{notary_verifying_key, server_name},
    presentation::PresentationMeta,
    transcript::Direction,
};
use disclosure_engine::{
    connector::{ServerConnector, ServerIo},
    fixtures::{engine_config, widget_request, MemoryNotaryConnector, PROXY_URL},
    Engine, EngineConfig, EngineError, EngineErrorKind, ProverConfig, Request,
};
use disclosure_server_fixture::WIDGET_JSON;
use rstest::{fixture, rstest};

const SESSION_URL: &str = "ws://notary.test/notarize?sessionId=test";

/// A server which never answers the connection attempt.
struct StalledServer;

#[async_trait]
impl ServerConnector for StalledServer {
    async fn connect(
        &self,
        _proxy_url: &str,
        _server_name: &ServerName,
        _port: u16,
    ) -> Result<Box<dyn ServerIo>, EngineError> {
        std::future::pending().await
    }
}

#[fixture]
fn prover_config() -> ProverConfig {
    ProverConfig::builder()
        .server_name(server_name())
        .build()
        .unwrap()
}

fn boundary() -> ExecutionBoundary {
    ExecutionBoundary::spawn(Engine::new(engine_config())).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_notarize_through_handles(prover_config: ProverConfig) {
    let boundary = boundary();
    assert!(boundary.name().starts_with("disclosure-engine-"));

    boundary.init().await.unwrap();

    let prover = boundary.create_prover(prover_config).await.unwrap();
    let session_url = boundary
        .notary_session("http://notary.test", 4096, 16384)
        .await
        .unwrap();
    assert_eq!(
        session_url,
        "ws://notary.test/notarize?sessionId=session-4096-16384"
    );
    prover.setup(&session_url).await.unwrap();

    let response = prover
        .send_request(PROXY_URL, widget_request())
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    let transcript = prover.transcript().await.unwrap();
    let mut builder = Commit::builder(transcript.transcript().length());
    let body = transcript.index(Direction::Received).body().unwrap();
    builder.recv(body, RangeLabel::Body).unwrap();
    let commit = builder.build();

    let output = prover.notarize(commit.clone()).await.unwrap();
    prover.close().await.unwrap();

    let presentation = boundary
        .build_presentation(
            output.attestation,
            output.secrets,
            commit,
            PresentationMeta::default(),
        )
        .await
        .unwrap();

    let result = boundary
        .verify(presentation.to_bytes().unwrap(), notary_verifying_key())
        .await
        .unwrap();

    assert_eq!(result.server_name, "example.test");
    assert_eq!(result.recv.bytes(), WIDGET_JSON.as_bytes());
    assert_eq!(result.sent.disclosed_len(), 0);

    boundary.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_engine_error_is_surfaced(prover_config: ProverConfig) {
    let boundary = boundary();

    let err = boundary.create_prover(prover_config).await.unwrap_err();

    let CallError::Engine(err) = err else {
        panic!("expected engine error, got {err}");
    };
    assert_eq!(err.kind(), EngineErrorKind::Uninitialized);

    // The context survives a failed call.
    boundary.init().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_call_deadline(prover_config: ProverConfig) {
    let config = EngineConfig::builder()
        .server_connector(Arc::new(StalledServer))
        .notary_connector(Arc::new(MemoryNotaryConnector::default()))
        .build()
        .unwrap();
    let boundary = ExecutionBoundary::spawn(Engine::new(config)).unwrap();

    boundary.init().await.unwrap();
    let prover = boundary.create_prover(prover_config).await.unwrap();
    prover.setup(SESSION_URL).await.unwrap();

    let err = boundary
        .call_with_deadline(
            Request::SendRequest {
                prover: prover.id(),
                websocket_proxy_url: PROXY_URL.to_string(),
                request: widget_request(),
            },
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert_eq!(err.boundary().unwrap().kind(), BoundaryErrorKind::Timeout);

    // Shutdown abandons the stalled call.
    boundary.shutdown().await.unwrap();
    assert!(!boundary.is_running());
}

#[rstest]
#[tokio::test]
async fn test_default_deadline(prover_config: ProverConfig) {
    let config = EngineConfig::builder()
        .server_connector(Arc::new(StalledServer))
        .notary_connector(Arc::new(MemoryNotaryConnector::default()))
        .build()
        .unwrap();
    let deadline = Some(Duration::from_millis(200));
    let boundary = ExecutionBoundary::spawn_with_deadline(Engine::new(config), deadline).unwrap();

    boundary.init().await.unwrap();
    let prover = boundary.create_prover(prover_config).await.unwrap();
    prover.setup(SESSION_URL).await.unwrap();

    let err = prover
        .send_request(PROXY_URL, widget_request())
        .await
        .unwrap_err();

    assert_eq!(err.boundary().unwrap().kind(), BoundaryErrorKind::Timeout);
}

#[tokio::test]
async fn test_call_after_shutdown() {
    let boundary = boundary();
    boundary.init().await.unwrap();

    boundary.shutdown().await.unwrap();
    // Shutting down twice is harmless.
    boundary.shutdown().await.unwrap();

    let err = boundary.init().await.unwrap_err();
    assert_eq!(err.boundary().unwrap().kind(), BoundaryErrorKind::Unreachable);
}

#[rstest]
#[tokio::test]
async fn test_handle_keeps_context_alive(prover_config: ProverConfig) {
    let boundary = boundary();
    boundary.init().await.unwrap();

    let prover = boundary.create_prover(prover_config).await.unwrap();
    drop(boundary);

    prover.setup(SESSION_URL).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_contexts_are_isolated(prover_config: ProverConfig) {
    let first = boundary();
    let second = boundary();
    assert_ne!(first.name(), second.name());

    first.init().await.unwrap();
    second.init().await.unwrap();

    let first_prover = first.create_prover(prover_config.clone()).await.unwrap();
    let second_prover = second.create_prover(prover_config).await.unwrap();

    // Both engines number their provers independently.
    assert_eq!(first_prover.id(), second_prover.id());

    first_prover.setup(SESSION_URL).await.unwrap();
    first_prover
        .send_request(PROXY_URL, widget_request())
        .await
        .unwrap();

    // The second prover has not sent anything.
    let err = second_prover.transcript().await.unwrap_err();
    assert_eq!(err.engine().unwrap().kind(), EngineErrorKind::State);

    first.shutdown().await.unwrap();
    second_prover.setup(SESSION_URL).await.unwrap();
}
