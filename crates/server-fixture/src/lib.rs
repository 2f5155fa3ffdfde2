//! An HTTP server used as the notarized party in tests.
//!
//! The fixture speaks plaintext HTTP/1.1 over any byte stream, so tests can
//! serve it over an in-memory duplex as well as over TCP.

use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    Request,
};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tower_service::Service;

/// Default port of the fixture binary.
pub const DEFAULT_FIXTURE_PORT: u16 = 3000;

/// Body served by `GET /api/widget`.
pub const WIDGET_JSON: &str = r#"{"id":42,"name":"widget","price":{"amount":1999,"currency":"USD"},"tags":["blue","small"]}"#;

fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/api/widget", get(widget))
        .route("/api/order", post(order))
        .route("/bytes", get(bytes))
}

/// Serves a single connection on the given socket.
pub async fn bind<T>(socket: T) -> anyhow::Result<()>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let io = TokioIo::new(socket);

    let tower_service = app();
    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
        tower_service.clone().call(request)
    });

    http1::Builder::new()
        .keep_alive(false)
        .serve_connection(io, hyper_service)
        .await?;

    Ok(())
}

async fn widget(
    headers: HeaderMap,
) -> Result<([(&'static str, &'static str); 1], &'static str), StatusCode> {
    if let Some(accept) = headers.get("accept") {
        let accept = accept.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
        if !accept.contains("json") && !accept.contains("*/*") {
            return Err(StatusCode::NOT_ACCEPTABLE);
        }
    }

    Ok(([("content-type", "application/json")], WIDGET_JSON))
}

#[derive(Debug, Deserialize)]
struct Order {
    item: String,
    quantity: u32,
}

async fn order(Json(order): Json<Order>) -> Result<Json<Value>, StatusCode> {
    if order.quantity == 0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    Ok(Json(json!({
        "status": "accepted",
        "item": order.item,
        "quantity": order.quantity,
    })))
}

async fn bytes(Query(params): Query<HashMap<String, String>>) -> Bytes {
    let size = params
        .get("size")
        .and_then(|size| size.parse::<usize>().ok())
        .unwrap_or(1);

    Bytes::from(vec![0x42u8; size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt as _, Empty, Full};
    use hyper::client::conn::http1::handshake;

    async fn send<B>(request: Request<B>) -> (StatusCode, Bytes)
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (client, server) = tokio::io::duplex(1 << 16);
        tokio::spawn(bind(server));

        let (mut sender, conn) = handshake(TokioIo::new(client)).await.unwrap();
        tokio::spawn(conn);

        let response = sender.send_request(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, body)
    }

    #[tokio::test]
    async fn test_widget() {
        let request = Request::get("/api/widget")
            .header("host", "example.test")
            .header("content-type", "application/json")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, WIDGET_JSON.as_bytes());
    }

    #[tokio::test]
    async fn test_order() {
        let request = Request::post("/api/order")
            .header("host", "example.test")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(
                br#"{"item":"widget","quantity":2}"#,
            )))
            .unwrap();

        let (status, body) = send(request).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["quantity"], 2);
    }

    #[tokio::test]
    async fn test_bytes() {
        let request = Request::get("/bytes?size=100")
            .header("host", "example.test")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.len(), 100);
    }
}
