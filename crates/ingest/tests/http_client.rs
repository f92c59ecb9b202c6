//! The reqwest client against a local engine stub.

use std::time::Duration;

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use ingest::{HttpUpstreamClient, IngestError, UploadRequest, UpstreamClient, UpstreamConfig};
use tokio::net::TcpListener;

/// Echoes the multipart fields back so the test can check what was sent.
async fn engine(mut multipart: Multipart) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    let mut seen = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await.unwrap_or_default();
        match file_name {
            Some(file_name) => seen.push(format!("{name}={file_name}:{}", data.len())),
            None => seen.push(format!("{name}={}", String::from_utf8_lossy(&data))),
        }
    }
    let status = if seen.iter().any(|s| s == "product=tulip") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (
        status,
        [("x-engine", "stub")],
        format!(r#"{{"Response":"{}"}}"#, seen.join(";")),
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn spawn_engine() -> String {
    let app = Router::new()
        .route("/analyze", post(engine))
        .route("/slow", post(slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn upload(product: &str) -> UploadRequest {
    UploadRequest::new(product, "42", "leaf.jpg", vec![7u8; 1024])
}

#[tokio::test]
async fn sends_three_multipart_fields_and_buffers_the_reply() {
    let base = spawn_engine().await;
    let client = HttpUpstreamClient::new(&UpstreamConfig::new(format!("{base}/analyze"))).unwrap();

    let reply = client.send(&upload("rose")).await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("X-Engine"), Some("stub"));
    assert_eq!(
        reply.body_text(),
        r#"{"Response":"product=rose;userID=42;files=leaf.jpg:1024"}"#
    );
}

#[tokio::test]
async fn non_success_statuses_are_replies_not_errors() {
    let base = spawn_engine().await;
    let client = HttpUpstreamClient::new(&UpstreamConfig::new(format!("{base}/analyze"))).unwrap();

    let reply = client.send(&upload("tulip")).await.unwrap();
    assert_eq!(reply.status, 400);
}

#[tokio::test]
async fn deadline_is_a_transport_error() {
    let base = spawn_engine().await;
    let cfg = UpstreamConfig {
        url: format!("{base}/slow"),
        timeout_secs: 1,
    };
    let client = HttpUpstreamClient::new(&cfg).unwrap();

    let err = client.send(&upload("rose")).await.unwrap_err();
    assert!(matches!(err, IngestError::Transport(_)));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpUpstreamClient::new(&UpstreamConfig::new(format!("http://{addr}/analyze"))).unwrap();
    let err = client.send(&upload("rose")).await.unwrap_err();
    assert!(matches!(err, IngestError::Transport(_)));
}
