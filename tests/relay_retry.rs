//! Relay Retry Tests
//!
//! Runs the relay against a local backend that answers with scripted
//! status codes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Router};
use tempfile::TempDir;

use tempmail::config::RelayConfig;
use tempmail::relay::{self, RelayClient, RelayExit};

/// Backend answering each request with the next scripted status, then
/// repeating the last one.
#[derive(Clone)]
struct ScriptedBackend {
    statuses: Arc<Vec<StatusCode>>,
    hits: Arc<AtomicUsize>,
}

async fn inbound(State(backend): State<ScriptedBackend>) -> StatusCode {
    let hit = backend.hits.fetch_add(1, Ordering::SeqCst);
    let index = hit.min(backend.statuses.len() - 1);
    backend.statuses[index]
}

async fn spawn_backend(statuses: Vec<StatusCode>) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        statuses: Arc::new(statuses),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/api/inbound/mail", post(inbound))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn relay_config(addr: SocketAddr, scratch: &TempDir) -> RelayConfig {
    RelayConfig {
        backend_url: format!("http://{}", addr),
        max_retries: 3,
        retry_delay_ms: 1,
        timeout_secs: 5,
        scratch_dir: scratch.path().to_str().unwrap().to_string(),
        ..RelayConfig::default()
    }
}

const MESSAGE: &[u8] = b"From: a@example.org\r\nTo: b@example.com\r\nSubject: Relay\r\n\r\nbody\r\n";

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (addr, hits) = spawn_backend(vec![
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::OK,
    ])
    .await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let attempts = RelayClient::new(&config)
        .unwrap()
        .submit(MESSAGE, &[])
        .await
        .unwrap();
    assert_eq!(attempts, 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_retries_request_requeue() {
    let (addr, hits) = spawn_backend(vec![StatusCode::BAD_GATEWAY]).await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let exit = relay::run(&config, MESSAGE).await;
    assert_eq!(exit, RelayExit::TempFail);
    assert_eq!(exit.code(), 75);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (addr, hits) = spawn_backend(vec![StatusCode::BAD_REQUEST]).await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let exit = relay::run(&config, MESSAGE).await;
    assert_eq!(exit, RelayExit::Unavailable);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delivered_run_leaves_no_scratch_files() {
    let (addr, hits) = spawn_backend(vec![StatusCode::OK]).await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let exit = relay::run(&config, MESSAGE).await;
    assert_eq!(exit, RelayExit::Delivered);
    assert_eq!(exit.code(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_empty_input_is_data_error() {
    let (addr, hits) = spawn_backend(vec![StatusCode::OK]).await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let exit = relay::run(&config, &b""[..]).await;
    assert_eq!(exit, RelayExit::DataErr);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deeply_nested_message_is_relayed() {
    let (addr, hits) = spawn_backend(vec![StatusCode::OK]).await;
    let scratch = TempDir::new().unwrap();
    let config = relay_config(addr, &scratch);

    let mut raw = String::from("From: a@example.org\r\nTo: b@example.com\r\n");
    for level in 0..5000 {
        raw.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"n{level}z\"\r\n\r\n--n{level}z\r\n"
        ));
    }
    raw.push_str("Content-Type: text/plain\r\n\r\nbody\r\n");

    let exit = relay::run(&config, raw.as_bytes()).await;
    assert_eq!(exit, RelayExit::Delivered);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
