//! HTTP backend client against a one-shot local server.

use portico_core::{OperatorStatus, UserOperatorStatus};
use portico_middleware::{BackendError, HttpRegistrationBackend, RegistrationBackend};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serves one canned response and returns the raw request head it received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let mut received = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            if n == 0 || received.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&received).into_owned()
    });

    (format!("http://{addr}/api/"), handle)
}

fn client(api_url: &str) -> HttpRegistrationBackend {
    HttpRegistrationBackend::new(api_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn current_record_is_decoded_and_identity_is_sent() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"status":"Approved","operatorId":"88","operatorStatus":"Draft","operatorLegalName":"Delta Ltd."}"#,
    )
    .await;

    let backend = client(&url);
    let facts = backend
        .current_user_operator("guid-9")
        .await
        .unwrap()
        .expect("record present");

    assert_eq!(facts.user_operator_status, UserOperatorStatus::Approved);
    assert_eq!(facts.operator_id, "88");
    assert_eq!(facts.operator_status, OperatorStatus::Draft);

    let head = server.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /api/registration/user-operators/current "));
    assert!(head.contains(r#"authorization: {"user_guid":"guid-9"}"#));
    assert!(head.contains("cache-control: no-store"));
}

#[tokio::test]
async fn numeric_operator_id_is_accepted() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"status":"Pending","operatorId":4242,"operatorStatus":"Draft","operatorLegalName":"Bravo Gas Ltd."}"#,
    )
    .await;

    let facts = client(&url)
        .pending_user_operator("guid-9")
        .await
        .unwrap()
        .expect("record present");

    assert_eq!(facts.operator_id, "4242");
    assert_eq!(facts.user_operator_status, UserOperatorStatus::Pending);
    server.await.unwrap();
}

#[tokio::test]
async fn not_found_means_no_record() {
    let (url, server) = serve_once("404 Not Found", r#"{"detail":"Not found."}"#).await;

    let facts = client(&url).pending_user_operator("guid-9").await.unwrap();
    assert!(facts.is_none());

    let head = server.await.unwrap();
    assert!(head.starts_with("GET /api/registration/user-operators/pending "));
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let (url, server) = serve_once("500 Internal Server Error", "{}").await;

    let err = client(&url).current_user_operator("guid-9").await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Status {
            endpoint: "current",
            status: 500
        }
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn invalid_body_is_rejected() {
    let (url, server) = serve_once("200 OK", r#"{"status":"Unknown"}"#).await;

    let err = client(&url).current_user_operator("guid-9").await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidPayload { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .current_user_operator("guid-9")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Request { .. }));
}
