//! `HttpSessionApi` against a minimal HTTP/1.1 responder on a local socket.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::api_client::{HttpSessionApi, SessionApi};
use super::types::StartPayload;
use crate::error_handling::types::ApiError;

/// Serves exactly one request with a canned response and hands back the raw request text.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (format!("http://{}", addr), handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if data.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn client(origin: &str) -> HttpSessionApi {
    HttpSessionApi::new(origin, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn status_is_fetched_with_bearer_token() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (origin, server) = serve_once(
        "200 OK",
        r#"{"is_running": true, "current_viewers": 12, "target_viewers": 50, "progress_percent": 24}"#,
    )
    .await;

    let snapshot = client(&origin).fetch_status("tok-1").await.unwrap();
    assert!(snapshot.is_running);
    assert_eq!(snapshot.current_viewers, 12);
    assert_eq!(snapshot.target_viewers, 50);
    assert_eq!(snapshot.progress_percent, 24.0);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/status HTTP/1.1"));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer tok-1"));
}

#[tokio::test]
async fn start_posts_json_payload() {
    let (origin, server) = serve_once("200 OK", r#"{"message": "ok"}"#).await;
    let payload = StartPayload {
        channel: "foo".into(),
        views: 50,
        duration: 10,
        rapid: Some(true),
        viewer_speed: None,
        ramp_up_minutes: None,
    };

    let message = client(&origin).start("tok", &payload).await.unwrap();
    assert_eq!(message, "ok");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/start HTTP/1.1"));
    let body = request.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"channel": "foo", "views": 50, "duration": 10, "rapid": true})
    );
}

#[tokio::test]
async fn accepted_start_with_plain_text_body_succeeds() {
    let (origin, _server) = serve_once("200 OK", "Bot started").await;
    let payload = StartPayload {
        channel: "foo".into(),
        views: 50,
        duration: 10,
        rapid: None,
        viewer_speed: None,
        ramp_up_minutes: None,
    };

    let message = client(&origin).start("tok", &payload).await.unwrap();
    assert_eq!(message, "");
}

#[tokio::test]
async fn accepted_stop_with_null_message_succeeds() {
    let (origin, _server) = serve_once("200 OK", r#"{"message": null}"#).await;
    let message = client(&origin).stop("tok").await.unwrap();
    assert_eq!(message, "");
}

#[tokio::test]
async fn rejection_detail_is_surfaced() {
    let (origin, _server) = serve_once(
        "400 Bad Request",
        r#"{"detail": "Session is not running or has already stopped."}"#,
    )
    .await;

    let err = client(&origin).stop("tok").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: 400,
            detail: "Session is not running or has already stopped.".into()
        }
    );
}

#[tokio::test]
async fn unauthorized_is_distinguished() {
    let (origin, _server) = serve_once("401 Unauthorized", r#"{"detail": "Not authenticated"}"#).await;
    let err = client(&origin).fetch_profile("stale").await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
}

#[tokio::test]
async fn profile_is_decoded() {
    let (origin, _server) = serve_once(
        "200 OK",
        r#"{"id": "42", "username": "alice", "avatar": "abc", "level": "pro", "max_views": 1000}"#,
    )
    .await;
    let profile = client(&origin).fetch_profile("tok").await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.max_views, Some(1000));
    assert_eq!(profile.tier(), "pro");
}

#[tokio::test]
async fn refused_connection_is_transient() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr))
        .fetch_status("tok")
        .await
        .unwrap_err();
    assert!(err.is_transient(), "unexpected error: {:?}", err);
}
