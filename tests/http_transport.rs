//! The reqwest transport against a minimal local HTTP server.

use std::time::Duration;

use dashstream::{
    Callbacks, CancelToken, ChatReply, ChatRequest, HttpOptions, Outcome, StreamClient,
    StreamError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Read one request (headers plus `Content-Length` body) and return it as text.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&raw).into_owned()
}

/// Serve one connection: write `head`, then each body part with a pause
/// in between, then close.
async fn serve_once(head: String, parts: Vec<String>) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = tx.send(request);

        socket.write_all(head.as_bytes()).await.unwrap();
        for part in parts {
            socket.write_all(part.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = socket.shutdown().await;
    });

    (base_url, rx)
}

#[tokio::test]
async fn streams_chat_over_http() {
    let head = "HTTP/1.1 200 OK\r\n\
                Content-Type: text/event-stream\r\n\
                Connection: close\r\n\r\n"
        .to_string();
    let parts = vec![
        "data: {\"type\":\"status\",\"message\":\"thinking\"}\n".to_string(),
        "data: {\"type\":\"chunk\",\"con".to_string(),
        "tent\":\"Hel\"}\ndata: {\"type\":\"chunk\",\"content\":\"lo\"}\n".to_string(),
        "data: {\"type\":\"complete\",\"response\":\"Hello\",\"provider\":\"openai\"}\n".to_string(),
    ];
    let (base_url, request_rx) = serve_once(head, parts).await;

    let client = StreamClient::new(HttpOptions::new(base_url).with_header("X-Dashboard-User", "ops"))
        .unwrap();
    let mut full = String::new();
    let callbacks = Callbacks::new().on_chunk(|_, text| full = text.to_string());

    let outcome = client
        .chat(&ChatRequest::new("hi"), callbacks, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Complete(ChatReply {
            response: "Hello".into(),
            provider: Some("openai".into()),
        })
    );
    assert_eq!(full, "Hello");

    let request = request_rx.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with("post /api/ai/chat/stream "));
    assert!(request.contains("content-type: application/json"));
    assert!(request.contains("x-dashboard-user: ops"));
    assert!(request.contains("\"message\":\"hi\""));
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let body = "{\"error\":\"jira unavailable\"}";
    let head = format!(
        "HTTP/1.1 502 Bad Gateway\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let (base_url, _request_rx) = serve_once(head, Vec::new()).await;

    let client = StreamClient::new(HttpOptions::new(base_url)).unwrap();
    let err = client
        .chat(&ChatRequest::new("hi"), Callbacks::new(), &CancelToken::new())
        .await
        .unwrap_err();

    match err {
        StreamError::Status { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("jira unavailable"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_releases_open_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
                  data: {\"type\":\"chunk\",\"content\":\"first\"}\n",
            )
            .await
            .unwrap();

        // Keep the stream open until the client hangs up.
        let mut buf = [0u8; 64];
        let closed = matches!(socket.read(&mut buf).await, Ok(0) | Err(_));
        let _ = closed_tx.send(closed);
    });

    let client = StreamClient::new(HttpOptions::new(base_url)).unwrap();
    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    let callbacks = Callbacks::new().on_chunk(move |_, _| canceller.cancel());

    let outcome = client
        .chat(&ChatRequest::new("hi"), callbacks, &cancel)
        .await
        .unwrap();
    assert!(outcome.is_cancelled());

    drop(client);
    let closed = tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("server should observe the hang-up")
        .unwrap();
    assert!(closed);
}
