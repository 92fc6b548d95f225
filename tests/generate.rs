//! Integration tests for the streamed generation client
//!
//! A minimal TCP server stands in for the Ollama-compatible endpoint so the
//! NDJSON framing, sentence assembly, and failure handling can be exercised
//! without a model running.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use valet::GenerateClient;

/// Consume the HTTP request (headers plus `Content-Length` body)
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map_or(0, |v| v.trim().parse().unwrap());

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Serve one request with a 200 NDJSON response, written in the given chunks
///
/// Chunks are flushed with small pauses between them, then the socket is
/// closed to delimit the body. Returns the endpoint URL.
async fn spawn_ndjson_server(chunks: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  content-type: application/x-ndjson\r\n\
                  connection: close\r\n\r\n",
            )
            .await
            .unwrap();

        for chunk in chunks {
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        socket.shutdown().await.ok();
    });

    format!("http://{addr}/api/generate")
}

/// Serve one request with a bare error status and no body
async fn spawn_error_server(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    format!("http://{addr}/api/generate")
}

async fn collect(url: String) -> Vec<String> {
    let client = GenerateClient::new(url, "test-model".to_string()).unwrap();
    let mut stream = client.stream("hello");
    let mut sentences = Vec::new();
    while let Some(sentence) = stream.next().await {
        sentences.push(sentence);
    }
    sentences
}

#[tokio::test]
async fn sentences_are_released_as_they_complete() {
    let body = concat!(
        r#"{"response":"Hello"}"#,
        "\n",
        r#"{"response":" world."}"#,
        "\n",
        r#"{"response":" How"}"#,
        "\n",
        r#"{"response":" are you?"}"#,
        "\n",
        r#"{"response":" I am"}"#,
        "\n",
        r#"{"response":" fine."}"#,
        "\n",
        r#"{"done":true}"#,
        "\n",
    );

    let url = spawn_ndjson_server(vec![body.as_bytes().to_vec()]).await;
    let sentences = collect(url).await;

    assert_eq!(sentences, vec!["Hello world.", "How are you?", "I am fine."]);
}

#[tokio::test]
async fn lines_split_across_network_chunks_are_reassembled() {
    let body = concat!(
        r#"{"response":"One."}"#,
        "\n",
        r#"{"response":" Two."}"#,
        "\n",
        r#"{"done":true}"#,
        "\n",
    )
    .as_bytes()
    .to_vec();

    // Cut the body at awkward places, including mid-JSON-object
    let chunks = vec![
        body[..7].to_vec(),
        body[7..25].to_vec(),
        body[25..26].to_vec(),
        body[26..].to_vec(),
    ];

    let url = spawn_ndjson_server(chunks).await;
    let sentences = collect(url).await;

    assert_eq!(sentences, vec!["One.", "Two."]);
}

#[tokio::test]
async fn trailing_text_without_terminator_is_flushed_at_end() {
    let body = concat!(
        r#"{"response":"Complete sentence."}"#,
        "\n",
        r#"{"response":" And a trailing thought"}"#,
        "\n",
    );

    let url = spawn_ndjson_server(vec![body.as_bytes().to_vec()]).await;
    let sentences = collect(url).await;

    assert_eq!(
        sentences,
        vec!["Complete sentence.", "And a trailing thought"]
    );
}

#[tokio::test]
async fn final_line_without_newline_is_still_parsed() {
    let body = concat!(
        r#"{"response":"First."}"#,
        "\n",
        r#"{"response":" Last words."}"#,
    );

    let url = spawn_ndjson_server(vec![body.as_bytes().to_vec()]).await;
    let sentences = collect(url).await;

    assert_eq!(sentences, vec!["First.", "Last words."]);
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let body = concat!(
        r#"{"response":"Good."}"#,
        "\n",
        "this is not json\n",
        r#"{"unrelated":123}"#,
        "\n",
        r#"{"response":" Still good."}"#,
        "\n",
    );

    let url = spawn_ndjson_server(vec![body.as_bytes().to_vec()]).await;
    let sentences = collect(url).await;

    assert_eq!(sentences, vec!["Good.", "Still good."]);
}

#[tokio::test]
async fn unreachable_endpoint_yields_one_spoken_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sentences = collect(format!("http://{addr}/api/generate")).await;

    assert_eq!(sentences.len(), 1);
    assert!(
        sentences[0].starts_with("Error connecting to the generation service"),
        "unexpected fragment: {}",
        sentences[0]
    );
}

#[tokio::test]
async fn server_error_status_yields_one_spoken_error() {
    let url = spawn_error_server("HTTP/1.1 500 Internal Server Error").await;
    let sentences = collect(url).await;

    assert_eq!(sentences.len(), 1);
    assert!(sentences[0].starts_with("Error connecting to the generation service"));
}

#[tokio::test]
async fn reply_text_survives_sentence_splitting() {
    let fragments = ["The quick", " brown fox.", " Jumps over;", " the lazy dog!"];
    let body: String = fragments
        .iter()
        .map(|f| format!("{{\"response\":\"{f}\"}}\n"))
        .collect();

    let url = spawn_ndjson_server(vec![body.into_bytes()]).await;
    let sentences = collect(url).await;

    let rejoined: Vec<&str> = sentences
        .iter()
        .flat_map(|s| s.split_whitespace())
        .collect();
    let original: Vec<&str> = fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect();
    assert_eq!(rejoined, original);
}
