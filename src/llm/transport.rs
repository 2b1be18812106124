//! HTTP transport for provider calls.
//!
//! Wraps a `reqwest::Client` with the two request shapes the providers need:
//! a buffered request/response exchange and a lazily consumed SSE stream.
//! Both validate the status code before handing anything back.

use crate::error::ChatError;
use crate::llm::sse::{SseEvent, SseParser};
use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

/// Default time allowed for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed stream of parsed SSE events.
pub type SseEventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, ChatError>> + Send>>;

/// A JSON POST request to a provider endpoint.
#[derive(Clone)]
pub struct HttpRequest {
    /// Absolute endpoint URL
    pub url: String,
    /// Request headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// JSON request body
    pub body: serde_json::Value,
}

impl HttpRequest {
    /// Creates a JSON POST request with a `Content-Type: application/json` header.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first value of a header, compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values carry credentials, so only names are printed.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &names)
            .finish_non_exhaustive()
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a decode failure if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ChatError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ChatError::decode(format!("failed to parse response: {}", e)))
    }
}

/// Error envelope shared by both providers: `{"error": {"type", "message"}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    message: String,
}

/// HTTP transport shared by the provider clients.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport whose buffered requests time out after `timeout`.
    ///
    /// Streaming requests have no total bound. The same `timeout` applies
    /// to each read instead, so a stream that stalls fails while a steady
    /// one may run indefinitely.
    ///
    /// # Errors
    ///
    /// Returns a transport failure if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(timeout)
            .build()
            .map_err(|e| ChatError::transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Returns the timeout applied to buffered requests.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a request and buffers the whole response body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` for an unusable URL or a status outside
    /// `200..300`, and `TransportFailure` if the exchange itself fails.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
        let response = self
            .build(&request)?
            .timeout(self.timeout)
            .send()
            .await
            .map_err(ChatError::from)?;

        let status = response.status();
        tracing::info!(status = status.as_u16(), "HTTP status");
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ChatError::transport(format!("failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }

    /// Opens a streaming request and parses its body as SSE.
    ///
    /// The request is sent and the status line and headers are read before
    /// this returns. Body reads are lazy and happen only as the returned
    /// stream is polled. Dropping the stream releases the connection. A read
    /// failure, including an idle read timeout, surfaces as an `Err` item
    /// rather than a silent end of stream.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` for an unusable URL or a status outside
    /// `200..300`, and `TransportFailure` if the connection cannot be opened.
    pub async fn stream(
        &self,
        request: HttpRequest,
        mut parser: SseParser,
    ) -> Result<SseEventStream, ChatError> {
        let response = self
            .build(&request)?
            .send()
            .await
            .map_err(ChatError::from)?;

        let status = response.status();
        tracing::info!(status = status.as_u16(), "Streaming status");
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = stream! {
            let mut lines = LineBuffer::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::error!(error = %e, "Streaming failure");
                        yield Err(ChatError::transport(format!("stream read error: {}", e)));
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    if let Some(event) = parser.parse_line(&line) {
                        yield Ok(event);
                    }
                }
            }

            if let Some(line) = lines.finish() {
                if let Some(event) = parser.parse_line(&line) {
                    yield Ok(event);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, ChatError> {
        let url = url::Url::parse(&request.url).map_err(|e| {
            ChatError::invalid_response(format!("invalid endpoint '{}': {}", request.url, e))
        })?;

        let body = serde_json::to_vec(&request.body).map_err(|e| {
            ChatError::invalid_response(format!("failed to encode request body: {}", e))
        })?;

        let mut builder = self.client.post(url).body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Ok(builder)
    }

    async fn status_error(response: reqwest::Response) -> ChatError {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(status = status.as_u16(), error = %e, "Failed to read error body");
                String::new()
            }
        };
        ChatError::invalid_status(status.as_u16(), describe_error_body(status, &body))
    }
}

/// Extracts a readable message from an error response body.
fn describe_error_body(status: StatusCode, body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(body) {
        return match api_error.error.error_type {
            Some(error_type) => format!("{} (type: {})", api_error.error.message, error_type),
            None => api_error.error.message,
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a byte stream into complete lines.
///
/// Bytes are held until a newline arrives, so neither a line nor a
/// multi-byte character is ever split across network chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn line_buffer_joins_lines_split_across_chunks() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"data: hel").is_empty());
        assert_eq!(buffer.push(b"lo\ndata: wor"), vec!["data: hello"]);
        assert_eq!(buffer.push(b"ld\n\n"), vec!["data: world", ""]);
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn line_buffer_strips_carriage_returns() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"event: ping\r\n\r\n"), vec!["event: ping", ""]);
    }

    #[test]
    fn line_buffer_keeps_multibyte_characters_intact() {
        let mut buffer = LineBuffer::new();
        let bytes = "data: héllo\n".as_bytes();
        let (first, second) = bytes.split_at(8);

        assert!(buffer.push(first).is_empty());
        assert_eq!(buffer.push(second), vec!["data: héllo"]);
    }

    #[test]
    fn line_buffer_flushes_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
    }

    #[test]
    fn describe_error_body_prefers_api_message() {
        let body = r#"{"error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let message = describe_error_body(StatusCode::UNAUTHORIZED, body);

        assert!(message.contains("invalid x-api-key"));
        assert!(message.contains("authentication_error"));
    }

    #[test]
    fn describe_error_body_falls_back_to_reason() {
        assert_eq!(
            describe_error_body(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
        assert_eq!(
            describe_error_body(StatusCode::BAD_REQUEST, "plain failure"),
            "plain failure"
        );
    }

    #[test]
    fn request_debug_hides_header_values() {
        let request = HttpRequest::post_json("https://example.com", serde_json::json!({}))
            .header("Authorization", "Bearer sk-secret");

        let debug = format!("{:?}", request);
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("sk-secret"));
        assert_eq!(request.header_value("authorization"), Some("Bearer sk-secret"));
    }

    #[tokio::test]
    async fn send_returns_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("x-test", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let request = HttpRequest::post_json(format!("{}/echo", server.uri()), serde_json::json!({}))
            .header("x-test", "1");
        let response = transport().send(request).await.unwrap();

        assert_eq!(response.status, 200);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn send_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let request = HttpRequest::post_json(server.uri(), serde_json::json!({}));
        let error = transport().send(request).await.unwrap_err();

        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn invalid_url_is_invalid_response() {
        let request = HttpRequest::post_json("not a url", serde_json::json!({}));
        let error = transport().send(request).await.unwrap_err();

        assert!(matches!(
            error.kind,
            crate::error::ChatErrorKind::InvalidResponse { status: None, .. }
        ));
    }

    #[tokio::test]
    async fn stream_yields_parsed_events() {
        let server = MockServer::start().await;
        let body = "event: greeting\ndata: hello\n\n: comment\ndata: world\n\n";
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let request = HttpRequest::post_json(server.uri(), serde_json::json!({}));
        let stream = transport().stream(request, SseParser::new()).await.unwrap();
        let events: Vec<SseEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.as_deref(), Some("greeting"));
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[1].event, None);
        assert_eq!(events[1].data, "world");
    }

    #[tokio::test]
    async fn stream_rejects_non_success_status_before_yielding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#,
            ))
            .mount(&server)
            .await;

        let request = HttpRequest::post_json(server.uri(), serde_json::json!({}));
        let error = match transport().stream(request, SseParser::new()).await {
            Ok(_) => panic!("expected status error"),
            Err(e) => e,
        };

        assert_eq!(error.status(), Some(429));
        assert!(error.to_string().contains("slow down"));
    }

    /// Accepts one connection, reads the request, writes `response`, then
    /// waits for the client to close. Resolves to `true` once it has.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<bool>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0_u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return true;
                }
                buf.extend_from_slice(&chunk[..n]);
                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();

            matches!(socket.read(&mut chunk).await, Ok(0) | Err(_))
        });

        (url, handle)
    }

    #[tokio::test]
    async fn stalled_stream_fails_after_idle_timeout() {
        let chunk = "data: first\n\n";
        let (url, server) = serve_once(format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            chunk.len(),
            chunk
        ))
        .await;

        let transport = HttpTransport::new(Duration::from_millis(300)).unwrap();
        let request = HttpRequest::post_json(url, serde_json::json!({}));
        let mut stream = transport.stream(request, SseParser::new()).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.data, "first");

        let failure = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stalled stream should fail within the idle timeout")
            .unwrap();
        assert!(failure.unwrap_err().is_transport());

        drop(stream);
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_error_body_falls_back_to_reason() {
        let (url, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\nshort".to_string(),
        )
        .await;

        let transport = HttpTransport::new(Duration::from_millis(300)).unwrap();
        let request = HttpRequest::post_json(url, serde_json::json!({}));
        let error = transport.send(request).await.unwrap_err();

        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("Internal Server Error"));
    }
}
