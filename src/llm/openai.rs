//! OpenAI chat completions client.
//!
//! Translates provider-agnostic messages into the chat completions request
//! shape and reads text back out of both the buffered response and the
//! `choices[0].delta.content` stream chunks.

use crate::error::ChatError;
use crate::llm::client::{ChatProvider, TextStream};
use crate::llm::config::ProviderConfig;
use crate::llm::sse::SseParser;
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::messages::{ChatMessage, GenerationParameters, MessageRole};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Models offered for selection.
pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Data payload that terminates an OpenAI stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Client for the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAIClient {
    /// HTTP transport
    transport: HttpTransport,
    /// Endpoint configuration
    config: ProviderConfig,
    /// API key sent as a bearer token
    api_key: String,
}

/// Request body for the chat completions API.
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

/// A message in OpenAI format.
#[derive(Debug, Clone, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// Non-streaming response.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Streaming chunk.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChatCompletionChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunkChoice {
    delta: ChatCompletionDelta,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIClient {
    /// Creates a client that owns its own transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>, config: ProviderConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(api_key, config, transport))
    }

    /// Creates a client on top of a shared transport.
    #[must_use]
    pub fn with_transport(
        api_key: impl Into<String>,
        config: ProviderConfig,
        transport: HttpTransport,
    ) -> Self {
        Self {
            transport,
            config,
            api_key: api_key.into(),
        }
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Builds the HTTP request for a completion.
    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
        stream: bool,
    ) -> Result<HttpRequest, ChatError> {
        let body = ChatCompletionRequest {
            model: params.model.clone(),
            messages: convert_messages(messages, params.non_empty_system_prompt()),
            stream,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let body = serde_json::to_value(&body)
            .map_err(|e| ChatError::invalid_response(format!("failed to encode request: {}", e)))?;

        Ok(
            HttpRequest::post_json(self.config.chat_completions_endpoint(), body)
                .header("Authorization", format!("Bearer {}", self.api_key)),
        )
    }
}

impl fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Converts messages to OpenAI format, prepending the system prompt if present.
fn convert_messages(messages: &[ChatMessage], system_prompt: Option<&str>) -> Vec<OpenAIMessage> {
    let system = system_prompt.map(|prompt| OpenAIMessage {
        role: MessageRole::System.as_str().to_string(),
        content: prompt.to_string(),
    });

    system
        .into_iter()
        .chain(messages.iter().map(|msg| OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }))
        .collect()
}

/// Extracts the first choice's text, or an empty string.
fn extract_text(response: ChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

/// Extracts a non-empty text delta from one stream chunk.
///
/// Returns `None` for anything that is not a well-formed content delta.
fn parse_stream_delta(data: &str) -> Option<String> {
    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable OpenAI stream frame");
            return None;
        }
    };

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
}

#[async_trait]
impl ChatProvider for OpenAIClient {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn available_models(&self) -> &'static [&'static str] {
        OPENAI_MODELS
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
    ) -> Result<String, ChatError> {
        let request = self.build_request(messages, params, false)?;
        let response = self.transport.send(request).await?;
        let decoded: ChatCompletionResponse = response.json()?;
        Ok(extract_text(decoded))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
    ) -> Result<TextStream, ChatError> {
        let request = self.build_request(messages, params, true)?;
        let mut events = self.transport.stream(request, SseParser::new()).await?;

        let stream = stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if event.data == DONE_SENTINEL {
                    tracing::debug!("OpenAI stream reached [DONE]");
                    break;
                }
                if let Some(text) = parse_stream_delta(&event.data) {
                    yield Ok(text);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str) -> OpenAIClient {
        OpenAIClient::new("sk-test", ProviderConfig::openai().with_base_url(base_url)).unwrap()
    }

    fn params() -> GenerationParameters {
        GenerationParameters::new("gpt-4o-mini")
            .with_temperature(0.7)
            .with_max_tokens(100)
    }

    #[test]
    fn request_body_prepends_system_prompt() {
        let client = client_for("https://api.openai.com/v1");
        let params = params().with_system_prompt("Be kind.");
        let request = client
            .build_request(&[ChatMessage::user("Hello")], &params, true)
            .unwrap();

        assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(request.header_value("Authorization"), Some("Bearer sk-test"));
        assert_eq!(
            request.body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be kind."},
                    {"role": "user", "content": "Hello"}
                ],
                "stream": true,
                "temperature": 0.7,
                "max_tokens": 100
            })
        );
    }

    #[test]
    fn request_body_omits_empty_system_prompt() {
        let client = client_for("https://api.openai.com/v1");
        let request = client.build_request(
            &[ChatMessage::user("Hello")],
            &params().with_system_prompt(""),
            false,
        )
        .unwrap();

        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(request.body["stream"], false);
    }

    #[test]
    fn parse_stream_delta_reads_content() {
        let data = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        assert_eq!(parse_stream_delta(data), Some("Hi".to_string()));
    }

    #[test]
    fn parse_stream_delta_skips_empty_and_role_only_chunks() {
        assert_eq!(
            parse_stream_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
        assert_eq!(parse_stream_delta(r#"{"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(parse_stream_delta(r#"{"choices":[]}"#), None);
    }

    #[test]
    fn parse_stream_delta_skips_malformed_json() {
        assert_eq!(parse_stream_delta("{not json"), None);
        assert_eq!(parse_stream_delta(DONE_SENTINEL), None);
    }

    #[test]
    fn extract_text_defaults_to_empty() {
        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(extract_text(empty), "");

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(extract_text(null_content), "");
    }

    #[test]
    fn provider_metadata() {
        let client = client_for("https://api.openai.com/v1");
        assert_eq!(client.name(), "OpenAI");
        assert_eq!(client.available_models()[0], "gpt-4o");
        let _boxed: Box<dyn ChatProvider> = Box::new(client);
    }

    #[test]
    fn debug_does_not_leak_api_key() {
        let client = client_for("https://api.openai.com/v1");
        assert!(!format!("{:?}", client).contains("sk-test"));
    }

    #[tokio::test]
    async fn complete_returns_first_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server.uri())
            .complete(&[ChatMessage::user("Hello")], &params())
            .await
            .unwrap();

        assert_eq!(text, "Hi there");
    }

    #[tokio::test]
    async fn complete_propagates_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let error = client_for(&server.uri())
            .complete(&[ChatMessage::user("Hello")], &params())
            .await
            .unwrap_err();

        assert!(matches!(
            error.kind,
            crate::error::ChatErrorKind::DecodeFailure { .. }
        ));
    }

    #[tokio::test]
    async fn stream_stops_at_done_and_skips_noise() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            ": heartbeat\n\n",
            "data: {garbage\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let stream = client_for(&server.uri())
            .stream(&[ChatMessage::user("Hello")], &params())
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments, vec!["Hi", " there"]);
    }
}
