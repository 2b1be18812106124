//! Anthropic messages API client.
//!
//! HTTP client for the Anthropic messages endpoint, including SSE stream
//! handling. Text arrives in `content_block_delta` events and the stream
//! ends at `message_stop`.

use crate::error::ChatError;
use crate::llm::client::{ChatProvider, TextStream};
use crate::llm::config::ProviderConfig;
use crate::llm::sse::{SseEvent, SseParser};
use crate::llm::transport::{HttpRequest, HttpTransport};
use crate::messages::{ChatMessage, GenerationParameters, MessageRole};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Models offered for selection.
pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-haiku-20240307",
];

/// Event name that terminates an Anthropic stream.
const MESSAGE_STOP: &str = "message_stop";

/// Event type carrying a text delta.
const CONTENT_BLOCK_DELTA: &str = "content_block_delta";

/// Client for the Anthropic messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    /// HTTP transport
    transport: HttpTransport,
    /// Endpoint configuration
    config: ProviderConfig,
    /// API key sent in the `x-api-key` header
    api_key: String,
}

/// Request body for the messages API.
#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ApiMessage>,
    system: String,
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

/// A message in the API format.
#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

/// Response from the messages API (non-streaming).
#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContentBlock>,
}

/// A content block in the response.
#[derive(Debug, Clone, Deserialize)]
struct ResponseContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Raw SSE payload from the streaming API.
#[derive(Debug, Clone, Deserialize)]
struct RawStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<RawDelta>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDelta {
    #[serde(default)]
    text: Option<String>,
}

/// What a single SSE event means for the text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamStep {
    /// A non-empty text fragment
    Text(String),
    /// The provider's termination signal
    Stop,
    /// Anything else: pings, block boundaries, malformed frames
    Skip,
}

impl AnthropicClient {
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

    /// Builds the HTTP request for a messages call.
    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
        stream: bool,
    ) -> Result<HttpRequest, ChatError> {
        let body = MessagesRequest {
            model: params.model.clone(),
            messages: convert_messages(messages),
            system: params.system_prompt.clone().unwrap_or_default(),
            stream,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let body = serde_json::to_value(&body)
            .map_err(|e| ChatError::invalid_response(format!("failed to encode request: {}", e)))?;

        Ok(HttpRequest::post_json(self.config.messages_endpoint(), body)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", self.config.api_version.as_str()))
    }
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Converts messages to API format, dropping system-role entries.
///
/// The system prompt travels in the top-level `system` field instead.
fn convert_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
    messages
        .iter()
        .filter(|msg| msg.role != MessageRole::System)
        .map(|msg| ApiMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

/// Extracts the first content block's text, or an empty string.
fn extract_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .unwrap_or_default()
}

/// Interprets one SSE event from the messages stream.
fn interpret_event(event: &SseEvent) -> StreamStep {
    if event.is_named(MESSAGE_STOP) {
        return StreamStep::Stop;
    }

    let raw = match serde_json::from_str::<RawStreamEvent>(&event.data) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Anthropic stream frame");
            return StreamStep::Skip;
        }
    };

    match raw.event_type.as_str() {
        MESSAGE_STOP => StreamStep::Stop,
        CONTENT_BLOCK_DELTA => raw
            .delta
            .and_then(|d| d.text)
            .filter(|text| !text.is_empty())
            .map_or(StreamStep::Skip, StreamStep::Text),
        "error" => {
            tracing::warn!(data = %event.data, "Anthropic stream reported an error frame");
            StreamStep::Skip
        }
        _ => StreamStep::Skip,
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    fn available_models(&self) -> &'static [&'static str] {
        ANTHROPIC_MODELS
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
    ) -> Result<String, ChatError> {
        let request = self.build_request(messages, params, false)?;
        let response = self.transport.send(request).await?;
        let decoded: MessagesResponse = response.json()?;
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
                match interpret_event(&event) {
                    StreamStep::Text(text) => yield Ok(text),
                    StreamStep::Stop => {
                        tracing::debug!("Anthropic stream reached message_stop");
                        break;
                    }
                    StreamStep::Skip => {}
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
