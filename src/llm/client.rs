//! Provider capability trait.
//!
//! This module defines the `ChatProvider` trait which abstracts over the
//! supported chat-completion backends so the session controller can drive
//! any of them through one interface.

use crate::error::ChatError;
use crate::messages::{ChatMessage, GenerationParameters};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Boxed stream of non-empty text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Trait for chat-completion provider clients.
///
/// Implementations are stateless across calls apart from the credential
/// they were built with.
///
/// # Example
///
/// ```rust,ignore
/// use chatline::prelude::*;
///
/// let client = OpenAIClient::new("sk-...", ProviderConfig::openai())?;
/// let messages = vec![ChatMessage::user("Hello")];
/// let params = GenerationParameters::new("gpt-4o-mini");
///
/// let mut stream = client.stream(&messages, &params).await?;
/// while let Some(fragment) = stream.next().await {
///     print!("{}", fragment?);
/// }
/// ```
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// Returns the provider identifier, for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the supported model identifiers, in display order.
    ///
    /// Informational only; the `model` parameter is never checked against it.
    fn available_models(&self) -> &'static [&'static str];

    /// Sends a single-shot request and returns the first completion's text.
    ///
    /// Returns an empty string when the provider produced no content.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
    ) -> Result<String, ChatError>;

    /// Sends a streaming request and returns a lazy stream of text fragments.
    ///
    /// The stream ends at the provider's termination signal. Malformed or
    /// unrelated frames are skipped; only connection-level failures are
    /// surfaced as `Err` items.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
    ) -> Result<TextStream, ChatError>;
}
