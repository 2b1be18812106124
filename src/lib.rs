//! # chatline: streaming chat-completion client
//!
//! Sends conversational turns to OpenAI-style or Anthropic-style chat
//! providers and exposes their replies as cancellable streams of text
//! fragments.
//!
//! ## Architecture
//!
//! - **SSE parser**: turns raw protocol lines into `{event, data}` records
//! - **HTTP transport**: buffered and streamed requests with status validation
//! - **Provider clients**: OpenAI, Anthropic, and an offline canned-reply bot
//!   behind one [`ChatProvider`](llm::ChatProvider) trait
//! - **Factory**: resolves a provider selector plus credential into a client
//! - **Session controller**: drives one generation at a time with
//!   cooperative cancellation and a single terminal outcome
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ChatError> {
//!     let provider = make(ProviderSelector::OpenAI, &EnvCredentials::new())?;
//!     let mut session = ChatSession::new(provider, SessionConfig::default());
//!
//!     let mut generation = session
//!         .submit(vec![ChatMessage::user("Hello")], GenerationParameters::new("gpt-4o-mini"))
//!         .await?;
//!     while let Some(update) = generation.next_update().await {
//!         if let SessionUpdate::Text { delta, .. } = update {
//!             print!("{delta}");
//!         }
//!     }
//!     println!("\n{:?}", generation.outcome().await);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod messages;
pub mod session;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ChatlineConfig, EnvCredentials};
    pub use crate::error::{ChatError, ChatErrorKind};
    pub use crate::llm::{
        make, make_with_config, AnthropicClient, ChatProvider, CredentialLookup, OfflineClient,
        OpenAIClient, ProviderConfig, ProviderSelector, TextStream,
    };
    pub use crate::messages::{ChatMessage, GenerationParameters, MessageRole};
    pub use crate::session::{
        ChatSession, Generation, SessionConfig, SessionState, SessionUpdate, StreamingOutcome,
    };

    pub use futures::StreamExt;
}
