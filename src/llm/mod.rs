//! LLM provider module.
//!
//! This module contains the provider capability trait, the OpenAI and
//! Anthropic HTTP clients, the offline canned-reply provider, and the SSE
//! and HTTP plumbing they share.

mod anthropic;
mod client;
mod config;
mod factory;
mod offline;
mod openai;
mod sse;
mod transport;

pub use anthropic::{AnthropicClient, ANTHROPIC_MODELS};
pub use client::{ChatProvider, TextStream};
pub use config::{
    ProviderConfig, ANTHROPIC_API_VERSION, ANTHROPIC_BASE_URL, DEFAULT_TIMEOUT, OPENAI_BASE_URL,
};
pub use factory::{make, make_with_config, CredentialLookup, ProviderSelector};
pub use offline::{OfflineClient, OFFLINE_MODELS};
pub use openai::{OpenAIClient, OPENAI_MODELS};
pub use sse::{SseEvent, SseParser};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, SseEventStream};
