//! Provider endpoint configuration.
//!
//! Holds the base URL, API version, and timeout for a provider. The
//! defaults are the public production endpoints; overriding the base URL
//! is mainly useful for pointing a client at a local fixture server.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base URL for the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default base URL for the Anthropic API.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version sent with every request.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Default request timeout for cloud providers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Endpoint settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for the API
    pub base_url: String,
    /// API version header value (empty when the provider has none)
    pub api_version: String,
    /// Timeout for buffered requests
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Creates the default configuration for OpenAI.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::llm::ProviderConfig;
    ///
    /// let config = ProviderConfig::openai();
    /// assert_eq!(config.chat_completions_endpoint(), "https://api.openai.com/v1/chat/completions");
    /// ```
    #[must_use]
    pub fn openai() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            api_version: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates the default configuration for Anthropic.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::llm::ProviderConfig;
    ///
    /// let config = ProviderConfig::anthropic();
    /// assert_eq!(config.messages_endpoint(), "https://api.anthropic.com/v1/messages");
    /// assert_eq!(config.api_version, "2023-06-01");
    /// ```
    #[must_use]
    pub fn anthropic() -> Self {
        Self {
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_version: ANTHROPIC_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the base URL for the API.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API version header.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the OpenAI chat completions endpoint URL.
    #[must_use]
    pub fn chat_completions_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Returns the Anthropic messages endpoint URL.
    #[must_use]
    pub fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_defaults() {
        let config = ProviderConfig::openai();

        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert!(config.api_version.is_empty());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn anthropic_defaults() {
        let config = ProviderConfig::anthropic();

        assert_eq!(config.base_url, ANTHROPIC_BASE_URL);
        assert_eq!(config.api_version, ANTHROPIC_API_VERSION);
    }

    #[test]
    fn custom_base_url_changes_endpoints() {
        let config = ProviderConfig::anthropic().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.messages_endpoint(), "http://127.0.0.1:9000/v1/messages");

        let config = ProviderConfig::openai().with_base_url("http://127.0.0.1:9000/v1");
        assert_eq!(
            config.chat_completions_endpoint(),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
    }

    #[test]
    fn builder_pattern() {
        let config = ProviderConfig::openai()
            .with_timeout(Duration::from_secs(30))
            .with_api_version("beta");

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.api_version, "beta");
    }

    #[test]
    fn serialization_roundtrip() {
        let config = ProviderConfig::anthropic().with_base_url("https://proxy.internal");

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ProviderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }
}
