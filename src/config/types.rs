//! Configuration file types.
//!
//! These map one-to-one onto the TOML file and convert into the core
//! runtime types (`ProviderConfig`, `GenerationParameters`, `SessionConfig`).

use crate::error::ChatError;
use crate::llm::{CredentialLookup, ProviderConfig, ProviderSelector};
use crate::messages::GenerationParameters;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI model when the file does not name one.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Anthropic model when the file does not name one.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Model name used for the offline provider.
pub const OFFLINE_MODEL: &str = "offline";

/// Root configuration structure for chatline.
///
/// ```toml
/// default_provider = "anthropic"
///
/// [providers.anthropic]
/// model = "claude-3-haiku-20240307"
/// api_key_env = "ANTHROPIC_API_KEY"
///
/// [session]
/// thinking_delay_ms = 350
/// system_prompt = "You are a supportive companion."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatlineConfig {
    /// Provider used when none is specified on the command line.
    #[serde(default)]
    pub default_provider: Option<ProviderSelector>,

    /// Per-provider settings.
    #[serde(default)]
    pub providers: ProvidersFileConfig,

    /// Session timing and prompt settings.
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// The `[providers]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersFileConfig {
    /// `[providers.openai]`
    #[serde(default)]
    pub openai: Option<ProviderFileConfig>,

    /// `[providers.anthropic]`
    #[serde(default)]
    pub anthropic: Option<ProviderFileConfig>,
}

/// Settings for one cloud provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderFileConfig {
    /// Model identifier sent with every request.
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Base URL override.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Timeout for buffered requests, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderFileConfig {
    /// Creates an empty provider section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API key environment variable.
    #[must_use]
    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// The `[session]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFileConfig {
    /// Minimum time in `Thinking`, in milliseconds.
    #[serde(default)]
    pub thinking_delay_ms: Option<u64>,

    /// Delay after each fragment, in milliseconds.
    #[serde(default)]
    pub chunk_pacing_ms: Option<u64>,

    /// System prompt sent with every conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Text shown when a reply comes back empty.
    #[serde(default)]
    pub empty_placeholder: Option<String>,
}

impl ChatlineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default provider.
    #[must_use]
    pub fn with_default_provider(mut self, selector: ProviderSelector) -> Self {
        self.default_provider = Some(selector);
        self
    }

    /// Sets the section for a cloud provider. Ignored for `Offline`.
    #[must_use]
    pub fn with_provider(mut self, selector: ProviderSelector, config: ProviderFileConfig) -> Self {
        match selector {
            ProviderSelector::OpenAI => self.providers.openai = Some(config),
            ProviderSelector::Anthropic => self.providers.anthropic = Some(config),
            ProviderSelector::Offline => {}
        }
        self
    }

    /// Returns the default provider, falling back to OpenAI.
    #[must_use]
    pub fn effective_default(&self) -> ProviderSelector {
        self.default_provider.unwrap_or_default()
    }

    /// Returns the file section for a provider, if present.
    #[must_use]
    pub fn provider(&self, selector: ProviderSelector) -> Option<&ProviderFileConfig> {
        match selector {
            ProviderSelector::OpenAI => self.providers.openai.as_ref(),
            ProviderSelector::Anthropic => self.providers.anthropic.as_ref(),
            ProviderSelector::Offline => None,
        }
    }

    /// Builds the endpoint configuration for a provider.
    ///
    /// Returns `None` for the offline provider.
    #[must_use]
    pub fn provider_config(&self, selector: ProviderSelector) -> Option<ProviderConfig> {
        let mut config = selector.default_config()?;

        if let Some(file) = self.provider(selector) {
            if let Some(ref url) = file.base_url {
                config = config.with_base_url(url);
            }
            if let Some(secs) = file.timeout_secs {
                config = config.with_timeout(Duration::from_secs(secs));
            }
        }

        Some(config)
    }

    /// Builds generation parameters for a provider.
    #[must_use]
    pub fn generation_parameters(&self, selector: ProviderSelector) -> GenerationParameters {
        let file = self.provider(selector);

        let model = file
            .and_then(|f| f.model.clone())
            .unwrap_or_else(|| default_model(selector).to_string());

        let mut params = GenerationParameters::new(model);
        if let Some(temperature) = file.and_then(|f| f.temperature) {
            params = params.with_temperature(temperature);
        }
        if let Some(max_tokens) = file.and_then(|f| f.max_tokens) {
            params = params.with_max_tokens(max_tokens);
        }
        if let Some(ref prompt) = self.session.system_prompt {
            params = params.with_system_prompt(prompt);
        }
        params
    }

    /// Builds the session configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(ms) = self.session.thinking_delay_ms {
            config = config.with_thinking_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.session.chunk_pacing_ms {
            config = config.with_chunk_pacing(Duration::from_millis(ms));
        }
        if let Some(ref placeholder) = self.session.empty_placeholder {
            config = config.with_empty_placeholder(placeholder);
        }
        config
    }

    /// Returns a credential lookup that reads the configured environment variables.
    #[must_use]
    pub fn credentials(&self) -> EnvCredentials {
        let mut credentials = EnvCredentials::new();
        for selector in ProviderSelector::ALL {
            if let Some(env_var) = self.provider(selector).and_then(|f| f.api_key_env.clone()) {
                credentials = credentials.with_env_var(selector, env_var);
            }
        }
        credentials
    }

    /// Checks values that the providers would otherwise reject late.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), ChatError> {
        for selector in [ProviderSelector::OpenAI, ProviderSelector::Anthropic] {
            let Some(file) = self.provider(selector) else {
                continue;
            };
            let section = selector.as_str();

            if let Some(temperature) = file.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(ChatError::invalid_config(
                        format!("providers.{}.temperature", section),
                        format!("must be between 0.0 and 2.0, got {}", temperature),
                    ));
                }
            }
            if file.max_tokens == Some(0) {
                return Err(ChatError::invalid_config(
                    format!("providers.{}.max_tokens", section),
                    "must be greater than zero",
                ));
            }
            if file.timeout_secs == Some(0) {
                return Err(ChatError::invalid_config(
                    format!("providers.{}.timeout_secs", section),
                    "must be greater than zero",
                ));
            }
            if let Some(ref url) = file.base_url {
                url::Url::parse(url).map_err(|e| {
                    ChatError::invalid_config(format!("providers.{}.base_url", section), e.to_string())
                })?;
            }
        }
        Ok(())
    }
}

/// Returns the model used when the file does not name one.
#[must_use]
pub fn default_model(selector: ProviderSelector) -> &'static str {
    match selector {
        ProviderSelector::OpenAI => DEFAULT_OPENAI_MODEL,
        ProviderSelector::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        ProviderSelector::Offline => OFFLINE_MODEL,
    }
}

/// Credential lookup backed by environment variables.
///
/// Each provider's namespace maps to an environment variable. Without an
/// explicit mapping, `OPENAI_API_KEY` and `ANTHROPIC_API_KEY` are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvCredentials {
    openai_env: Option<String>,
    anthropic_env: Option<String>,
}

impl EnvCredentials {
    /// Creates a lookup using the standard variable names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the variable for a provider. Ignored for `Offline`.
    #[must_use]
    pub fn with_env_var(mut self, selector: ProviderSelector, env_var: impl Into<String>) -> Self {
        match selector {
            ProviderSelector::OpenAI => self.openai_env = Some(env_var.into()),
            ProviderSelector::Anthropic => self.anthropic_env = Some(env_var.into()),
            ProviderSelector::Offline => {}
        }
        self
    }

    /// Returns the environment variable consulted for a credential key.
    #[must_use]
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        if Some(key) == ProviderSelector::OpenAI.credential_key() {
            Some(self.openai_env.as_deref().unwrap_or("OPENAI_API_KEY"))
        } else if Some(key) == ProviderSelector::Anthropic.credential_key() {
            Some(self.anthropic_env.as_deref().unwrap_or("ANTHROPIC_API_KEY"))
        } else {
            None
        }
    }
}

impl CredentialLookup for EnvCredentials {
    fn lookup(&self, key: &str) -> Option<String> {
        let env_var = self.env_var_for(key)?;
        std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_defaults() {
        let config = ChatlineConfig::default();

        assert_eq!(config.effective_default(), ProviderSelector::OpenAI);
        assert_eq!(
            config.generation_parameters(ProviderSelector::OpenAI).model,
            DEFAULT_OPENAI_MODEL
        );
        assert_eq!(config.session_config(), SessionConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn provider_config_applies_overrides() {
        let config = ChatlineConfig::new().with_provider(
            ProviderSelector::Anthropic,
            ProviderFileConfig::new()
                .with_base_url("http://127.0.0.1:8080")
                .with_timeout_secs(5),
        );

        let endpoint = config.provider_config(ProviderSelector::Anthropic).unwrap();

        assert_eq!(endpoint.messages_endpoint(), "http://127.0.0.1:8080/v1/messages");
        assert_eq!(endpoint.timeout, Duration::from_secs(5));
        assert_eq!(endpoint.api_version, "2023-06-01");
        assert!(config.provider_config(ProviderSelector::Offline).is_none());
    }

    #[test]
    fn generation_parameters_merge_provider_and_session() {
        let mut config = ChatlineConfig::new().with_provider(
            ProviderSelector::OpenAI,
            ProviderFileConfig {
                model: Some("gpt-4o".to_string()),
                temperature: Some(0.2),
                max_tokens: Some(100),
                ..ProviderFileConfig::default()
            },
        );
        config.session.system_prompt = Some("Be kind.".to_string());

        let params = config.generation_parameters(ProviderSelector::OpenAI);

        assert_eq!(params.model, "gpt-4o");
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.max_tokens, 100);
        assert_eq!(params.system_prompt.as_deref(), Some("Be kind."));

        let anthropic = config.generation_parameters(ProviderSelector::Anthropic);
        assert_eq!(anthropic.model, DEFAULT_ANTHROPIC_MODEL);
    }

    #[test]
    fn session_config_from_millis() {
        let mut config = ChatlineConfig::new();
        config.session.thinking_delay_ms = Some(350);
        config.session.chunk_pacing_ms = Some(20);

        let session = config.session_config();

        assert_eq!(session.thinking_delay, Duration::from_millis(350));
        assert_eq!(session.chunk_pacing, Duration::from_millis(20));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let config = ChatlineConfig::new().with_provider(
            ProviderSelector::OpenAI,
            ProviderFileConfig {
                temperature: Some(3.5),
                ..ProviderFileConfig::default()
            },
        );
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("providers.openai.temperature"));

        let config = ChatlineConfig::new().with_provider(
            ProviderSelector::Anthropic,
            ProviderFileConfig::new().with_base_url("not a url"),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_credentials_use_standard_names() {
        let credentials = EnvCredentials::new();

        assert_eq!(credentials.env_var_for("openai.api.key"), Some("OPENAI_API_KEY"));
        assert_eq!(
            credentials.env_var_for("anthropic.api.key"),
            Some("ANTHROPIC_API_KEY")
        );
        assert_eq!(credentials.env_var_for("other.key"), None);
        assert_eq!(credentials.lookup("other.key"), None);
    }

    #[test]
    fn env_credentials_follow_config() {
        let config = ChatlineConfig::new().with_provider(
            ProviderSelector::OpenAI,
            ProviderFileConfig::new().with_api_key_env("CHATLINE_TEST_UNSET_KEY_VAR"),
        );

        let credentials = config.credentials();

        assert_eq!(
            credentials.env_var_for("openai.api.key"),
            Some("CHATLINE_TEST_UNSET_KEY_VAR")
        );
        assert_eq!(credentials.lookup("openai.api.key"), None);
    }

    #[test]
    fn serialization_roundtrip() {
        let config = ChatlineConfig::new()
            .with_default_provider(ProviderSelector::Offline)
            .with_provider(
                ProviderSelector::OpenAI,
                ProviderFileConfig::new().with_model("gpt-4o"),
            );

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ChatlineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized, config);
    }
}
