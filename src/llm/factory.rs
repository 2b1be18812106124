//! Provider selection and construction.

use crate::error::ChatError;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::client::ChatProvider;
use crate::llm::config::ProviderConfig;
use crate::llm::offline::OfflineClient;
use crate::llm::openai::OpenAIClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which provider a conversation talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelector {
    /// OpenAI-style chat completions
    #[default]
    OpenAI,
    /// Anthropic-style messages
    Anthropic,
    /// Canned replies, no network
    Offline,
}

impl ProviderSelector {
    /// All selectors, in display order.
    pub const ALL: [ProviderSelector; 3] = [Self::OpenAI, Self::Anthropic, Self::Offline];

    /// Returns the credential namespace for this provider.
    ///
    /// `None` means the provider needs no credential.
    #[must_use]
    pub fn credential_key(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("openai.api.key"),
            Self::Anthropic => Some("anthropic.api.key"),
            Self::Offline => None,
        }
    }

    /// Returns the human-readable provider name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Offline => "Offline",
        }
    }

    /// Returns the identifier used in configuration files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Offline => "offline",
        }
    }

    /// Returns the production endpoint configuration for this provider.
    ///
    /// The offline provider has no endpoint.
    #[must_use]
    pub fn default_config(&self) -> Option<ProviderConfig> {
        match self {
            Self::OpenAI => Some(ProviderConfig::openai()),
            Self::Anthropic => Some(ProviderConfig::anthropic()),
            Self::Offline => None,
        }
    }
}

impl fmt::Display for ProviderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ProviderSelector {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "offline" => Ok(Self::Offline),
            other => Err(ChatError::invalid_config(
                "provider",
                format!("unknown provider '{}'; expected openai, anthropic or offline", other),
            )),
        }
    }
}

/// Resolves credentials by namespace key.
///
/// Storage is owned by the caller; the factory only reads through this.
pub trait CredentialLookup {
    /// Returns the secret stored under `key`, if any.
    fn lookup(&self, key: &str) -> Option<String>;
}

impl<F> CredentialLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, key: &str) -> Option<String> {
        self(key)
    }
}

impl CredentialLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Builds the provider for `selector` against its production endpoint.
///
/// # Errors
///
/// Returns `MissingCredential` if the lookup yields nothing or an empty
/// string. No network call is made in that case.
///
/// # Example
///
/// ```rust
/// use chatline::llm::{make, ChatProvider, ProviderSelector};
/// use std::collections::HashMap;
///
/// let credentials: HashMap<String, String> = HashMap::new();
/// let error = make(ProviderSelector::OpenAI, &credentials).unwrap_err();
/// assert!(error.is_missing_credential());
///
/// let offline = make(ProviderSelector::Offline, &credentials).unwrap();
/// assert_eq!(offline.name(), "Offline");
/// ```
pub fn make<L>(selector: ProviderSelector, lookup: &L) -> Result<Arc<dyn ChatProvider>, ChatError>
where
    L: CredentialLookup + ?Sized,
{
    match selector.default_config() {
        Some(config) => make_with_config(selector, lookup, config),
        None => Ok(Arc::new(OfflineClient::new())),
    }
}

/// Builds the provider for `selector` with an explicit endpoint configuration.
///
/// The configuration is ignored for the offline provider.
///
/// # Errors
///
/// Returns `MissingCredential` if the lookup yields nothing or an empty
/// string, or a transport error if the HTTP client cannot be created.
pub fn make_with_config<L>(
    selector: ProviderSelector,
    lookup: &L,
    config: ProviderConfig,
) -> Result<Arc<dyn ChatProvider>, ChatError>
where
    L: CredentialLookup + ?Sized,
{
    let Some(key) = selector.credential_key() else {
        return Ok(Arc::new(OfflineClient::new()));
    };

    let api_key = lookup
        .lookup(key)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            tracing::warn!(provider = %selector, "No credential configured");
            ChatError::missing_credential(selector.display_name())
        })?;

    tracing::debug!(provider = %selector, base_url = %config.base_url, "Creating provider client");

    let provider: Arc<dyn ChatProvider> = match selector {
        ProviderSelector::OpenAI => Arc::new(OpenAIClient::new(api_key, config)?),
        ProviderSelector::Anthropic => Arc::new(AnthropicClient::new(api_key, config)?),
        ProviderSelector::Offline => Arc::new(OfflineClient::new()),
    };
    Ok(provider)
}
