//! Configuration file loading.
//!
//! This module handles loading chatline configuration from TOML files
//! at XDG-compliant locations.

use crate::config::types::ChatlineConfig;
use crate::error::ChatError;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "chatline.toml";

/// Default configuration file name within XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "chatline";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./chatline.toml` (project-local)
/// 2. `~/.config/chatline/config.toml` (XDG config)
///
/// Returns an empty configuration if no config file is found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be parsed or
/// fails validation.
pub fn load() -> Result<ChatlineConfig, ChatError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "Loading configuration");
            return from_path(&path);
        }
    }

    Ok(ChatlineConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - A value fails validation
pub fn from_path(path: &Path) -> Result<ChatlineConfig, ChatError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ChatError::invalid_config(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    from_str(&contents).map_err(|e| {
        ChatError::invalid_config(
            "config_file",
            format!("failed to parse '{}': {}", path.display(), e),
        )
    })
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid, doesn't match the schema, or
/// a value fails validation.
///
/// # Example
///
/// ```rust
/// use chatline::config::from_str;
/// use chatline::llm::ProviderSelector;
///
/// let config = from_str(r#"
/// default_provider = "anthropic"
///
/// [providers.anthropic]
/// model = "claude-3-haiku-20240307"
/// "#).unwrap();
///
/// assert_eq!(config.effective_default(), ProviderSelector::Anthropic);
/// ```
pub fn from_str(toml_str: &str) -> Result<ChatlineConfig, ChatError> {
    let config: ChatlineConfig = toml::from_str(toml_str)
        .map_err(|e| ChatError::invalid_config("config", format!("invalid TOML: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Returns the paths that would be searched for configuration files.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }

    paths
}

/// Returns the path to the XDG config directory for chatline.
///
/// This is `~/.config/chatline` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatErrorKind;
    use crate::llm::ProviderSelector;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn is_invalid_config(error: &ChatError) -> bool {
        matches!(error.kind, ChatErrorKind::InvalidConfig { .. })
    }

    #[test]
    fn from_str_parses_full_file() {
        let toml = r#"
default_provider = "openai"

[providers.openai]
model = "gpt-4o-mini"
api_key_env = "MY_OPENAI_KEY"
base_url = "http://localhost:9999/v1"
timeout_secs = 30
temperature = 0.7
max_tokens = 100

[providers.anthropic]
model = "claude-3-haiku-20240307"

[session]
thinking_delay_ms = 350
chunk_pacing_ms = 0
system_prompt = "You are helpful."
        "#;

        let config = from_str(toml).unwrap();

        assert_eq!(config.default_provider, Some(ProviderSelector::OpenAI));
        let openai = config.provider_config(ProviderSelector::OpenAI).unwrap();
        assert_eq!(
            openai.chat_completions_endpoint(),
            "http://localhost:9999/v1/chat/completions"
        );
        assert_eq!(openai.timeout, Duration::from_secs(30));
        assert_eq!(
            config.credentials().env_var_for("openai.api.key"),
            Some("MY_OPENAI_KEY")
        );
        assert_eq!(
            config.generation_parameters(ProviderSelector::Anthropic).model,
            "claude-3-haiku-20240307"
        );
        assert_eq!(config.session_config().thinking_delay, Duration::from_millis(350));
    }

    #[test]
    fn from_str_accepts_offline_default() {
        let config = from_str(r#"default_provider = "offline""#).unwrap();
        assert_eq!(config.effective_default(), ProviderSelector::Offline);
    }

    #[test]
    fn from_str_error_on_unknown_provider() {
        let error = from_str(r#"default_provider = "gemini""#).unwrap_err();
        assert!(is_invalid_config(&error));
    }

    #[test]
    fn from_str_error_on_invalid_toml() {
        let error = from_str("this is not valid toml [[[").unwrap_err();
        assert!(is_invalid_config(&error));
    }

    #[test]
    fn from_str_runs_validation() {
        let error = from_str(
            r#"
[providers.anthropic]
max_tokens = 0
            "#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("providers.anthropic.max_tokens"));
    }

    #[test]
    fn from_path_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("chatline.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            [providers.openai]
            model = "gpt-4-turbo"
        "#
        )
        .unwrap();

        let config = from_path(&config_path).unwrap();

        assert_eq!(
            config.generation_parameters(ProviderSelector::OpenAI).model,
            "gpt-4-turbo"
        );
    }

    #[test]
    fn from_path_error_on_missing_file() {
        let error = from_path(Path::new("/nonexistent/path/config.toml")).unwrap_err();
        assert!(is_invalid_config(&error));
        assert!(error.to_string().contains("failed to read"));
    }

    #[test]
    fn search_paths_starts_with_local() {
        let paths = search_paths();

        assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG_NAME));
    }

    #[test]
    fn xdg_config_dir_returns_path() {
        if let Some(dir) = xdg_config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
