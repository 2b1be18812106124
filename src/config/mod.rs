//! Configuration management for chatline.
//!
//! This module loads the optional TOML configuration file and converts it
//! into the core's runtime types. The core itself never reads files; only
//! the binary (or an embedding application) calls into this module.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format. The search order is:
//! 1. `./chatline.toml` (project-local)
//! 2. `~/.config/chatline/config.toml` (XDG config)
//!
//! # Example Configuration
//!
//! ```toml
//! default_provider = "openai"          # openai | anthropic | offline
//!
//! [providers.openai]
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! temperature = 0.7
//! max_tokens = 1024
//!
//! [providers.anthropic]
//! model = "claude-sonnet-4-20250514"
//! timeout_secs = 120
//!
//! [session]
//! thinking_delay_ms = 350
//! chunk_pacing_ms = 0
//! system_prompt = "You are helpful."
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};

pub use types::{
    default_model, ChatlineConfig, EnvCredentials, ProviderFileConfig, ProvidersFileConfig,
    SessionFileConfig, DEFAULT_ANTHROPIC_MODEL, DEFAULT_OPENAI_MODEL, OFFLINE_MODEL,
};
