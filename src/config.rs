//! Configuration types for the companion pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::completion::HistoryRolePolicy;

/// Top-level configuration for a companion session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Chat completion provider settings and token accounting.
    pub chat: ChatConfig,
    /// Optional reply translation settings.
    pub translation: TranslationConfig,
    /// Session loop settings.
    pub session: SessionConfig,
    /// Conversation store settings.
    pub store: StoreConfig,
}

impl CompanionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::CompanionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CompanionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Chat completion configuration.
///
/// The token fields reproduce the provider contract the pipeline was built
/// against: a 4096-token context with 1000 tokens reserved for the generated
/// reply, 100 for the persona's system instruction, and a 10% margin kept
/// free for the current user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model identifier sent with each request.
    pub model: String,
    /// Base URL of the OpenAI-compatible API (no trailing `/v1`).
    pub base_url: String,
    /// Bearer token. `None` means the caller wires credentials itself.
    pub api_key: Option<String>,
    /// Provider's maximum context size in tokens.
    pub max_context_tokens: u32,
    /// Tokens set aside for the generated completion (sent as `max_tokens`).
    pub reply_reserve_tokens: u32,
    /// Fixed allowance for the persona's system instruction.
    pub system_prompt_reserve_tokens: u32,
    /// Fraction of the send budget kept as headroom for the user message.
    pub user_margin_fraction: f32,
    /// Sampling temperature.
    pub temperature: f32,
    /// How persisted history origins map onto outgoing chat roles.
    pub history_roles: HistoryRolePolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_owned(),
            base_url: "https://api.openai.com".to_owned(),
            api_key: None,
            max_context_tokens: 4096,
            reply_reserve_tokens: 1000,
            system_prompt_reserve_tokens: 100,
            user_margin_fraction: 0.1,
            temperature: 1.0,
            history_roles: HistoryRolePolicy::default(),
        }
    }
}

/// Reply translation configuration.
///
/// Disabled by default; when disabled the reply is spoken untranslated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Whether a translation client should be wired into the session.
    pub enabled: bool,
    /// Base URL of the translation endpoint.
    pub base_url: String,
    /// Optional API key passed in the request body.
    pub api_key: Option<String>,
    /// Source language code (`"auto"` lets the provider detect).
    pub source_lang: String,
    /// Target language code — the language the speech engine speaks.
    pub target_lang: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            api_key: None,
            source_lang: "auto".to_owned(),
            target_lang: "ja".to_owned(),
        }
    }
}

/// Session loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Channel loaded when the loop starts.
    pub default_channel: String,
    /// Default system instruction; a channel switch may override it.
    pub system_prompt: String,
    /// Capacity of the broadcast event stream.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_channel: "default".to_owned(),
            system_prompt: String::new(),
            event_capacity: 64,
        }
    }
}

/// Conversation store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum number of messages loaded into the window per channel.
    pub window_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("seren.db"),
            window_limit: 200,
        }
    }
}
