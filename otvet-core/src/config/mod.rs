//! Configuration management for otvet.
//!
//! This module provides a unified configuration system that separates
//! secrets (from environment variables) from settings (from TOML files).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `OTVET_ADMIN_BOT_TOKEN` - admin bot token
//! - `OTVET_RESPONDER_BOT_TOKEN` - responder bot token
//! - `OPENROUTER_API_KEY` - completion API key (name set by `completion.api_key_env`)
//!
//! ## Settings (TOML File)
//! Located at `~/.config/otvet/config.toml`:
//! ```toml
//! [completion]
//! model = "openai/gpt-4o-mini"
//!
//! [knowledge]
//! embedding_model = "nomic-embed-text"
//! context_items = 5
//!
//! [admin]
//! admin_ids = [436816068]
//!
//! [logging]
//! level = "info"
//! ```

pub mod knowledge;
mod secrets;
mod settings;

pub use knowledge::{KnowledgeSettings, SeedEntry};
pub use secrets::{Secrets, SecretsError};
pub use settings::{
    AdminSettings, CompletionSettings, LoggingSettings, ProcessSettings, ResponderSettings,
    Settings, SettingsError, StorageSettings, TelegramSettings,
};

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Combined configuration containing both secrets and settings.
///
/// This is the main configuration type used throughout the application.
/// It separates sensitive secrets (from env) from non-sensitive settings (from TOML).
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Admin bot is enabled but [admin] admin_ids is empty")]
    NoAdminIds,

    #[error("Knowledge context_items must be at least 1")]
    InvalidContextItems,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// This loads:
    /// 1. Settings from TOML file (creating defaults if needed)
    /// 2. Secrets from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No bot token is configured
    /// - The completion API key variable is named but unset
    /// - The admin bot would run without any admin id
    /// - The TOML file cannot be read or parsed
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Settings::load()?;
        let secrets = Secrets::from_env(&settings.completion.api_key_env)?;

        let config = Self { secrets, settings };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_bot_enabled() && self.settings.admin.admin_ids.is_empty() {
            return Err(ConfigError::NoAdminIds);
        }
        if self.settings.knowledge.context_items == 0 {
            return Err(ConfigError::InvalidContextItems);
        }
        Ok(())
    }

    /// Get the admin bot token (if configured).
    pub fn admin_bot_token(&self) -> Option<&str> {
        self.secrets.admin_bot_token.as_deref()
    }

    /// Get the responder bot token (if configured).
    pub fn responder_bot_token(&self) -> Option<&str> {
        self.secrets.responder_bot_token.as_deref()
    }

    /// Get the completion API key (if configured).
    pub fn completion_api_key(&self) -> Option<&str> {
        self.secrets.completion_api_key.as_deref()
    }

    /// Check if the admin bot is enabled and has a token.
    pub fn admin_bot_enabled(&self) -> bool {
        self.settings.admin.enabled && self.secrets.admin_bot_token.is_some()
    }

    /// Check if the responder is enabled and has a token.
    pub fn responder_enabled(&self) -> bool {
        self.settings.responder.enabled && self.secrets.responder_bot_token.is_some()
    }

    /// Check if a user id may use the admin bot.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.settings.admin.admin_ids.contains(&user_id)
    }
}

/// Load .env file if it exists (for development convenience).
///
/// This is called automatically by `Secrets::from_env()` but is also
/// exported so `RUST_LOG` from `.env` applies before logging starts.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
