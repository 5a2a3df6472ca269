//! Secrets configuration loaded from environment variables only.
//!
//! This module handles sensitive configuration like bot tokens that should
//! never be stored in files. All secrets are read from environment variables.

use std::env;

/// Secrets loaded exclusively from environment variables.
///
/// These are sensitive values that should never be written to disk
/// or committed to version control.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Admin bot token (env: OTVET_ADMIN_BOT_TOKEN)
    pub admin_bot_token: Option<String>,

    /// Responder bot token (env: OTVET_RESPONDER_BOT_TOKEN)
    pub responder_bot_token: Option<String>,

    /// Completion API key, read from the env var named in settings
    pub completion_api_key: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("No bot token configured. Set OTVET_ADMIN_BOT_TOKEN or OTVET_RESPONDER_BOT_TOKEN")]
    NoBotConfigured,
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// `api_key_env` names the variable holding the completion API key;
    /// an empty name means the endpoint needs no key.
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    pub fn from_env(api_key_env: &str) -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();

        Self::from_env_inner(api_key_env)
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner(api_key_env: &str) -> Result<Self, SecretsError> {
        let secrets = Self {
            admin_bot_token: non_empty_var("OTVET_ADMIN_BOT_TOKEN"),
            responder_bot_token: non_empty_var("OTVET_RESPONDER_BOT_TOKEN"),
            completion_api_key: if api_key_env.is_empty() {
                None
            } else {
                non_empty_var(api_key_env)
            },
        };

        if secrets.admin_bot_token.is_none() && secrets.responder_bot_token.is_none() {
            return Err(SecretsError::NoBotConfigured);
        }

        if !api_key_env.is_empty() && secrets.completion_api_key.is_none() {
            return Err(SecretsError::MissingSecret(api_key_env.to_string()));
        }

        Ok(secrets)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
