//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/otvet/config.toml).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::knowledge::KnowledgeSettings;

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# otvet configuration file
# Located at: ~/.config/otvet/config.toml
#
# This file contains non-sensitive configuration.
# Secrets are loaded from environment variables:
#   - OTVET_ADMIN_BOT_TOKEN
#   - OTVET_RESPONDER_BOT_TOKEN
#   - the variable named by completion.api_key_env (OPENROUTER_API_KEY by default)

[completion]
base_url = "https://openrouter.ai/api/v1"
model = "openai/gpt-4o-mini"
api_key_env = "OPENROUTER_API_KEY"
max_tokens = 500
timeout_seconds = 120
# system_prompt = "You are a friendly assistant ..."
# unavailable_reply = "Sorry, I can't answer right now. Please try again later!"
# error_reply = "Something went wrong while processing your message. Please try again!"

[knowledge]
embedding_url = "http://127.0.0.1:11434"
embedding_model = "nomic-embed-text"
# embedding_dim = 768
context_items = 5
# knowledge_db_path_override = "/var/lib/otvet/knowledge.sqlite3"

# Inserted once when the knowledge base is empty:
# [[knowledge.seed]]
# category = "General"
# topic = "Opening hours"
# content = "We are open from 9:00 to 18:00, Monday to Friday."

[telegram]
api_base = "https://api.telegram.org"
poll_timeout_seconds = 30

[responder]
enabled = true
history_turns = 6
blacklist = []

[admin]
enabled = true
admin_ids = []

[process]
# host = "203.0.113.10"
port = 22
# username = "deploy"
# identity_file = "/home/deploy/.ssh/id_ed25519"
session = "otvet"
command = "otvet-gateway"
working_dir = "~"
timeout_seconds = 15

[storage]
# data_dir = "/var/lib/otvet"
# transcript_db_path = "/var/lib/otvet/otvet.sqlite3"
#
# A legacy single-file database (knowledge and conversation_history tables in
# one file) is adopted in place: point transcript_db_path and
# knowledge.knowledge_db_path_override at the same file.

[logging]
level = "info"
"#;

/// Settings loaded from TOML configuration file.
///
/// These are non-sensitive configuration values that can be safely
/// stored in files and version controlled (excluding secrets).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Language model used for replies
    #[serde(default)]
    pub completion: CompletionSettings,

    /// Knowledge base and embedding configuration
    #[serde(default)]
    pub knowledge: KnowledgeSettings,

    /// Telegram Bot API transport
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Auto-responder behaviour
    #[serde(default)]
    pub responder: ResponderSettings,

    /// Admin bot configuration
    #[serde(default)]
    pub admin: AdminSettings,

    /// Remote responder process supervision
    #[serde(default)]
    pub process: ProcessSettings,

    /// Database locations
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// OpenAI-compatible completion endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionSettings {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Env var holding the API key. Empty disables the Authorization header.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_completion_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Sent when the model returns no content
    #[serde(default = "default_unavailable_reply")]
    pub unavailable_reply: String,

    /// Sent when the completion call fails
    #[serde(default = "default_error_reply")]
    pub error_reply: String,
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramSettings {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

/// Auto-responder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponderSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of prior transcript turns sent with each question
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Usernames (without @) that never get a reply
    #[serde(default)]
    pub blacklist: Vec<String>,
}

/// Admin bot settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Telegram user ids allowed to use the admin bot
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

/// SSH + tmux supervision of the responder process
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessSettings {
    /// Remote host. Restart commands are disabled when unset.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// tmux session running the responder
    #[serde(default = "default_session")]
    pub session: String,

    #[serde(default = "default_process_command")]
    pub command: String,

    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    #[serde(default = "default_process_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Database locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Root for all databases (overrides `OTVET_DATA_DIR` / XDG)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Explicit path for the conversation transcript database
    #[serde(default)]
    pub transcript_db_path: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace), used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_completion_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_completion_timeout_seconds() -> u64 {
    120
}

fn default_system_prompt() -> String {
    "You are a friendly assistant answering people's direct messages in Telegram. \
     Keep replies short (under 500 characters), helpful and natural, as if talking to a friend. \
     Use the knowledge base to give accurate information."
        .to_string()
}

fn default_unavailable_reply() -> String {
    "Sorry, I can't answer right now. Please try again later!".to_string()
}

fn default_error_reply() -> String {
    "Something went wrong while processing your message. Please try again!".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

fn default_history_turns() -> usize {
    6
}

fn default_ssh_port() -> u16 {
    22
}

fn default_session() -> String {
    "otvet".to_string()
}

fn default_process_command() -> String {
    "otvet-gateway".to_string()
}

fn default_working_dir() -> String {
    "~".to_string()
}

fn default_process_timeout_seconds() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_completion_timeout_seconds(),
            system_prompt: default_system_prompt(),
            unavailable_reply: default_unavailable_reply(),
            error_reply: default_error_reply(),
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_seconds: default_poll_timeout_seconds(),
        }
    }
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            history_turns: default_history_turns(),
            blacklist: Vec::new(),
        }
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_ids: Vec::new(),
        }
    }
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: default_ssh_port(),
            username: None,
            identity_file: None,
            session: default_session(),
            command: default_process_command(),
            working_dir: default_working_dir(),
            timeout_seconds: default_process_timeout_seconds(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Data directory not found")]
    DataDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    /// The file is located at `~/.config/otvet/config.toml`.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/otvet/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("OTVET_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("otvet");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Save settings to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Root directory for databases.
    ///
    /// `[storage] data_dir` wins, then `OTVET_DATA_DIR`, then `~/.local/share/otvet`.
    pub fn data_dir(&self) -> Result<PathBuf, SettingsError> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        if let Ok(dir) = std::env::var("OTVET_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        dirs::data_dir()
            .map(|dir| dir.join("otvet"))
            .ok_or(SettingsError::DataDirNotFound)
    }

    /// Path of the conversation transcript database.
    pub fn transcript_db_path(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.storage.transcript_db_path {
            return Ok(path.clone());
        }
        Ok(self.data_dir()?.join("otvet.sqlite3"))
    }

    /// Knowledge settings with `[storage] data_dir` applied as the data root
    /// when the knowledge section doesn't set its own.
    pub fn resolved_knowledge(&self) -> KnowledgeSettings {
        let mut knowledge = self.knowledge.clone();
        if knowledge.data_root_override.is_none() {
            knowledge.data_root_override = self.storage.data_dir.clone();
        }
        knowledge
    }
}
