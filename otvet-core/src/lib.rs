pub mod blacklist;
pub mod config;
pub mod message;

pub use blacklist::{Blacklist, BlacklistError};
pub use config::{
    AdminSettings, CompletionSettings, Config, ConfigError, KnowledgeSettings, ProcessSettings,
    ResponderSettings, Secrets, SecretsError, SeedEntry, Settings, SettingsError,
    TelegramSettings, load_dotenv,
};
pub use message::{ChatRole, ChatTurn, UnknownRole};
