//! Knowledge engine configuration types.
//!
//! These are read from the `[knowledge]` TOML section and consumed by
//! `otvet-knowledge`. Every field has a default so a partial section works.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Knowledge engine settings (all values filled with defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// Ollama-compatible embedding endpoint base URL.
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Expected vector dimension. When set, provider replies of another size are rejected.
    #[serde(default)]
    pub embedding_dim: Option<usize>,
    #[serde(default = "default_embedding_timeout_seconds")]
    pub embedding_timeout_seconds: u64,
    /// Number of entries injected into the prompt per question.
    #[serde(default = "default_context_items")]
    pub context_items: usize,
    #[serde(default)]
    pub knowledge_db_path_override: Option<PathBuf>,
    /// Override the root data directory for the knowledge database.
    /// When set, paths derive from this root instead of `OTVET_DATA_DIR` / XDG.
    #[serde(default)]
    pub data_root_override: Option<PathBuf>,
    /// Entries inserted on startup when the corpus is empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seed: Vec<SeedEntry>,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            embedding_dim: None,
            embedding_timeout_seconds: default_embedding_timeout_seconds(),
            context_items: default_context_items(),
            knowledge_db_path_override: None,
            data_root_override: None,
            seed: Vec::new(),
        }
    }
}

/// One `[[knowledge.seed]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub category: String,
    pub topic: String,
    pub content: String,
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_timeout_seconds() -> u64 {
    30
}

fn default_context_items() -> usize {
    5
}
