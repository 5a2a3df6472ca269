use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A stored piece of knowledge.
///
/// `embedding` is populated by `get_knowledge_by_id` only; listings and
/// lexical search leave it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub category: String,
    pub topic: String,
    pub content: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: NaiveDateTime,
}

/// Entry returned by semantic search, with its cosine score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: KnowledgeEntry,
    pub score: f64,
}

/// Entry count for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Work done by one migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// The `embedding` column was missing and has been added.
    pub added_embedding_column: bool,
    /// Stored vectors dropped because codec or model changed, or the blob
    /// no longer decodes.
    pub invalidated: u64,
    /// Entries embedded by the backfill.
    pub embedded: u64,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        !self.added_embedding_column && self.invalidated == 0 && self.embedded == 0
    }
}

/// Validated text fields for add/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryFields {
    pub category: String,
    pub topic: String,
    pub content: String,
}

impl EntryFields {
    /// Trims every field and rejects blanks.
    pub fn new(category: &str, topic: &str, content: &str) -> Result<Self, &'static str> {
        let category = category.trim();
        let topic = topic.trim();
        let content = content.trim();
        if category.is_empty() {
            return Err("category");
        }
        if topic.is_empty() {
            return Err("topic");
        }
        if content.is_empty() {
            return Err("content");
        }
        Ok(Self {
            category: category.to_string(),
            topic: topic.to_string(),
            content: content.to_string(),
        })
    }
}
