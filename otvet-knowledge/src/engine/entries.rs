use chrono::Utc;
use tracing::{info, warn};

use crate::codec;
use crate::embeddings::embed_checked;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::{EntryFields, KnowledgeEntry};
use crate::storage;

use super::KnowledgeEngine;

fn validate(category: &str, topic: &str, content: &str) -> KnowledgeResult<EntryFields> {
    EntryFields::new(category, topic, content).map_err(KnowledgeError::Validation)
}

pub(crate) async fn add(
    engine: &KnowledgeEngine,
    category: &str,
    topic: &str,
    content: &str,
) -> KnowledgeResult<i64> {
    let fields = validate(category, topic, content)?;
    let vector = embed_checked(engine.embedder(), &fields.content).await?;
    let blob = codec::encode(&vector);

    let id = storage::insert_entry(engine.pool(), &fields, &blob, Utc::now().naive_utc()).await?;
    info!(id, category = %fields.category, topic = %fields.topic, "knowledge entry added");
    Ok(id)
}

pub(crate) async fn update(
    engine: &KnowledgeEngine,
    id: i64,
    category: &str,
    topic: &str,
    content: &str,
) -> KnowledgeResult<bool> {
    let fields = validate(category, topic, content)?;
    if !storage::entry_exists(engine.pool(), id).await? {
        return Ok(false);
    }

    let vector = embed_checked(engine.embedder(), &fields.content).await?;
    let blob = codec::encode(&vector);

    // A concurrent delete between the check and the write still reports false.
    let updated = storage::update_entry(engine.pool(), id, &fields, &blob).await?;
    if updated {
        info!(id, category = %fields.category, topic = %fields.topic, "knowledge entry updated");
    }
    Ok(updated)
}

pub(crate) async fn get(
    engine: &KnowledgeEngine,
    id: i64,
) -> KnowledgeResult<Option<KnowledgeEntry>> {
    let Some(row) = storage::fetch_row(engine.pool(), id).await? else {
        return Ok(None);
    };

    let embedding = match row.embedding.as_deref().map(codec::decode) {
        Some(Ok(vector)) => Some(vector),
        Some(Err(err)) => {
            warn!(id, error = %err, "stored embedding is unreadable");
            None
        }
        None => None,
    };
    Ok(Some(row.into_entry(embedding)))
}

pub(crate) async fn search(
    engine: &KnowledgeEngine,
    needle: &str,
) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    // SQLite LIKE only folds ASCII, so matching happens here to cover Cyrillic text.
    let needle = needle.trim().to_lowercase();
    let entries = storage::list_entries(engine.pool(), None).await?;
    if needle.is_empty() {
        return Ok(entries);
    }

    Ok(entries
        .into_iter()
        .filter(|entry| {
            entry.topic.to_lowercase().contains(&needle)
                || entry.content.to_lowercase().contains(&needle)
        })
        .collect())
}
