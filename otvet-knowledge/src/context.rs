//! Grounding context for the completion prompt.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::codec;
use crate::embeddings::{EmbeddingProvider, embed_checked};
use crate::errors::KnowledgeResult;
use crate::index;
use crate::models::{KnowledgeEntry, ScoredEntry};
use crate::storage;

pub const CONTEXT_HEADER: &str = "Knowledge base:";

/// Render entries as the block appended to the system prompt.
///
/// An empty slice renders as `""`, which callers read as "no grounding".
pub fn render_context<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a KnowledgeEntry>,
{
    let blocks: Vec<String> = entries
        .into_iter()
        .map(|entry| format!("\n[{} - {}]: {}", entry.category, entry.topic, entry.content))
        .collect();

    if blocks.is_empty() {
        return String::new();
    }

    let mut parts = Vec::with_capacity(blocks.len() + 1);
    parts.push(CONTEXT_HEADER.to_string());
    parts.extend(blocks);
    parts.join("\n")
}

pub(crate) async fn build_context(
    pool: &SqlitePool,
    embedder: &dyn EmbeddingProvider,
    query: Option<&str>,
    max_items: usize,
) -> KnowledgeResult<String> {
    if max_items == 0 {
        return Ok(String::new());
    }

    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => {
            let ranked = semantic_search(pool, embedder, query, max_items).await?;
            Ok(render_context(ranked.iter().map(|scored| &scored.entry)))
        }
        None => {
            let recent = storage::list_entries(pool, Some(max_items)).await?;
            Ok(render_context(&recent))
        }
    }
}

/// Embed `query` and rank the whole corpus against it.
///
/// Rows whose stored blob can't be decoded are skipped for this query.
pub(crate) async fn semantic_search(
    pool: &SqlitePool,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> KnowledgeResult<Vec<ScoredEntry>> {
    let corpus = storage::load_corpus(pool).await?;
    if corpus.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embed_checked(embedder, query).await?;

    let decoded: Vec<Option<Vec<f32>>> = corpus
        .iter()
        .map(|row| {
            let blob = row.embedding.as_deref()?;
            match codec::decode(blob) {
                Ok(vector) => Some(vector),
                Err(err) => {
                    warn!(id = row.id, error = %err, "skipping entry with unreadable embedding");
                    None
                }
            }
        })
        .collect();

    let ranked = index::rank(
        &query_vector,
        corpus
            .iter()
            .zip(&decoded)
            .map(|(row, vector)| (row.id, vector.as_deref())),
        k,
    );

    let mut rows: HashMap<i64, storage::CorpusRow> =
        corpus.into_iter().map(|row| (row.id, row)).collect();

    let results: Vec<ScoredEntry> = ranked
        .into_iter()
        .filter_map(|hit| {
            let row = rows.remove(&hit.id)?;
            Some(ScoredEntry {
                entry: row.into_entry(None),
                score: hit.score,
            })
        })
        .collect();

    for scored in &results {
        debug!(
            score = scored.score,
            category = %scored.entry.category,
            topic = %scored.entry.topic,
            "semantic match"
        );
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(id: i64, category: &str, topic: &str, content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            category: category.to_string(),
            topic: topic.to_string(),
            content: content.to_string(),
            embedding: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_render_empty_is_empty_string() {
        assert_eq!(render_context(&Vec::<KnowledgeEntry>::new()), "");
    }

    #[test]
    fn test_render_layout() {
        let entries = vec![
            entry(1, "Pets", "Cats", "A cat sat"),
            entry(2, "Pets", "Dogs", "A dog ran"),
        ];

        insta::assert_snapshot!(render_context(&entries), @r"
        Knowledge base:

        [Pets - Cats]: A cat sat

        [Pets - Dogs]: A dog ran
        ");
    }
}
