use tracing::info;

use crate::engine::KnowledgeEngine;
use crate::errors::KnowledgeResult;
use crate::storage;

/// Insert `[[knowledge.seed]]` entries into an empty corpus.
///
/// A corpus with at least one entry is left untouched, so deleting every
/// seeded entry and restarting brings them back but editing them does not.
pub(crate) async fn seed_if_empty(engine: &KnowledgeEngine) -> KnowledgeResult<usize> {
    let seeds = &engine.settings().seed;
    if seeds.is_empty() || storage::count_entries(engine.pool()).await? > 0 {
        return Ok(0);
    }

    for seed in seeds {
        engine
            .add_knowledge(&seed.category, &seed.topic, &seed.content)
            .await?;
    }

    info!(count = seeds.len(), "seeded empty knowledge base");
    Ok(seeds.len())
}
