//! Startup upgrade of the knowledge table.
//!
//! The pass is additive and idempotent:
//! 1. add the `embedding` column to tables created before it existed,
//! 2. drop stored vectors when the codec or embedding model differs from the
//!    recorded fingerprint (legacy blobs have no fingerprint at all),
//! 3. drop single blobs that no longer decode,
//! 4. embed every row that has no vector.
//!
//! Running it again right after a successful pass does no work.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::codec::{self, CODEC_NAME};
use crate::embeddings::{EmbeddingProvider, embed_checked};
use crate::errors::KnowledgeResult;
use crate::models::MigrationReport;
use crate::storage::{self, META_CODEC, META_MODEL};

pub(crate) async fn run(
    pool: &SqlitePool,
    embedder: &dyn EmbeddingProvider,
) -> KnowledgeResult<MigrationReport> {
    let mut report = MigrationReport::default();

    if !storage::has_embedding_column(pool).await? {
        storage::add_embedding_column(pool).await?;
        report.added_embedding_column = true;
        info!("added embedding column to knowledge table");
    }

    let model = embedder.model_id();
    let stored_codec = storage::get_meta(pool, META_CODEC).await?;
    let stored_model = storage::get_meta(pool, META_MODEL).await?;
    if stored_codec.as_deref() != Some(CODEC_NAME) || stored_model.as_deref() != Some(model) {
        report.invalidated = storage::reset_embeddings(pool, CODEC_NAME, model).await?;
        if report.invalidated > 0 {
            warn!(
                invalidated = report.invalidated,
                previous_codec = stored_codec.as_deref().unwrap_or("none"),
                previous_model = stored_model.as_deref().unwrap_or("none"),
                model,
                "embedding fingerprint changed, re-embedding corpus"
            );
        }
    }

    for (id, blob) in storage::stored_embeddings(pool).await? {
        let Err(err) = codec::decode(&blob) else {
            continue;
        };
        if storage::clear_embedding(pool, id, &blob).await? {
            warn!(id, error = %err, "dropping unreadable embedding");
            report.invalidated += 1;
        }
    }

    let missing = storage::missing_embeddings(pool).await?;
    if !missing.is_empty() {
        info!(count = missing.len(), "backfilling knowledge embeddings");
    }
    for (id, content) in missing {
        let vector = embed_checked(embedder, &content).await?;
        if storage::fill_embedding(pool, id, &content, &codec::encode(&vector)).await? {
            report.embedded += 1;
        }
    }

    if !report.is_noop() {
        info!(
            added_column = report.added_embedding_column,
            invalidated = report.invalidated,
            embedded = report.embedded,
            "knowledge migration finished"
        );
    }

    Ok(report)
}
