use std::path::Path;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::errors::KnowledgeResult;
use crate::models::{CategoryCount, EntryFields, KnowledgeEntry};

pub const META_CODEC: &str = "embedding_codec";
pub const META_MODEL: &str = "embedding_model";

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub async fn open(db_path: &Path) -> KnowledgeResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        // The file may be shared with the transcript tables, whose versions
        // this migrator does not know about.
        let mut migrator = sqlx::migrate!("./migrations/knowledge");
        migrator.set_ignore_missing(true);
        migrator.run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Full row including the raw embedding blob.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CorpusRow {
    pub id: i64,
    pub category: String,
    pub topic: String,
    pub content: String,
    pub embedding: Option<Vec<u8>>,
    pub created_at: NaiveDateTime,
}

impl CorpusRow {
    pub fn into_entry(self, embedding: Option<Vec<f32>>) -> KnowledgeEntry {
        KnowledgeEntry {
            id: self.id,
            category: self.category,
            topic: self.topic,
            content: self.content,
            embedding,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    category: String,
    topic: String,
    content: String,
    created_at: NaiveDateTime,
}

impl From<EntryRow> for KnowledgeEntry {
    fn from(row: EntryRow) -> Self {
        KnowledgeEntry {
            id: row.id,
            category: row.category,
            topic: row.topic,
            content: row.content,
            embedding: None,
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn insert_entry(
    pool: &SqlitePool,
    fields: &EntryFields,
    embedding: &[u8],
    created_at: NaiveDateTime,
) -> KnowledgeResult<i64> {
    let result = sqlx::query(
        "INSERT INTO knowledge (category, topic, content, embedding, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&fields.category)
    .bind(&fields.topic)
    .bind(&fields.content)
    .bind(embedding)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Replace text and vector in one statement. `created_at` is left alone.
pub(crate) async fn update_entry(
    pool: &SqlitePool,
    id: i64,
    fields: &EntryFields,
    embedding: &[u8],
) -> KnowledgeResult<bool> {
    let result = sqlx::query(
        "UPDATE knowledge
         SET category = ?, topic = ?, content = ?, embedding = ?
         WHERE id = ?",
    )
    .bind(&fields.category)
    .bind(&fields.topic)
    .bind(&fields.content)
    .bind(embedding)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_entry(pool: &SqlitePool, id: i64) -> KnowledgeResult<bool> {
    let result = sqlx::query("DELETE FROM knowledge WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn entry_exists(pool: &SqlitePool, id: i64) -> KnowledgeResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM knowledge WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub(crate) async fn fetch_row(pool: &SqlitePool, id: i64) -> KnowledgeResult<Option<CorpusRow>> {
    let row = sqlx::query_as::<_, CorpusRow>(
        "SELECT id, category, topic, content, embedding, created_at
         FROM knowledge
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Text fields only; the blob is neither read nor decoded.
pub(crate) async fn fetch_entry(
    pool: &SqlitePool,
    id: i64,
) -> KnowledgeResult<Option<KnowledgeEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(
        "SELECT id, category, topic, content, created_at
         FROM knowledge
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(KnowledgeEntry::from))
}

/// Newest first, embeddings excluded.
pub(crate) async fn list_entries(
    pool: &SqlitePool,
    limit: Option<usize>,
) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    let rows = sqlx::query_as::<_, EntryRow>(
        "SELECT id, category, topic, content, created_at
         FROM knowledge
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(KnowledgeEntry::from).collect())
}

/// Every row with its blob, in creation (id) order.
pub(crate) async fn load_corpus(pool: &SqlitePool) -> KnowledgeResult<Vec<CorpusRow>> {
    let rows = sqlx::query_as::<_, CorpusRow>(
        "SELECT id, category, topic, content, embedding, created_at
         FROM knowledge
         ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub(crate) async fn count_entries(pool: &SqlitePool) -> KnowledgeResult<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM knowledge")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub(crate) async fn category_counts(pool: &SqlitePool) -> KnowledgeResult<Vec<CategoryCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) AS count
         FROM knowledge
         GROUP BY category
         ORDER BY count DESC, category ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

pub(crate) async fn has_embedding_column(pool: &SqlitePool) -> KnowledgeResult<bool> {
    let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('knowledge')")
        .fetch_all(pool)
        .await?;
    Ok(columns.iter().any(|(name,)| name == "embedding"))
}

pub(crate) async fn add_embedding_column(pool: &SqlitePool) -> KnowledgeResult<()> {
    sqlx::query("ALTER TABLE knowledge ADD COLUMN embedding BLOB")
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn get_meta(pool: &SqlitePool, key: &str) -> KnowledgeResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ? LIMIT 1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(value,)| value))
}

/// Drop every stored vector and record the fingerprint they will be rebuilt with.
///
/// Both happen in one transaction so a crash can't leave old vectors labelled
/// with the new fingerprint.
pub(crate) async fn reset_embeddings(
    pool: &SqlitePool,
    codec: &str,
    model: &str,
) -> KnowledgeResult<u64> {
    let mut tx = pool.begin().await?;

    let cleared = sqlx::query("UPDATE knowledge SET embedding = NULL WHERE embedding IS NOT NULL")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for (key, value) in [(META_CODEC, codec), (META_MODEL, model)] {
        sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(cleared)
}

pub(crate) async fn stored_embeddings(
    pool: &SqlitePool,
) -> KnowledgeResult<Vec<(i64, Vec<u8>)>> {
    let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
        "SELECT id, embedding FROM knowledge WHERE embedding IS NOT NULL ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Null out `blob` for `id`, unless the row was re-embedded meanwhile.
pub(crate) async fn clear_embedding(
    pool: &SqlitePool,
    id: i64,
    blob: &[u8],
) -> KnowledgeResult<bool> {
    let result = sqlx::query("UPDATE knowledge SET embedding = NULL WHERE id = ? AND embedding = ?")
        .bind(id)
        .bind(blob)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn missing_embeddings(pool: &SqlitePool) -> KnowledgeResult<Vec<(i64, String)>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, content FROM knowledge WHERE embedding IS NULL ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Store a backfilled vector unless a live write got there first.
pub(crate) async fn fill_embedding(
    pool: &SqlitePool,
    id: i64,
    content: &str,
    embedding: &[u8],
) -> KnowledgeResult<bool> {
    let result = sqlx::query(
        "UPDATE knowledge
         SET embedding = ?
         WHERE id = ? AND content = ? AND embedding IS NULL",
    )
    .bind(embedding)
    .bind(id)
    .bind(content)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
