use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::KnowledgeSettings;
use crate::context;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::errors::KnowledgeResult;
use crate::migration;
use crate::models::{CategoryCount, KnowledgeEntry, MigrationReport, ScoredEntry};
use crate::paths::knowledge_db_path;
use crate::seed;
use crate::storage::{self, KnowledgeStore};

pub(crate) mod entries;

/// Owner of the knowledge corpus.
///
/// Every write that touches `content` re-embeds it before returning, so a
/// stored entry's vector always matches its current text.
#[derive(Clone)]
pub struct KnowledgeEngine {
    settings: KnowledgeSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    store: KnowledgeStore,
    startup: MigrationReport,
}

impl std::fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("settings", &self.settings)
            .field("embedding_model", &self.embedder.model_id())
            .field("store", &self.store)
            .finish()
    }
}

impl KnowledgeEngine {
    /// Open a persistent KnowledgeEngine backed by the Ollama embedding client.
    pub async fn open(settings: KnowledgeSettings) -> KnowledgeResult<Self> {
        let embedder = Arc::new(EmbeddingClient::new(&settings)?);
        Self::open_with_embedder(settings, embedder).await
    }

    /// Open with a caller-supplied embedding provider.
    ///
    /// The migration pass and seeding finish before this returns; the engine
    /// is never handed out with a partially embedded corpus.
    pub async fn open_with_embedder(
        settings: KnowledgeSettings,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> KnowledgeResult<Self> {
        let path = knowledge_db_path(&settings)?;
        info!(
            path = %path.display(),
            model = embedder.model_id(),
            "opening knowledge base"
        );
        let store = KnowledgeStore::open(&path).await?;
        let startup = migration::run(store.pool(), embedder.as_ref()).await?;

        let engine = Self {
            settings,
            embedder,
            store,
            startup,
        };
        seed::seed_if_empty(&engine).await?;
        Ok(engine)
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    /// Access the knowledge settings.
    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    /// What the startup migration did.
    pub fn startup_report(&self) -> MigrationReport {
        self.startup
    }

    pub(crate) fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Re-run the migration pass. Returns a no-op report when nothing is pending.
    pub async fn run_migration(&self) -> KnowledgeResult<MigrationReport> {
        migration::run(self.pool(), self.embedder()).await
    }

    pub async fn add_knowledge(
        &self,
        category: &str,
        topic: &str,
        content: &str,
    ) -> KnowledgeResult<i64> {
        entries::add(self, category, topic, content).await
    }

    /// Full replace of category, topic and content. `false` when `id` is unknown.
    pub async fn update_knowledge(
        &self,
        id: i64,
        category: &str,
        topic: &str,
        content: &str,
    ) -> KnowledgeResult<bool> {
        entries::update(self, id, category, topic, content).await
    }

    pub async fn delete_knowledge(&self, id: i64) -> KnowledgeResult<bool> {
        storage::delete_entry(self.pool(), id).await
    }

    pub async fn get_knowledge_by_id(&self, id: i64) -> KnowledgeResult<Option<KnowledgeEntry>> {
        entries::get(self, id).await
    }

    /// Like [`Self::get_knowledge_by_id`] but `embedding` is always `None`.
    pub async fn get_knowledge_fields(&self, id: i64) -> KnowledgeResult<Option<KnowledgeEntry>> {
        storage::fetch_entry(self.pool(), id).await
    }

    /// All entries, newest first, without vectors.
    pub async fn list_all_knowledge(&self) -> KnowledgeResult<Vec<KnowledgeEntry>> {
        storage::list_entries(self.pool(), None).await
    }

    /// Case-insensitive substring match on topic or content, newest first.
    pub async fn search_knowledge(&self, needle: &str) -> KnowledgeResult<Vec<KnowledgeEntry>> {
        entries::search(self, needle).await
    }

    /// Top `k` entries by cosine similarity to `query`.
    pub async fn semantic_search(
        &self,
        query: &str,
        k: usize,
    ) -> KnowledgeResult<Vec<ScoredEntry>> {
        context::semantic_search(self.pool(), self.embedder(), query, k).await
    }

    /// Grounding block for the completion prompt.
    ///
    /// With a query the corpus is ranked semantically; without one the
    /// `max_items` most recent entries are used. Empty corpus gives `""`.
    pub async fn context_for_query(
        &self,
        query: Option<&str>,
        max_items: usize,
    ) -> KnowledgeResult<String> {
        context::build_context(self.pool(), self.embedder(), query, max_items).await
    }

    pub async fn category_counts(&self) -> KnowledgeResult<Vec<CategoryCount>> {
        storage::category_counts(self.pool()).await
    }

    pub async fn count_knowledge(&self) -> KnowledgeResult<i64> {
        storage::count_entries(self.pool()).await
    }
}
