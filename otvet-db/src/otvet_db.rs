//! Transcript database connection pool and initialization.

use std::path::Path;

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    sqlite_runtime::create_file_pool,
};

/// Transcript database pool wrapper
#[derive(Debug, Clone)]
pub struct OtvetDbPool {
    pool: SqlitePool,
}

impl OtvetDbPool {
    /// Open (or create) the database at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> DbResult<Self> {
        info!("Initializing transcript database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = create_file_pool(db_path, 5).await?;

        Self::run_migrations(&pool).await?;

        info!("Transcript database initialized");
        Ok(Self { pool })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        // A legacy single-file deployment also carries the knowledge migrations.
        let mut migrator = sqlx::migrate!("./migrations/otvet");
        migrator.set_ignore_missing(true);
        migrator
            .run(pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Wrap an existing SqlitePool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
