//! Test helpers for the transcript database.

use crate::{error::DbResult, otvet_db::OtvetDbPool, sqlite_runtime::create_in_memory_pool};

/// Create an in-memory, migrated transcript database for testing
pub async fn create_test_pool() -> DbResult<OtvetDbPool> {
    let pool = create_in_memory_pool(1).await?;
    OtvetDbPool::run_migrations(&pool).await?;
    Ok(OtvetDbPool::from_pool(pool))
}
