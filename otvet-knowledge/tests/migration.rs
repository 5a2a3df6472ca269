//! Startup migration: legacy schemas, foreign blobs, model changes, seeding.

mod common;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tempfile::TempDir;

use common::{ConceptEmbedder, db_path, settings_for};
use otvet_knowledge::{KnowledgeEngine, SeedEntry};

async fn legacy_pool(path: &Path) -> SqlitePool {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePool::connect_with(options).await.unwrap()
}

#[tokio::test]
async fn legacy_table_gets_column_and_backfill_once() {
    let temp = TempDir::new().unwrap();
    let pool = legacy_pool(&db_path(&temp)).await;
    sqlx::query(
        "CREATE TABLE knowledge (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            topic TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    for (topic, content, created_at) in [
        ("Cats", "A cat sat", "2024-05-01 09:00:00"),
        ("Physics", "Quantum mechanics", "2024-05-02 09:00:00"),
    ] {
        sqlx::query(
            "INSERT INTO knowledge (category, topic, content, created_at) VALUES ('Legacy', ?, ?, ?)",
        )
        .bind(topic)
        .bind(content)
        .bind(created_at)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;

    let embedder = ConceptEmbedder::new("concept-v1");
    let engine = KnowledgeEngine::open_with_embedder(settings_for(&temp), embedder.clone())
        .await
        .unwrap();

    let report = engine.startup_report();
    assert!(report.added_embedding_column);
    assert_eq!(report.embedded, 2);
    assert_eq!(embedder.calls(), 2);

    for entry in engine.list_all_knowledge().await.unwrap() {
        let full = engine.get_knowledge_by_id(entry.id).await.unwrap().unwrap();
        assert_eq!(full.category, "Legacy");
        assert_eq!(
            full.embedding,
            Some(ConceptEmbedder::vector_for(&full.content))
        );
    }

    let second = engine.run_migration().await.unwrap();
    assert!(second.is_noop());
    assert_eq!(embedder.calls(), 2);

    let newest = &engine.list_all_knowledge().await.unwrap()[0];
    assert_eq!(newest.topic, "Physics");
    assert_eq!(newest.content, "Quantum mechanics");
}

#[tokio::test]
async fn foreign_blobs_are_replaced() {
    let temp = TempDir::new().unwrap();
    let pool = legacy_pool(&db_path(&temp)).await;
    sqlx::query(
        "CREATE TABLE knowledge (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            topic TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    // A pickled numpy array header, not f32le.
    sqlx::query(
        "INSERT INTO knowledge (category, topic, content, embedding)
         VALUES ('Animals', 'Dogs', 'A dog ran', x'80049505000000')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let embedder = ConceptEmbedder::new("concept-v1");
    let engine = KnowledgeEngine::open_with_embedder(settings_for(&temp), embedder.clone())
        .await
        .unwrap();

    let report = engine.startup_report();
    assert!(!report.added_embedding_column);
    assert_eq!(report.invalidated, 1);
    assert_eq!(report.embedded, 1);

    let entry = engine.get_knowledge_by_id(1).await.unwrap().unwrap();
    assert_eq!(entry.embedding, Some(ConceptEmbedder::vector_for("A dog ran")));
}

#[tokio::test]
async fn undecodable_blobs_are_reembedded() {
    let temp = TempDir::new().unwrap();
    let engine = KnowledgeEngine::open_with_embedder(
        settings_for(&temp),
        ConceptEmbedder::new("concept-v1"),
    )
    .await
    .unwrap();
    let (cat, dog, _) = common::seed_pets_and_physics(&engine).await;

    // Written by an older build that did not validate provider output.
    let mut poisoned = Vec::new();
    for value in [f32::NAN, 0.0, 0.0, 0.1] {
        poisoned.extend_from_slice(&value.to_le_bytes());
    }
    sqlx::query("UPDATE knowledge SET embedding = ? WHERE id = ?")
        .bind(&poisoned)
        .bind(cat)
        .execute(engine.pool())
        .await
        .unwrap();
    engine.pool().close().await;

    let embedder = ConceptEmbedder::new("concept-v1");
    let reopened = KnowledgeEngine::open_with_embedder(settings_for(&temp), embedder.clone())
        .await
        .unwrap();

    let report = reopened.startup_report();
    assert_eq!(report.invalidated, 1);
    assert_eq!(report.embedded, 1);
    assert_eq!(embedder.calls(), 1);

    let entry = reopened.get_knowledge_by_id(cat).await.unwrap().unwrap();
    assert_eq!(entry.embedding, Some(ConceptEmbedder::vector_for("A cat sat")));

    let ranked = reopened.semantic_search("pets", 2).await.unwrap();
    let ids: Vec<i64> = ranked.iter().map(|s| s.entry.id).collect();
    assert_eq!(ids, vec![cat, dog]);
    assert!(reopened.run_migration().await.unwrap().is_noop());
}

#[tokio::test]
async fn reopening_with_same_model_does_no_work() {
    let temp = TempDir::new().unwrap();
    let embedder = ConceptEmbedder::new("concept-v1");
    let engine = KnowledgeEngine::open_with_embedder(settings_for(&temp), embedder.clone())
        .await
        .unwrap();
    common::seed_pets_and_physics(&engine).await;
    engine.pool().close().await;

    let reopened_embedder = ConceptEmbedder::new("concept-v1");
    let reopened =
        KnowledgeEngine::open_with_embedder(settings_for(&temp), reopened_embedder.clone())
            .await
            .unwrap();

    assert!(reopened.startup_report().is_noop());
    assert_eq!(reopened_embedder.calls(), 0);
    assert_eq!(reopened.count_knowledge().await.unwrap(), 3);
}

#[tokio::test]
async fn model_change_reembeds_everything() {
    let temp = TempDir::new().unwrap();
    let engine = KnowledgeEngine::open_with_embedder(
        settings_for(&temp),
        ConceptEmbedder::new("concept-v1"),
    )
    .await
    .unwrap();
    common::seed_pets_and_physics(&engine).await;
    engine.pool().close().await;

    let upgraded = ConceptEmbedder::new("concept-v2");
    let reopened = KnowledgeEngine::open_with_embedder(settings_for(&temp), upgraded.clone())
        .await
        .unwrap();

    let report = reopened.startup_report();
    assert_eq!(report.invalidated, 3);
    assert_eq!(report.embedded, 3);
    assert_eq!(upgraded.calls(), 3);
    assert!(reopened.run_migration().await.unwrap().is_noop());
}

#[tokio::test]
async fn failed_backfill_aborts_startup() {
    let temp = TempDir::new().unwrap();
    let engine = KnowledgeEngine::open_with_embedder(
        settings_for(&temp),
        ConceptEmbedder::new("concept-v1"),
    )
    .await
    .unwrap();
    common::seed_pets_and_physics(&engine).await;
    engine.pool().close().await;

    let broken = ConceptEmbedder::new("concept-v2");
    broken.set_failing(true);
    let result = KnowledgeEngine::open_with_embedder(settings_for(&temp), broken).await;
    assert!(result.is_err());

    // Next start with a working provider finishes the job.
    let fixed = ConceptEmbedder::new("concept-v2");
    let reopened = KnowledgeEngine::open_with_embedder(settings_for(&temp), fixed.clone())
        .await
        .unwrap();
    assert_eq!(reopened.startup_report().embedded, 3);
    assert_eq!(reopened.startup_report().invalidated, 0);
}

#[tokio::test]
async fn seed_entries_only_fill_an_empty_corpus() {
    let temp = TempDir::new().unwrap();
    let mut settings = settings_for(&temp);
    settings.seed = vec![
        SeedEntry {
            category: "General".to_string(),
            topic: "Opening hours".to_string(),
            content: "Open from 9:00 to 18:00".to_string(),
        },
        SeedEntry {
            category: "Animals".to_string(),
            topic: "Office cat".to_string(),
            content: "The office cat is called Miso".to_string(),
        },
    ];

    let embedder = ConceptEmbedder::new("concept-v1");
    let engine = KnowledgeEngine::open_with_embedder(settings.clone(), embedder.clone())
        .await
        .unwrap();
    assert_eq!(engine.count_knowledge().await.unwrap(), 2);
    assert_eq!(embedder.calls(), 2);

    let first = engine.list_all_knowledge().await.unwrap();
    engine.delete_knowledge(first[0].id).await.unwrap();
    engine.pool().close().await;

    let reopened = KnowledgeEngine::open_with_embedder(settings, ConceptEmbedder::new("concept-v1"))
        .await
        .unwrap();
    assert_eq!(reopened.count_knowledge().await.unwrap(), 1);
}
