use otvet_core::ChatRole;
use otvet_db::{OtvetDbPool, Participant, TranscriptRepository};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

#[tokio::test]
async fn transcript_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("otvet.sqlite3");
    let participant = Participant {
        user_id: 42,
        username: Some("carol".to_string()),
        first_name: None,
    };

    let db = OtvetDbPool::open(&db_path).await.unwrap();
    TranscriptRepository::append(db.pool(), &participant, ChatRole::User, "ping")
        .await
        .unwrap();
    TranscriptRepository::append(db.pool(), &participant, ChatRole::Assistant, "pong")
        .await
        .unwrap();
    db.close().await;

    let reopened = OtvetDbPool::open(&db_path).await.unwrap();
    let turns = TranscriptRepository::recent(reopened.pool(), 42, 6)
        .await
        .unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].message, "ping");
    assert_eq!(turns[1].role, ChatRole::Assistant);
}

#[tokio::test]
async fn existing_untracked_table_is_adopted() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("legacy.db");

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let legacy = SqlitePool::connect_with(options).await.unwrap();
    sqlx::query(
        "CREATE TABLE conversation_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            username TEXT,
            user_first_name TEXT,
            role TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&legacy)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO conversation_history (user_id, username, role, message, created_at)
         VALUES (5, 'dave', 'user', 'old question', '2024-03-01 10:00:00')",
    )
    .execute(&legacy)
    .await
    .unwrap();
    legacy.close().await;

    let db = OtvetDbPool::open(&db_path).await.unwrap();
    let turns = TranscriptRepository::recent(db.pool(), 5, 6).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].message, "old question");
    assert_eq!(turns[0].username.as_deref(), Some("dave"));
}
