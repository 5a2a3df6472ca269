//! Per-user conversation transcript.

use chrono::{NaiveDateTime, Utc};
use otvet_core::{ChatRole, ChatTurn};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Telegram user a transcript belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

/// One stored turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub role: ChatRole,
    pub message: String,
    pub created_at: NaiveDateTime,
}

impl TranscriptEntry {
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn::new(self.role, self.message.clone())
    }
}

/// Participant listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub message_count: i64,
    pub last_message_at: Option<NaiveDateTime>,
}

/// Per-user message counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptStats {
    pub total: i64,
    pub user_turns: i64,
    pub assistant_turns: i64,
    pub first_at: Option<NaiveDateTime>,
    pub last_at: Option<NaiveDateTime>,
}

/// Transcript repository for database operations
pub struct TranscriptRepository;

impl TranscriptRepository {
    /// Append a turn and return its id
    pub async fn append(
        pool: &SqlitePool,
        participant: &Participant,
        role: ChatRole,
        message: &str,
    ) -> DbResult<i64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "INSERT INTO conversation_history (user_id, username, user_first_name, role, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(participant.user_id)
        .bind(participant.username.as_deref())
        .bind(participant.first_name.as_deref())
        .bind(role.as_str())
        .bind(message)
        .bind(now)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Appended {} turn {} for user {}", role, id, participant.user_id);
        Ok(id)
    }

    /// The last `limit` turns for a user, oldest first
    pub async fn recent(
        pool: &SqlitePool,
        user_id: i64,
        limit: usize,
    ) -> DbResult<Vec<TranscriptEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, TranscriptRow>(
            "SELECT id, user_id, username, user_first_name, role, message, created_at
             FROM conversation_history
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;

        let mut entries = rows
            .into_iter()
            .map(TranscriptEntry::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        entries.reverse();
        Ok(entries)
    }

    /// Delete a user's transcript, returning the number of removed turns
    pub async fn clear(pool: &SqlitePool, user_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM conversation_history WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Every user with at least one turn, most recently active first
    pub async fn list_participants(pool: &SqlitePool) -> DbResult<Vec<ParticipantSummary>> {
        // Bare columns next to MAX() come from the row holding the maximum.
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT user_id, username, user_first_name,
                    COUNT(*) AS message_count,
                    MAX(created_at) AS last_message_at
             FROM conversation_history
             GROUP BY user_id
             ORDER BY last_message_at DESC, user_id ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(ParticipantSummary::from).collect())
    }

    /// Message counts for one user
    pub async fn stats(pool: &SqlitePool, user_id: i64) -> DbResult<TranscriptStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN role = 'user' THEN 1 ELSE 0 END), 0) AS user_turns,
                    COALESCE(SUM(CASE WHEN role = 'assistant' THEN 1 ELSE 0 END), 0) AS assistant_turns,
                    MIN(created_at) AS first_at,
                    MAX(created_at) AS last_at
             FROM conversation_history
             WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(TranscriptStats {
            total: row.total,
            user_turns: row.user_turns,
            assistant_turns: row.assistant_turns,
            first_at: row.first_at,
            last_at: row.last_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TranscriptRow {
    id: i64,
    user_id: i64,
    username: Option<String>,
    user_first_name: Option<String>,
    role: String,
    message: String,
    created_at: NaiveDateTime,
}

impl TryFrom<TranscriptRow> for TranscriptEntry {
    type Error = DbError;

    fn try_from(row: TranscriptRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<ChatRole>()
            .map_err(|e| DbError::InvalidRole(e.0))?;

        Ok(TranscriptEntry {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            first_name: row.user_first_name,
            role,
            message: row.message,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    user_id: i64,
    username: Option<String>,
    user_first_name: Option<String>,
    message_count: i64,
    last_message_at: Option<NaiveDateTime>,
}

impl From<ParticipantRow> for ParticipantSummary {
    fn from(row: ParticipantRow) -> Self {
        ParticipantSummary {
            user_id: row.user_id,
            username: row.username,
            first_name: row.user_first_name,
            message_count: row.message_count,
            last_message_at: row.last_message_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    total: i64,
    user_turns: i64,
    assistant_turns: i64,
    first_at: Option<NaiveDateTime>,
    last_at: Option<NaiveDateTime>,
}
