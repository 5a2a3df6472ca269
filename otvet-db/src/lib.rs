//! otvet-db: SQLite storage for the auto-responder's conversation transcript.
//!
//! Each Telegram user has a linear log of `user` / `assistant` turns. The
//! responder reads the most recent turns back as completion history; the
//! admin bot reads per-user statistics.

pub mod error;
pub mod otvet_db;
mod sqlite_runtime;
pub mod transcript;

pub use error::{DbError, DbResult};
pub use otvet_db::OtvetDbPool;
pub use transcript::{
    Participant, ParticipantSummary, TranscriptEntry, TranscriptRepository, TranscriptStats,
};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
