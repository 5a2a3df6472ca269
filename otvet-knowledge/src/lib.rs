//! Knowledge base for the otvet responder.
//!
//! Entries are short `category / topic / content` records stored in SQLite
//! together with an embedding of their content. Questions are embedded with
//! the same provider and ranked by cosine similarity to build the grounding
//! block sent along with the completion prompt.

pub mod codec;
pub mod context;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod index;
mod migration;
pub mod models;
pub mod paths;
mod seed;
pub mod storage;

pub use otvet_core::config::{KnowledgeSettings, SeedEntry};
pub use embeddings::{EmbeddingClient, EmbeddingProvider};
pub use engine::KnowledgeEngine;
pub use errors::{KnowledgeError, KnowledgeResult};
pub use models::{CategoryCount, KnowledgeEntry, MigrationReport, ScoredEntry};
