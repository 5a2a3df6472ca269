#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use otvet_knowledge::{
    EmbeddingProvider, KnowledgeEngine, KnowledgeError, KnowledgeResult, KnowledgeSettings,
};

const CONCEPTS: &[(&str, &[&str])] = &[
    ("animal", &["cat", "cats", "dog", "dogs", "pet", "pets", "kitten", "puppy", "кошка"]),
    ("physics", &["quantum", "mechanics", "physics", "particle", "energy"]),
    ("food", &["pizza", "bread", "soup", "coffee"]),
];

/// Deterministic bag-of-concepts embedder.
///
/// Each known word adds 1.0 to its concept axis; a constant last axis keeps
/// unrelated texts from being zero vectors.
pub struct ConceptEmbedder {
    model: String,
    calls: AtomicUsize,
    failing: AtomicBool,
    nan: AtomicBool,
}

impl ConceptEmbedder {
    pub fn new(model: &str) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            nan: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `embed` succeed with a NaN in the first axis.
    pub fn set_nan(&self, nan: bool) {
        self.nan.store(nan, Ordering::SeqCst);
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; CONCEPTS.len() + 1];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            for (axis, (_, words)) in CONCEPTS.iter().enumerate() {
                if words.contains(&word) {
                    vector[axis] += 1.0;
                }
            }
        }
        vector[CONCEPTS.len()] = 0.1;
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for ConceptEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KnowledgeError::Embedding("provider unavailable".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = Self::vector_for(text);
        if self.nan.load(Ordering::SeqCst) {
            vector[0] = f32::NAN;
        }
        Ok(vector)
    }
}

pub fn settings_for(temp: &TempDir) -> KnowledgeSettings {
    KnowledgeSettings {
        knowledge_db_path_override: Some(db_path(temp)),
        // Nothing should ever reach the network in these tests.
        embedding_url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    }
}

pub fn db_path(temp: &TempDir) -> PathBuf {
    temp.path().join("data").join("knowledge.sqlite3")
}

/// Fresh engine over an empty temp database.
pub async fn setup() -> (KnowledgeEngine, Arc<ConceptEmbedder>, TempDir) {
    let temp = TempDir::new().expect("tempdir");
    let embedder = ConceptEmbedder::new("concept-v1");
    let engine = KnowledgeEngine::open_with_embedder(settings_for(&temp), embedder.clone())
        .await
        .expect("open engine");
    (engine, embedder, temp)
}

/// The three-entry corpus used by the retrieval scenarios.
pub async fn seed_pets_and_physics(engine: &KnowledgeEngine) -> (i64, i64, i64) {
    let cat = engine
        .add_knowledge("Animals", "Cats", "A cat sat")
        .await
        .unwrap();
    let dog = engine
        .add_knowledge("Animals", "Dogs", "A dog ran")
        .await
        .unwrap();
    let physics = engine
        .add_knowledge("Science", "Physics", "Quantum mechanics")
        .await
        .unwrap();
    (cat, dog, physics)
}
