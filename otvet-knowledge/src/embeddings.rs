use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::KnowledgeSettings;
use crate::errors::{KnowledgeError, KnowledgeResult};

/// Turns text into a fixed-dimension vector.
///
/// Implementations must be deterministic for a given `model_id`: the engine
/// stores vectors next to that id and re-embeds the corpus when it changes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>>;
}

/// Embed `text` and reject vectors the codec could not read back.
///
/// Every write and query goes through here, whatever the provider.
pub(crate) async fn embed_checked(
    embedder: &dyn EmbeddingProvider,
    text: &str,
) -> KnowledgeResult<Vec<f32>> {
    let vector = embedder.embed(text).await?;
    check_vector(&vector)?;
    Ok(vector)
}

fn check_vector(vector: &[f32]) -> KnowledgeResult<()> {
    if vector.is_empty() {
        return Err(KnowledgeError::Embedding("empty embedding vector".to_string()));
    }
    match vector.iter().position(|value| !value.is_finite()) {
        Some(index) => Err(KnowledgeError::Embedding(format!(
            "non-finite embedding value at index {index}"
        ))),
        None => Ok(()),
    }
}

/// Ollama `/api/embed` client.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    expected_dim: Option<usize>,
    client: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(settings: &KnowledgeSettings) -> KnowledgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.embedding_timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: settings.embedding_url.trim_end_matches('/').to_string(),
            model: settings.embedding_model.clone(),
            expected_dim: settings.embedding_dim,
            client,
        })
    }

    pub async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Embedding(format!(
                "embedding request failed: {status} {text}"
            )));
        }

        let payload: EmbedResponse = response.json().await?;
        let vectors = match (payload.embeddings, payload.embedding) {
            (Some(embeddings), _) => embeddings,
            (None, Some(embedding)) => vec![embedding],
            (None, None) => {
                return Err(KnowledgeError::Embedding(
                    "embedding response missing vectors".to_string(),
                ));
            }
        };

        if vectors.len() != inputs.len() {
            return Err(KnowledgeError::Embedding(format!(
                "expected {} vectors, got {}",
                inputs.len(),
                vectors.len()
            )));
        }

        for vector in &vectors {
            self.check_dim(vector)?;
        }

        Ok(vectors)
    }

    fn check_dim(&self, vector: &[f32]) -> KnowledgeResult<()> {
        check_vector(vector)?;
        match self.expected_dim {
            Some(expected) if expected != vector.len() => Err(KnowledgeError::EmbeddingDimMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| {
                KnowledgeError::Embedding("embedding response missing vectors".to_string())
            })
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
}
