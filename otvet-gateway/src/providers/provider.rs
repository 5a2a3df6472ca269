//! Completion trait for the language-model call.

use otvet_core::ChatTurn;

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

/// A chat model that turns a prompt and prior turns into one reply.
#[async_trait::async_trait]
pub trait Completion: Send + Sync {
    /// Current model
    fn model(&self) -> &str;

    /// Generate a reply.
    ///
    /// `history` is ordered oldest first and does not include `user_message`.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<String, ProviderError>;
}
