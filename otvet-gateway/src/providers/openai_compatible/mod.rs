//! OpenAI-compatible provider used for OpenRouter and self-hosted endpoints.

pub mod client;

pub use client::OpenAiCompatibleClient;
