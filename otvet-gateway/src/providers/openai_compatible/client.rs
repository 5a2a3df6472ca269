//! OpenAI-compatible Chat Completions client.

use std::time::Duration;

use otvet_core::{ChatTurn, CompletionSettings};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::provider::{Completion, ProviderError};

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Request body for the Chat Completions API
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: OpenAiMessage,
}

impl OpenAiCompatibleClient {
    /// Create a client from `[completion]` settings.
    ///
    /// `api_key` of `None` sends no Authorization header (local servers).
    pub fn new(
        settings: &CompletionSettings,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}"))
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    pub(crate) fn build_request(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_message: &str,
    ) -> ChatCompletionsRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OpenAiMessage {
            role: "system".to_string(),
            content: Some(system_prompt.to_string()),
        });
        messages.extend(history.iter().map(|turn| OpenAiMessage {
            role: turn.role.as_str().to_string(),
            content: Some(turn.content.clone()),
        }));
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: Some(user_message.to_string()),
        });

        ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

fn first_reply(response: ChatCompletionsResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::NoContent)
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait::async_trait]
impl Completion for OpenAiCompatibleClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<String, ProviderError> {
        let request_body = self.build_request(system_prompt, history, user_message);
        debug!(
            model = %self.model,
            messages = request_body.messages.len(),
            "sending chat completion"
        );

        let response = self
            .http_client
            .post(self.chat_completions_url())
            .headers(self.build_headers())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response.text().await?;
        let parsed: ChatCompletionsResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidFormat(format!(
                "Failed to parse chat completion: {e}\nBody preview: {}",
                preview(&response_text, 500)
            ))
        })?;
        first_reply(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> OpenAiCompatibleClient {
        let settings = CompletionSettings {
            base_url: base_url.to_string(),
            model: "llama3.1".to_string(),
            max_tokens: 200,
            ..Default::default()
        };
        OpenAiCompatibleClient::new(&settings, None).unwrap()
    }

    #[test]
    fn test_chat_completions_url_without_v1_suffix() {
        assert_eq!(
            client("http://127.0.0.1:8080/").chat_completions_url(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_chat_completions_url_with_v1_suffix() {
        assert_eq!(
            client("https://openrouter.ai/api/v1").chat_completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_no_authorization_without_key() {
        assert!(client("http://127.0.0.1:8080").build_headers().is_empty());

        let settings = CompletionSettings::default();
        let keyed = OpenAiCompatibleClient::new(&settings, Some("sk-test".to_string())).unwrap();
        assert_eq!(
            keyed.build_headers().get(AUTHORIZATION).unwrap(),
            "Bearer sk-test"
        );
    }

    #[test]
    fn test_request_orders_system_history_then_question() {
        let history = vec![
            ChatTurn::user("Hi"),
            ChatTurn::assistant("Hello! How can I help?"),
        ];
        let request = client("http://127.0.0.1:8080").build_request(
            "Be brief.\n\nKnowledge base:\n\n[Shop - Hours]: 9 to 18",
            &history,
            "When do you open?",
        );

        insta::assert_json_snapshot!(request, @r#"
        {
          "model": "llama3.1",
          "messages": [
            {
              "role": "system",
              "content": "Be brief.\n\nKnowledge base:\n\n[Shop - Hours]: 9 to 18"
            },
            {
              "role": "user",
              "content": "Hi"
            },
            {
              "role": "assistant",
              "content": "Hello! How can I help?"
            },
            {
              "role": "user",
              "content": "When do you open?"
            }
          ],
          "max_tokens": 200
        }
        "#);
    }

    #[test]
    fn test_first_reply_is_trimmed() {
        let response: ChatCompletionsResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  We open at nine.\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_reply(response).unwrap(), "We open at nine.");
    }

    #[test]
    fn test_missing_or_blank_content_is_no_content() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#,
        ] {
            let response: ChatCompletionsResponse = serde_json::from_str(body).unwrap();
            assert!(matches!(first_reply(response), Err(ProviderError::NoContent)));
        }
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("привет", 3), "при");
        assert_eq!(preview("hi", 10), "hi");
    }
}
