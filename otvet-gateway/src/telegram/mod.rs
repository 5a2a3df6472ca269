//! Telegram Bot API transport.
//!
//! Both bots use the same long-polling loop: updates are turned into
//! [`IncomingMessage`] values, handed to an [`UpdateHandler`] one at a time,
//! and whatever the handler returns is sent back to the originating chat.

use std::sync::Arc;
use std::time::Duration;

use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatId, Update, UpdateKind};
use tracing::{debug, error, info, warn};

/// Telegram rejects longer `sendMessage` texts.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const TRUNCATION_MARK: &str = "\n…";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Slack between the long-poll timeout and the HTTP client timeout.
const REQUEST_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Invalid Bot API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("Failed to build Telegram HTTP client: {0}")]
    Client(String),
}

/// Create a bot whose requests outlive a `poll_timeout` long poll.
pub fn build_bot(
    api_base: &str,
    token: &str,
    poll_timeout: Duration,
) -> Result<Bot, TelegramError> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(poll_timeout + REQUEST_SLACK)
        .build()
        .map_err(|e| TelegramError::Client(e.to_string()))?;
    let api_url = reqwest::Url::parse(api_base.trim_end_matches('/')).map_err(|e| {
        TelegramError::InvalidApiUrl {
            url: api_base.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Bot::with_client(token, client).set_api_url(api_url))
}

/// A text-bearing message from a human or bot sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub private_chat: bool,
    pub sender_id: i64,
    pub sender_is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: Option<String>,
}

impl IncomingMessage {
    /// `None` for non-message updates and messages without a sender.
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(message) => Self::from_message(message),
            _ => None,
        }
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let sender = message.from.as_ref()?;
        Some(Self {
            chat_id: message.chat.id.0,
            private_chat: message.chat.is_private(),
            sender_id: i64::try_from(sender.id.0).ok()?,
            sender_is_bot: sender.is_bot,
            username: sender.username.clone(),
            first_name: Some(sender.first_name.clone()).filter(|name| !name.is_empty()),
            text: message.text().map(str::to_string),
        })
    }

    /// Message text, if any non-blank text was sent.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}

/// Per-bot message logic.
#[async_trait::async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Reply text for `message`, or `None` to stay silent.
    async fn handle(&self, message: &IncomingMessage) -> Option<String>;
}

/// Cut `text` to Telegram's message limit on a char boundary.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARK.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARK);
    truncated
}

fn retry_delay(error: &RequestError, backoff: Duration) -> Duration {
    match error {
        RequestError::RetryAfter(seconds) => seconds.duration(),
        _ => backoff,
    }
}

/// Poll `bot` forever, dispatching each message to `handler`.
///
/// Transport errors are logged and retried with exponential back-off; a
/// failed `sendMessage` only loses that one reply.
pub async fn run_polling(
    name: &'static str,
    bot: Bot,
    handler: Arc<dyn UpdateHandler>,
    poll_timeout: Duration,
) {
    info!(bot = name, "starting Telegram long polling");
    let timeout_secs = u32::try_from(poll_timeout.as_secs()).unwrap_or(u32::MAX);
    let mut offset: i32 = 0;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message]);
        let updates = match request.await {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                updates
            }
            Err(e) => {
                let delay = retry_delay(&e, backoff);
                error!(bot = name, error = %e, delay_secs = delay.as_secs(), "getUpdates failed");
                tokio::time::sleep(delay).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        for update in updates {
            offset = update.id.as_offset();
            let Some(message) = IncomingMessage::from_update(&update) else {
                debug!(bot = name, update_id = update.id.0, "skipping update");
                continue;
            };

            let Some(reply) = handler.handle(&message).await else {
                continue;
            };
            if let Err(e) = bot
                .send_message(ChatId(message.chat_id), truncate_message(&reply))
                .await
            {
                warn!(bot = name, chat_id = message.chat_id, error = %e, "failed to send reply");
            }
        }
    }
}
