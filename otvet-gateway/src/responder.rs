//! Knowledge-grounded auto-responder.
//!
//! For every accepted message: build grounding context from the knowledge
//! base, load the sender's recent transcript, ask the completion provider
//! and persist both turns once a reply exists. Failures never reach the
//! sender as raw errors; a fixed fallback reply is sent instead.

use std::sync::Arc;

use otvet_core::{ChatRole, ChatTurn, Settings};
use otvet_db::{OtvetDbPool, Participant, TranscriptRepository};
use otvet_knowledge::KnowledgeEngine;
use tracing::{info, warn};

use crate::providers::{Completion, ProviderError};
use crate::state::BlacklistHandle;
use crate::telegram::{IncomingMessage, UpdateHandler};

/// Prompt and fallback texts plus retrieval sizes.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub system_prompt: String,
    pub unavailable_reply: String,
    pub error_reply: String,
    pub context_items: usize,
    pub history_turns: usize,
}

impl ResponderConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            system_prompt: settings.completion.system_prompt.clone(),
            unavailable_reply: settings.completion.unavailable_reply.clone(),
            error_reply: settings.completion.error_reply.clone(),
            context_items: settings.knowledge.context_items,
            history_turns: settings.responder.history_turns,
        }
    }
}

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Text to send. A fallback reply when `generated` is false.
    pub reply: String,
    /// Whether the completion provider produced `reply`.
    pub generated: bool,
    /// Grounding block that was appended to the system prompt.
    pub context: String,
}

pub struct Responder {
    config: ResponderConfig,
    knowledge: Arc<KnowledgeEngine>,
    transcripts: OtvetDbPool,
    completion: Arc<dyn Completion>,
    blacklist: BlacklistHandle,
}

impl Responder {
    pub fn new(
        config: ResponderConfig,
        knowledge: Arc<KnowledgeEngine>,
        transcripts: OtvetDbPool,
        completion: Arc<dyn Completion>,
        blacklist: BlacklistHandle,
    ) -> Self {
        Self {
            config,
            knowledge,
            transcripts,
            completion,
            blacklist,
        }
    }

    /// Text of `message` if the responder should answer it.
    pub fn accept<'m>(&self, message: &'m IncomingMessage) -> Option<&'m str> {
        if !message.private_chat || message.sender_is_bot {
            return None;
        }
        if let Some(username) = &message.username
            && self.blacklist.snapshot().contains(username)
        {
            info!(username = %username, "ignoring blacklisted sender");
            return None;
        }
        message.text()
    }

    /// Answer `text` for `participant`, with transcript history and persistence.
    pub async fn answer(&self, participant: &Participant, text: &str) -> Answer {
        let history = match TranscriptRepository::recent(
            self.transcripts.pool(),
            participant.user_id,
            self.config.history_turns,
        )
        .await
        {
            Ok(entries) => entries.iter().map(|entry| entry.to_turn()).collect(),
            Err(e) => {
                warn!(user_id = participant.user_id, error = %e, "failed to load transcript");
                Vec::new()
            }
        };

        let answer = self.generate(text, &history).await;
        if answer.generated {
            self.persist(participant, text, &answer.reply).await;
        }
        answer
    }

    /// Answer `text` without history and without writing a transcript.
    pub async fn preview(&self, text: &str) -> Answer {
        self.generate(text, &[]).await
    }

    /// Grounding context for `query`, degrading to recent entries on failure.
    pub async fn grounding(&self, query: &str) -> String {
        let items = self.config.context_items;
        match self.knowledge.context_for_query(Some(query), items).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "semantic context failed, using recent entries");
                self.knowledge
                    .context_for_query(None, items)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "knowledge base unavailable, answering without context");
                        String::new()
                    })
            }
        }
    }

    pub fn system_prompt(&self, context: &str) -> String {
        if context.is_empty() {
            self.config.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.config.system_prompt, context)
        }
    }

    async fn generate(&self, text: &str, history: &[ChatTurn]) -> Answer {
        let context = self.grounding(text).await;
        let system_prompt = self.system_prompt(&context);

        match self.completion.complete(&system_prompt, history, text).await {
            Ok(reply) => Answer {
                reply,
                generated: true,
                context,
            },
            Err(ProviderError::NoContent) => {
                warn!(model = self.completion.model(), "completion returned no content");
                Answer {
                    reply: self.config.unavailable_reply.clone(),
                    generated: false,
                    context,
                }
            }
            Err(e) => {
                warn!(model = self.completion.model(), error = %e, "completion failed");
                Answer {
                    reply: self.config.error_reply.clone(),
                    generated: false,
                    context,
                }
            }
        }
    }

    async fn persist(&self, participant: &Participant, question: &str, reply: &str) {
        for (role, message) in [(ChatRole::User, question), (ChatRole::Assistant, reply)] {
            if let Err(e) =
                TranscriptRepository::append(self.transcripts.pool(), participant, role, message)
                    .await
            {
                warn!(user_id = participant.user_id, %role, error = %e, "failed to store turn");
            }
        }
    }
}

#[async_trait::async_trait]
impl UpdateHandler for Responder {
    async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        let text = self.accept(message)?;
        info!(
            user_id = message.sender_id,
            username = message.username.as_deref().unwrap_or("-"),
            "incoming message"
        );

        let participant = Participant {
            user_id: message.sender_id,
            username: message.username.clone(),
            first_name: message.first_name.clone(),
        };
        let answer = self.answer(&participant, text).await;
        Some(answer.reply)
    }
}
