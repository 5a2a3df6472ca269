//! Admin bot: knowledge base management, blacklist and process control.

mod command;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDateTime;
use otvet_core::ProcessSettings;
use otvet_db::{OtvetDbPool, TranscriptRepository};
use otvet_knowledge::{KnowledgeEngine, KnowledgeEntry, KnowledgeError};
use tracing::{info, warn};

pub use command::{AdminCommand, CommandError, HELP_TEXT};

use crate::process::ProcessController;
use crate::responder::Responder;
use crate::state::BlacklistHandle;
use crate::telegram::{IncomingMessage, UpdateHandler};

pub const ACCESS_DENIED: &str = "You don't have access to this bot.";

/// Longest content shown per entry in listings.
const PREVIEW_CHARS: usize = 100;

/// Where and how to restart the responder.
#[derive(Clone)]
pub struct RestartTarget {
    pub controller: Arc<dyn ProcessController>,
    pub host: String,
    pub session: String,
    pub command: String,
    pub working_dir: String,
}

impl RestartTarget {
    pub fn new(
        controller: Arc<dyn ProcessController>,
        host: &str,
        settings: &ProcessSettings,
    ) -> Self {
        Self {
            controller,
            host: host.to_string(),
            session: settings.session.clone(),
            command: settings.command.clone(),
            working_dir: settings.working_dir.clone(),
        }
    }
}

pub struct AdminBot {
    admin_ids: HashSet<i64>,
    knowledge: Arc<KnowledgeEngine>,
    transcripts: OtvetDbPool,
    responder: Arc<Responder>,
    blacklist: BlacklistHandle,
    restart: Option<RestartTarget>,
}

impl AdminBot {
    pub fn new(
        admin_ids: impl IntoIterator<Item = i64>,
        knowledge: Arc<KnowledgeEngine>,
        transcripts: OtvetDbPool,
        responder: Arc<Responder>,
        blacklist: BlacklistHandle,
        restart: Option<RestartTarget>,
    ) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
            knowledge,
            transcripts,
            responder,
            blacklist,
            restart,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Run `command` and render the reply text.
    pub async fn execute(&self, command: AdminCommand) -> String {
        match command {
            AdminCommand::Help => HELP_TEXT.to_string(),
            AdminCommand::List => self.list().await,
            AdminCommand::Get(id) => self.get(id).await,
            AdminCommand::Add {
                category,
                topic,
                content,
            } => self.add(&category, &topic, &content).await,
            AdminCommand::Edit {
                id,
                category,
                topic,
                content,
            } => self.edit(id, category, topic, content).await,
            AdminCommand::Append { id, text } => self.append(id, &text).await,
            AdminCommand::Search(needle) => self.search(&needle).await,
            AdminCommand::Delete(id) => self.delete(id).await,
            AdminCommand::Stats => self.stats().await,
            AdminCommand::Ask(question) => self.ask(&question).await,
            AdminCommand::Blacklist => self.show_blacklist(),
            AdminCommand::Block(username) => match self.blacklist.add(&username) {
                Ok(_) => format!("@{} will no longer get replies.", normalize(&username)),
                Err(e) => format!("Blacklist unchanged: {e}."),
            },
            AdminCommand::Unblock(username) => match self.blacklist.remove(&username) {
                Ok(_) => format!("@{} will get replies again.", normalize(&username)),
                Err(e) => format!("Blacklist unchanged: {e}."),
            },
            AdminCommand::Users => self.users().await,
            AdminCommand::History(user_id) => self.history(user_id).await,
            AdminCommand::Forget(user_id) => self.forget(user_id).await,
            AdminCommand::Restart => self.restart().await,
        }
    }

    async fn list(&self) -> String {
        match self.knowledge.list_all_knowledge().await {
            Ok(entries) if entries.is_empty() => "Knowledge base is empty.".to_string(),
            Ok(entries) => {
                render_entries(&format!("Knowledge base ({}):", entries.len()), &entries)
            }
            Err(e) => knowledge_failure("list entries", &e),
        }
    }

    async fn get(&self, id: i64) -> String {
        match self.knowledge.get_knowledge_fields(id).await {
            Ok(Some(entry)) => format!(
                "#{} [{} - {}]\nCreated: {}\n\n{}",
                entry.id,
                entry.category,
                entry.topic,
                format_time(&entry.created_at),
                entry.content
            ),
            Ok(None) => not_found(id),
            Err(e) => knowledge_failure("load the entry", &e),
        }
    }

    async fn add(&self, category: &str, topic: &str, content: &str) -> String {
        match self.knowledge.add_knowledge(category, topic, content).await {
            Ok(id) => format!("Added entry #{id}."),
            Err(e) => knowledge_failure("add the entry", &e),
        }
    }

    async fn edit(
        &self,
        id: i64,
        category: Option<String>,
        topic: Option<String>,
        content: Option<String>,
    ) -> String {
        let current = match self.knowledge.get_knowledge_fields(id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return not_found(id),
            Err(e) => return knowledge_failure("load the entry", &e),
        };

        let category = category.unwrap_or(current.category);
        let topic = topic.unwrap_or(current.topic);
        let content = content.unwrap_or(current.content);
        self.replace(id, &category, &topic, &content).await
    }

    /// Append-on-edit: the new text is joined to the old content before a full replace.
    async fn append(&self, id: i64, text: &str) -> String {
        let current = match self.knowledge.get_knowledge_fields(id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return not_found(id),
            Err(e) => return knowledge_failure("load the entry", &e),
        };

        let content = format!("{}\n\n{}", current.content, text.trim());
        self.replace(id, &current.category, &current.topic, &content)
            .await
    }

    async fn replace(&self, id: i64, category: &str, topic: &str, content: &str) -> String {
        match self
            .knowledge
            .update_knowledge(id, category, topic, content)
            .await
        {
            Ok(true) => format!("Entry #{id} updated."),
            Ok(false) => not_found(id),
            Err(e) => knowledge_failure("update the entry", &e),
        }
    }

    async fn search(&self, needle: &str) -> String {
        match self.knowledge.search_knowledge(needle).await {
            Ok(entries) if entries.is_empty() => format!("Nothing found for \"{needle}\"."),
            Ok(entries) => render_entries(
                &format!("Found {} for \"{needle}\":", entries.len()),
                &entries,
            ),
            Err(e) => knowledge_failure("search", &e),
        }
    }

    async fn delete(&self, id: i64) -> String {
        match self.knowledge.delete_knowledge(id).await {
            Ok(true) => {
                info!(id, "knowledge entry deleted by admin");
                format!("Entry #{id} deleted.")
            }
            Ok(false) => not_found(id),
            Err(e) => knowledge_failure("delete the entry", &e),
        }
    }

    async fn stats(&self) -> String {
        let counts = match self.knowledge.category_counts().await {
            Ok(counts) => counts,
            Err(e) => return knowledge_failure("load statistics", &e),
        };
        let total: i64 = counts.iter().map(|c| c.count).sum();

        let mut text = format!("Knowledge base: {total} entries");
        if !counts.is_empty() {
            text.push_str("\n\nBy category:");
            for count in &counts {
                let _ = write!(text, "\n- {}: {}", count.category, count.count);
            }
        }

        match TranscriptRepository::list_participants(self.transcripts.pool()).await {
            Ok(participants) => {
                let _ = write!(text, "\n\nConversations: {} users", participants.len());
            }
            Err(e) => warn!(error = %e, "failed to count conversations"),
        }
        text
    }

    async fn ask(&self, question: &str) -> String {
        let answer = self.responder.preview(question).await;
        let status = if answer.generated { "Reply" } else { "Fallback reply" };
        format!(
            "{status}:\n\n{}\n\n---\nContext used: {} characters\nQuestion: {}",
            answer.reply,
            answer.context.chars().count(),
            preview(question)
        )
    }

    fn show_blacklist(&self) -> String {
        let snapshot = self.blacklist.snapshot();
        if snapshot.is_empty() {
            return "Blacklist is empty. Everyone gets replies.".to_string();
        }
        let mut text = format!("Blacklist ({}):", snapshot.len());
        for (idx, username) in snapshot.iter().enumerate() {
            let _ = write!(text, "\n{}. @{}", idx + 1, username);
        }
        text
    }

    async fn users(&self) -> String {
        match TranscriptRepository::list_participants(self.transcripts.pool()).await {
            Ok(participants) if participants.is_empty() => "No conversations yet.".to_string(),
            Ok(participants) => {
                let mut text = format!("Conversations ({}):", participants.len());
                for p in &participants {
                    let _ = write!(
                        text,
                        "\n{} {} - {} messages, last {}",
                        p.user_id,
                        display_name(p.username.as_deref(), p.first_name.as_deref()),
                        p.message_count,
                        p.last_message_at
                            .as_ref()
                            .map(format_time)
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "failed to list conversations");
                format!("Could not list conversations: {e}")
            }
        }
    }

    async fn history(&self, user_id: i64) -> String {
        match TranscriptRepository::stats(self.transcripts.pool(), user_id).await {
            Ok(stats) if stats.total == 0 => format!("No conversation with {user_id}."),
            Ok(stats) => format!(
                "Conversation with {user_id}:\n{} messages ({} from the user, {} replies)\nFirst: {}\nLast: {}",
                stats.total,
                stats.user_turns,
                stats.assistant_turns,
                stats.first_at.as_ref().map(format_time).unwrap_or_default(),
                stats.last_at.as_ref().map(format_time).unwrap_or_default(),
            ),
            Err(e) => {
                warn!(user_id, error = %e, "failed to load conversation stats");
                format!("Could not load the conversation: {e}")
            }
        }
    }

    async fn forget(&self, user_id: i64) -> String {
        match TranscriptRepository::clear(self.transcripts.pool(), user_id).await {
            Ok(0) => format!("No conversation with {user_id}."),
            Ok(removed) => {
                info!(user_id, removed, "conversation cleared by admin");
                format!("Removed {removed} messages from the conversation with {user_id}.")
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to clear conversation");
                format!("Could not clear the conversation: {e}")
            }
        }
    }

    async fn restart(&self) -> String {
        let Some(target) = &self.restart else {
            return "Restart is not configured. Set [process] host in the config.".to_string();
        };

        match target.controller.check_alive(&target.session).await {
            Ok(true) => {}
            Ok(false) => {
                return format!(
                    "tmux session '{}' was not found on {}. Nothing was restarted.",
                    target.session, target.host
                );
            }
            Err(e) => {
                warn!(host = %target.host, error = %e, "session check failed");
                return format!("Could not reach {}: {e}", target.host);
            }
        }

        match target
            .controller
            .restart(&target.session, &target.command, &target.working_dir)
            .await
        {
            Ok(()) => format!(
                "Restarted.\nServer: {}\ntmux session: {}\nCommand: {}",
                target.host, target.session, target.command
            ),
            Err(e) => {
                warn!(host = %target.host, error = %e, "restart failed");
                format!("Restart failed: {e}")
            }
        }
    }
}

#[async_trait::async_trait]
impl UpdateHandler for AdminBot {
    async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        if !self.is_admin(message.sender_id) {
            warn!(user_id = message.sender_id, "admin bot used by non-admin");
            return Some(ACCESS_DENIED.to_string());
        }
        let text = message.text()?;

        let reply = match AdminCommand::parse(text) {
            Ok(command) => {
                info!(user_id = message.sender_id, ?command, "admin command");
                self.execute(command).await
            }
            Err(CommandError::Unknown) => HELP_TEXT.to_string(),
            Err(e @ CommandError::Usage(_)) => e.to_string(),
        };
        Some(reply)
    }
}

fn render_entries(header: &str, entries: &[KnowledgeEntry]) -> String {
    let mut text = header.to_string();
    for entry in entries {
        let _ = write!(
            text,
            "\n\n#{} [{} - {}]\n{}",
            entry.id,
            entry.category,
            entry.topic,
            preview(&entry.content)
        );
    }
    text
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}

fn format_time(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

fn display_name(username: Option<&str>, first_name: Option<&str>) -> String {
    match (username, first_name) {
        (Some(username), _) => format!("@{username}"),
        (None, Some(first_name)) => first_name.to_string(),
        (None, None) => "(unknown)".to_string(),
    }
}

fn normalize(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

fn not_found(id: i64) -> String {
    format!("Entry #{id} not found.")
}

fn knowledge_failure(action: &str, err: &KnowledgeError) -> String {
    match err {
        KnowledgeError::Validation(field) => format!("The {field} must not be empty."),
        other => {
            warn!(error = %other, "knowledge operation failed");
            format!("Could not {action}: {other}")
        }
    }
}
