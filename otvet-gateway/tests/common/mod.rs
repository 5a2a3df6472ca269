#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use otvet_core::{Blacklist, ChatTurn};
use otvet_db::OtvetDbPool;
use otvet_gateway::process::{ProcessController, ProcessError};
use otvet_gateway::providers::{Completion, ProviderError};
use otvet_gateway::telegram::IncomingMessage;
use otvet_gateway::{BlacklistHandle, Responder, ResponderConfig};
use otvet_knowledge::{
    EmbeddingProvider, KnowledgeEngine, KnowledgeError, KnowledgeResult, KnowledgeSettings,
};

pub const SYSTEM_PROMPT: &str = "You answer for the shop.";
pub const UNAVAILABLE: &str = "Sorry, not now.";
pub const ERROR_REPLY: &str = "Something went wrong.";

/// Keyword embedder: one axis per topic word plus a constant bias axis.
pub struct KeywordEmbedder {
    failing: AtomicBool,
    calls: AtomicUsize,
}

const AXES: &[&[&str]] = &[
    &["open", "hours", "opening", "close", "sunday"],
    &["tea", "coffee", "price", "prices", "cost"],
    &["delivery", "courier", "shipping"],
];

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keywords-v1"
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KnowledgeError::Embedding("ollama is down".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = AXES
            .iter()
            .map(|words| {
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| words.contains(w))
                    .count() as f32
            })
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub user_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    Echo,
    Empty,
    Fail,
}

/// Completion fake that records every call.
pub struct FakeCompletion {
    mode: Mutex<CompletionMode>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(CompletionMode::Echo),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: CompletionMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls().pop().expect("completion was called")
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            user_message: user_message.to_string(),
        });
        let mode = *self.mode.lock().unwrap();
        match mode {
            CompletionMode::Echo => Ok(format!("Answer to: {user_message}")),
            CompletionMode::Empty => Err(ProviderError::NoContent),
            CompletionMode::Fail => Err(ProviderError::ApiError {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        }
    }
}

/// Process controller fake with a fixed session state.
pub struct FakeController {
    pub alive: bool,
    pub restarts: Mutex<Vec<(String, String, String)>>,
}

impl FakeController {
    pub fn new(alive: bool) -> Arc<Self> {
        Arc::new(Self {
            alive,
            restarts: Mutex::new(Vec::new()),
        })
    }

    pub fn restarts(&self) -> Vec<(String, String, String)> {
        self.restarts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessController for FakeController {
    async fn check_alive(&self, _id: &str) -> Result<bool, ProcessError> {
        Ok(self.alive)
    }

    async fn restart(&self, id: &str, command: &str, dir: &str) -> Result<(), ProcessError> {
        self.restarts
            .lock()
            .unwrap()
            .push((id.to_string(), command.to_string(), dir.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub knowledge: Arc<KnowledgeEngine>,
    pub transcripts: OtvetDbPool,
    pub embedder: Arc<KeywordEmbedder>,
    pub completion: Arc<FakeCompletion>,
    pub blacklist: BlacklistHandle,
    pub responder: Arc<Responder>,
    _temp: TempDir,
}

pub fn responder_config() -> ResponderConfig {
    ResponderConfig {
        system_prompt: SYSTEM_PROMPT.to_string(),
        unavailable_reply: UNAVAILABLE.to_string(),
        error_reply: ERROR_REPLY.to_string(),
        context_items: 2,
        history_turns: 4,
    }
}

pub async fn harness() -> Harness {
    let temp = TempDir::new().expect("tempdir");
    let settings = KnowledgeSettings {
        knowledge_db_path_override: Some(temp.path().join("knowledge.sqlite3")),
        ..Default::default()
    };
    let embedder = KeywordEmbedder::new();
    let knowledge = Arc::new(
        KnowledgeEngine::open_with_embedder(settings, embedder.clone())
            .await
            .expect("open knowledge"),
    );
    let transcripts = otvet_db::test_helpers::create_test_pool()
        .await
        .expect("transcript pool");
    let completion = FakeCompletion::new();
    let blacklist = BlacklistHandle::new(Blacklist::new(["spam_bot"]));
    let responder = Arc::new(Responder::new(
        responder_config(),
        Arc::clone(&knowledge),
        transcripts.clone(),
        completion.clone(),
        blacklist.clone(),
    ));

    Harness {
        knowledge,
        transcripts,
        embedder,
        completion,
        blacklist,
        responder,
        _temp: temp,
    }
}

/// Shop corpus used by the responder scenarios, returns ids in insertion order.
pub async fn seed_shop(knowledge: &KnowledgeEngine) -> Vec<i64> {
    let mut ids = Vec::new();
    for (category, topic, content) in [
        ("Shop", "Hours", "We open at 9 and close at 18"),
        ("Shop", "Prices", "Tea costs 2 and coffee costs 3"),
        ("Shop", "Delivery", "A courier handles delivery within the city"),
    ] {
        ids.push(
            knowledge
                .add_knowledge(category, topic, content)
                .await
                .unwrap(),
        );
    }
    ids
}

pub fn private_message(user_id: i64, username: Option<&str>, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: user_id,
        private_chat: true,
        sender_id: user_id,
        sender_is_bot: false,
        username: username.map(str::to_string),
        first_name: Some("Ann".to_string()),
        text: Some(text.to_string()),
    }
}
