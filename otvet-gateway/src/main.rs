use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use otvet_core::{Blacklist, Config};
use otvet_db::OtvetDbPool;
use otvet_gateway::providers::openai_compatible::OpenAiCompatibleClient;
use otvet_gateway::telegram;
use otvet_gateway::{
    AdminBot, BlacklistHandle, Responder, ResponderConfig, RestartTarget, SshTmuxController,
};
use otvet_knowledge::KnowledgeEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env may carry RUST_LOG
    otvet_core::load_dotenv();

    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = &config.settings;
    info!(
        model = %settings.completion.model,
        embedding_model = %settings.knowledge.embedding_model,
        "configuration loaded"
    );

    // Initialize databases
    let transcripts = OtvetDbPool::open(&settings.transcript_db_path()?).await?;
    info!("transcript database initialized");

    // Migration and seeding finish before any bot starts polling
    let knowledge = Arc::new(KnowledgeEngine::open(settings.resolved_knowledge()).await?);
    let report = knowledge.startup_report();
    info!(
        added_column = report.added_embedding_column,
        invalidated = report.invalidated,
        embedded = report.embedded,
        "knowledge base ready"
    );

    let completion = Arc::new(OpenAiCompatibleClient::new(
        &settings.completion,
        config.completion_api_key().map(str::to_string),
    )?);
    let blacklist = BlacklistHandle::new(Blacklist::new(&settings.responder.blacklist));
    let responder = Arc::new(Responder::new(
        ResponderConfig::from_settings(settings),
        Arc::clone(&knowledge),
        transcripts.clone(),
        completion,
        blacklist.clone(),
    ));

    let poll_timeout = Duration::from_secs(settings.telegram.poll_timeout_seconds);
    let mut tasks = Vec::new();

    if let (true, Some(token)) = (config.responder_enabled(), config.responder_bot_token()) {
        let bot = telegram::build_bot(&settings.telegram.api_base, token, poll_timeout)?;
        let handler = Arc::clone(&responder);
        tasks.push(tokio::spawn(telegram::run_polling(
            "responder",
            bot,
            handler,
            poll_timeout,
        )));
        info!("responder bot started");
    } else {
        info!("responder bot not configured (set OTVET_RESPONDER_BOT_TOKEN to enable)");
    }

    if let (true, Some(token)) = (config.admin_bot_enabled(), config.admin_bot_token()) {
        let restart = match SshTmuxController::from_settings(&settings.process) {
            Some(controller) => {
                let host = controller.host().to_string();
                Some(RestartTarget::new(Arc::new(controller), &host, &settings.process))
            }
            None => {
                warn!("[process] host not set; /restart is disabled");
                None
            }
        };
        let admin = Arc::new(AdminBot::new(
            settings.admin.admin_ids.iter().copied(),
            Arc::clone(&knowledge),
            transcripts.clone(),
            Arc::clone(&responder),
            blacklist.clone(),
            restart,
        ));
        let bot = telegram::build_bot(&settings.telegram.api_base, token, poll_timeout)?;
        tasks.push(tokio::spawn(telegram::run_polling(
            "admin",
            bot,
            admin,
            poll_timeout,
        )));
        info!(admins = settings.admin.admin_ids.len(), "admin bot started");
    } else {
        info!("admin bot not configured (set OTVET_ADMIN_BOT_TOKEN to enable)");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");

    for task in tasks {
        task.abort();
    }
    transcripts.close().await;
    knowledge.pool().close().await;

    Ok(())
}
