//! Live test for the OpenAI-compatible completion client.
//!
//! Run with: cargo test --features live-tests --test completion_live

#[cfg(feature = "live-tests")]
use otvet_core::{ChatTurn, CompletionSettings};
#[cfg(feature = "live-tests")]
use otvet_gateway::providers::Completion;
#[cfg(feature = "live-tests")]
use otvet_gateway::providers::openai_compatible::OpenAiCompatibleClient;

#[cfg(feature = "live-tests")]
#[tokio::test]
async fn test_live_completion_uses_history() {
    otvet_core::load_dotenv();

    let settings = CompletionSettings::default();
    let api_key = match std::env::var(&settings.api_key_env) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            eprintln!("{} not set; skipping completion live test.", settings.api_key_env);
            return;
        }
    };

    let client = OpenAiCompatibleClient::new(&settings, Some(api_key)).unwrap();
    let history = vec![
        ChatTurn::user("My favourite colour is teal."),
        ChatTurn::assistant("Noted, teal it is!"),
    ];
    let reply = client
        .complete(
            "Answer with a single word.",
            &history,
            "What is my favourite colour?",
        )
        .await
        .expect("completion failed");

    assert!(reply.to_lowercase().contains("teal"), "{reply}");
}
