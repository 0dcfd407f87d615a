use std::sync::Arc;

use chat_responder::channels::{ChatwootClient, ReplySink, webhook_routes};
use chat_responder::config::AppConfig;
use chat_responder::conversation::{ConversationStore, GameEngine};
use chat_responder::llm::create_completion_client;
use chat_responder::pipeline::{DecisionRouter, MessageProcessor};
use chat_responder::safety::AccessFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export CHATWOOT_BASE_URL=... CHATWOOT_ACCOUNT_ID=... CHATWOOT_API_KEY=...");
            eprintln!("  export OPENROUTER_API_KEY=...");
            std::process::exit(1);
        }
    };

    eprintln!("💬 Chat Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Primary model:  {}", config.upstream.primary_model);
    eprintln!("   Fallback model: {}", config.upstream.fallback_model);
    eprintln!("   Webhook: http://0.0.0.0:{}/", config.port);
    eprintln!("   Allowed senders: {}\n", config.responder.allowed_senders.len());

    if config.responder.allowed_senders.is_empty() {
        tracing::warn!("RESPONDER_ALLOWED_SENDERS is empty, every message will be ignored");
    }

    let store = Arc::new(ConversationStore::new(config.responder.memory_capacity));
    let games = Arc::new(GameEngine::new(config.responder.game_range));
    let completion = create_completion_client(&config.upstream)?;
    let router = DecisionRouter::new(&config.responder, store, games, completion)?;
    let access = AccessFilter::new(config.responder.allowed_senders.iter().cloned());
    let processor = Arc::new(MessageProcessor::new(access, router));
    let sink: Arc<dyn ReplySink> = Arc::new(ChatwootClient::new(&config.chatwoot));

    let app = webhook_routes(processor, sink);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
