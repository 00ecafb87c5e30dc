//! CLI binary: a stdin-driven companion conversation.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use seren::completion::openai::OpenAiChatClient;
use seren::session::SessionEvent;
use seren::speech::NullSynthesis;
use seren::translate::http::HttpTranslationClient;
use seren::{CompanionConfig, ConversationStore, SessionController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress noisy dependency logs by default; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seren=info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => CompanionConfig::from_file(Path::new(&path))?,
        None => CompanionConfig::default(),
    };
    if config.chat.api_key.is_none() {
        config.chat.api_key = std::env::var("OPENAI_API_KEY").ok();
    }

    let store = Arc::new(ConversationStore::open(&config.store.db_path)?);
    let completion = Arc::new(OpenAiChatClient::new(&config.chat)?);
    // The console build carries no voice engine.
    let mut controller =
        SessionController::new(&config, store, completion, Arc::new(NullSynthesis));
    if config.translation.enabled {
        let translator = HttpTranslationClient::new(&config.translation)?;
        controller = controller.with_translator(Arc::new(translator));
    }

    let handle = controller.handle();
    let session = tokio::spawn(controller.run());

    let mut events = handle.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Reply { text, spoken_text } => {
                    if spoken_text == text {
                        println!("companion: {text}");
                    } else {
                        println!("companion: {text}\n         ({spoken_text})");
                    }
                }
                SessionEvent::Error(error) => eprintln!("[{:?}] {}", error.kind, error.message),
                _ => {}
            }
        }
    });

    println!(
        "seren v{} — type a message, /quit to exit",
        env!("CARGO_PKG_VERSION")
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Err(error) = handle.submit_input(line) {
            eprintln!("rejected: {error}");
        }
    }

    handle.shutdown();
    let _ = session.await;
    Ok(())
}
