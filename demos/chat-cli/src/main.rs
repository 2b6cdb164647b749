//! Scripted console demo for the session state engine.
//!
//! Run with: cargo run -p chat-cli-demo
//!
//! Replays a short conversation through a canned word-by-word generator,
//! persisting to `./demo-data/session.json`. Run it twice to see the
//! checkpoint reload.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chat_sessions_core::{
    AppCatalog, AppDescriptor, ChangeEvent, ChunkStream, GeneratorError, Presenter,
    ResponseGenerator, Role, Session, StaticCatalog, SwitchReason,
};
use chat_sessions_engine::{JsonStore, SessionRepository, StreamCoordinator};
use futures::StreamExt;

/// Yields a fixed reply word by word with a small delay.
struct CannedGenerator {
    reply: String,
}

#[async_trait]
impl ResponseGenerator for CannedGenerator {
    async fn stream(&self, _session: &Session) -> Result<ChunkStream, GeneratorError> {
        let words: Vec<String> = self
            .reply
            .split_inclusive(' ')
            .map(ToOwned::to_owned)
            .collect();
        Ok(futures::stream::iter(words)
            .then(|word| async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok(word)
            })
            .boxed())
    }
}

struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn on_change(&self, event: &ChangeEvent) {
        println!("-- {:?}: {}", event.kind, event.session.id);
    }

    fn on_stream_chunk(&self, partial: &str) {
        print!("\r{partial}");
        let _ = std::io::stdout().flush();
    }

    fn on_stream_error(&self, error: &str) {
        eprintln!("\nstream error: {error}");
    }

    fn set_input_enabled(&self, enabled: bool) {
        tracing::debug!("input enabled: {enabled}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let catalog = StaticCatalog::new(vec![
        AppDescriptor::new("scratchpad")
            .with_initial_message(Role::System, "You are a helpful assistant."),
    ]);
    let app = catalog
        .describe("scratchpad")
        .ok_or_else(|| anyhow::anyhow!("app 'scratchpad' not in catalog"))?;

    let repository = Arc::new(SessionRepository::load(JsonStore::new("demo-data/session.json")).await?);
    let presenter = Arc::new(ConsolePresenter);
    let coordinator = StreamCoordinator::new(
        Arc::clone(&repository),
        Arc::new(CannedGenerator {
            reply: "The engine keeps every session in one JSON checkpoint and \
                    streams replies chunk by chunk into the current session."
                .to_owned(),
        }),
        Arc::clone(&presenter) as Arc<dyn Presenter>,
    );

    let session_name = "demo";
    if repository.session_exists(session_name).await {
        repository
            .set_current_session(session_name, SwitchReason::SetChat)
            .await?;
    } else {
        repository.create_session(session_name, &app).await?;
    }
    repository.drain_changes(presenter.as_ref());

    repository
        .append_user_message("How does persistence work?")
        .await?;
    repository.drain_changes(presenter.as_ref());

    let handle = coordinator.begin_response(session_name).await?;
    let outcome = handle.join().await;
    println!("\n-- stream finished: {outcome:?}");

    println!("\nConversation so far:");
    for message in repository
        .messages_for_current_session()
        .await
        .unwrap_or_default()
    {
        println!("  [{}] {:?}: {}", message.timestamp, message.role, message.content);
    }

    Ok(())
}
