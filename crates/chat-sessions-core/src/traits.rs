//! Collaborator traits at the engine boundary.
//!
//! The engine owns session state and nothing else: replies come from a
//! [`ResponseGenerator`], display updates go to a [`Presenter`], app
//! descriptors come from an [`AppCatalog`], and durability goes through a
//! [`CheckpointStore`]. None of those capabilities are implemented behind
//! this boundary except the stores under `chat-sessions-engine`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::catalog::AppDescriptor;
use crate::event::ChangeEvent;
use crate::model::{Checkpoint, Session};

/// Checkpoint read/write error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Internal(String),
}

/// Trait for durable checkpoint backends.
///
/// Pure I/O, no business rules. The in-memory session collection is the
/// source of truth; the checkpoint is only a crash-recovery copy.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint. `Ok(None)` when none exists yet (first run).
    async fn load(&self) -> Result<Option<Checkpoint>, StoreError>;

    /// Write the checkpoint, atomically enough that a crash mid-write leaves
    /// the previous checkpoint intact.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}

/// Response generation error.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response generation failed: {0}")]
    Failed(String),
}

/// A finite, non-restartable sequence of text fragments whose concatenation
/// is the full reply so far.
pub type ChunkStream = BoxStream<'static, Result<String, GeneratorError>>;

/// External capability producing a reply as a chunked text stream.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Start generating a reply for the given conversation snapshot.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be opened; errors after the
    /// first chunk arrive through the stream itself.
    async fn stream(&self, session: &Session) -> Result<ChunkStream, GeneratorError>;
}

/// Display-side collaborator notified of engine state changes.
pub trait Presenter: Send + Sync {
    /// A mutation happened; redraw from current state.
    fn on_change(&self, event: &ChangeEvent);

    /// Cumulative (trimmed) partial content of the reply being streamed.
    fn on_stream_chunk(&self, partial: &str);

    /// A stream failed; recoverable, partial content was still committed.
    fn on_stream_error(&self, error: &str);

    /// Gate input submission while a response is in flight.
    fn set_input_enabled(&self, enabled: bool);
}

/// Lookup of external app descriptors, consulted only at session creation.
pub trait AppCatalog: Send + Sync {
    fn describe(&self, app_id: &str) -> Option<AppDescriptor>;
}
