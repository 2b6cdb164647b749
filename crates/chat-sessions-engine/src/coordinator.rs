//! Streaming coordinator: one in-flight generation per session.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use chat_sessions_core::{
    CheckpointStore, GeneratorError, Presenter, ResponseGenerator, Session,
};

use crate::repository::{RepositoryError, SessionRepository};

/// Appended to partial content committed after a mid-stream failure, so
/// callers can recognize an interrupted reply.
pub const STREAM_FAILURE_MARKER: &str = " [response interrupted]";

/// Coordinator error.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Backpressure: a second request while one is streaming is rejected,
    /// never queued.
    #[error("a response is already streaming for session: {0}")]
    AlreadyStreaming(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Phase of one streaming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Finalizing,
    Failed,
}

/// How a streaming request ended. Either way the accumulated content was
/// committed and input was re-enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed,
}

/// Handle to an in-flight streaming request.
///
/// The stream is not cancellable mid-flight: a request always runs to
/// `Finalizing` or `Failed` and commits what it accumulated, even if the
/// current session was switched away in the meantime.
#[derive(Debug)]
pub struct StreamHandle {
    message_id: String,
    timestamp: String,
    phase: Arc<StdMutex<StreamPhase>>,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// Id reserved for the assistant message being streamed.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Timestamp reserved for the assistant message being streamed.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Current phase of the request.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        *self.phase.lock().unwrap()
    }

    /// Wait for the request to finish.
    pub async fn join(self) -> StreamOutcome {
        self.task.await.unwrap_or(StreamOutcome::Failed)
    }
}

/// Drives streaming responses against the repository.
///
/// State machine per request: `Idle -> Requesting -> Streaming -> Finalizing
/// -> Idle` on success, with `Failed` replacing `Finalizing` when the
/// generator or transport breaks. Failure commits the partial accumulator
/// plus [`STREAM_FAILURE_MARKER`]; nothing here is fatal to the engine.
pub struct StreamCoordinator<S: CheckpointStore + 'static> {
    repository: Arc<SessionRepository<S>>,
    generator: Arc<dyn ResponseGenerator>,
    presenter: Arc<dyn Presenter>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<S: CheckpointStore + 'static> StreamCoordinator<S> {
    /// Create a coordinator over a repository and its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<SessionRepository<S>>,
        generator: Arc<dyn ResponseGenerator>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            repository,
            generator,
            presenter,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Begin streaming a response for a session.
    ///
    /// Reserves the assistant message identity up front (so the UI can render
    /// an empty placeholder), disables input submission, and spawns the
    /// streaming task. Returns a handle carrying the reserved identity.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::AlreadyStreaming`] while a generation is
    /// in flight for this session, or a repository error for unknown
    /// sessions and corrupted history.
    pub async fn begin_response(&self, session_id: &str) -> Result<StreamHandle, CoordinatorError> {
        let session = self
            .repository
            .get_session(session_id)
            .await
            .ok_or_else(|| RepositoryError::SessionNotFound(session_id.to_owned()))?;

        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(session_id.to_owned()) {
                return Err(CoordinatorError::AlreadyStreaming(session_id.to_owned()));
            }
        }

        let phase = Arc::new(StdMutex::new(StreamPhase::Requesting));
        let (message_id, timestamp) = match self.repository.reserve_assistant_message(session_id).await
        {
            Ok(identity) => identity,
            Err(e) => {
                self.in_flight.lock().await.remove(session_id);
                return Err(e.into());
            }
        };
        self.presenter.set_input_enabled(false);

        let task = tokio::spawn(run_stream(
            Arc::clone(&self.repository),
            Arc::clone(&self.generator),
            Arc::clone(&self.presenter),
            Arc::clone(&self.in_flight),
            session,
            message_id.clone(),
            timestamp.clone(),
            Arc::clone(&phase),
        ));

        Ok(StreamHandle {
            message_id,
            timestamp,
            phase,
            task,
        })
    }
}

// Input re-enable and in-flight release must happen on every exit path;
// keeping them here, outside the drive logic, guarantees forward progress.
#[allow(clippy::too_many_arguments)]
async fn run_stream<S: CheckpointStore + 'static>(
    repository: Arc<SessionRepository<S>>,
    generator: Arc<dyn ResponseGenerator>,
    presenter: Arc<dyn Presenter>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    session: Session,
    message_id: String,
    timestamp: String,
    phase: Arc<StdMutex<StreamPhase>>,
) -> StreamOutcome {
    let outcome = drive_stream(
        &repository,
        generator.as_ref(),
        presenter.as_ref(),
        &session,
        message_id,
        timestamp,
        &phase,
    )
    .await;

    presenter.set_input_enabled(true);
    in_flight.lock().await.remove(&session.id);
    set_phase(&phase, StreamPhase::Idle);
    outcome
}

async fn drive_stream<S: CheckpointStore>(
    repository: &SessionRepository<S>,
    generator: &dyn ResponseGenerator,
    presenter: &dyn Presenter,
    session: &Session,
    message_id: String,
    timestamp: String,
    phase: &Arc<StdMutex<StreamPhase>>,
) -> StreamOutcome {
    let mut content = String::new();
    let mut failure: Option<GeneratorError> = None;

    match generator.stream(session).await {
        Ok(mut chunks) => {
            set_phase(phase, StreamPhase::Streaming);
            while let Some(next) = chunks.next().await {
                match next {
                    Ok(chunk) => {
                        content.push_str(&chunk);
                        // Cumulative content, not the delta: the generator
                        // contract is that concatenated fragments form the
                        // full reply so far.
                        presenter.on_stream_chunk(content.trim());
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }
        Err(e) => failure = Some(e),
    }

    let outcome = if let Some(e) = failure {
        set_phase(phase, StreamPhase::Failed);
        tracing::error!("response stream for '{}' failed: {e}", session.id);
        content.push_str(STREAM_FAILURE_MARKER);
        presenter.on_stream_error(&e.to_string());
        StreamOutcome::Failed
    } else {
        set_phase(phase, StreamPhase::Finalizing);
        StreamOutcome::Completed
    };

    // Commit to the stream's own session even if the current session changed
    // mid-stream; partial content is never discarded.
    if let Err(e) = repository
        .append_assistant_message(&session.id, content, timestamp, message_id)
        .await
    {
        tracing::warn!("assistant commit for '{}' failed: {e}", session.id);
    }

    outcome
}

fn set_phase(phase: &Arc<StdMutex<StreamPhase>>, next: StreamPhase) {
    *phase.lock().unwrap() = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chat_sessions_core::{
        AppDescriptor, ChangeEvent, ChunkStream, Role, SwitchReason,
    };
    use tokio::sync::oneshot;

    struct ScriptedGenerator {
        chunks: Vec<Result<String, String>>,
    }

    impl ScriptedGenerator {
        fn ok(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok((*c).to_owned())).collect(),
            }
        }

        fn failing_after(chunks: &[&str], error: &str) -> Self {
            let mut scripted: Vec<Result<String, String>> =
                chunks.iter().map(|c| Ok((*c).to_owned())).collect();
            scripted.push(Err(error.to_owned()));
            Self { chunks: scripted }
        }
    }

    #[async_trait]
    impl ResponseGenerator for ScriptedGenerator {
        async fn stream(&self, _session: &Session) -> Result<ChunkStream, GeneratorError> {
            let chunks = self.chunks.clone();
            Ok(futures::stream::iter(
                chunks
                    .into_iter()
                    .map(|chunk| chunk.map_err(GeneratorError::Failed)),
            )
            .boxed())
        }
    }

    /// Generator whose single chunk is released by a oneshot, to hold a
    /// stream open while the test pokes at the engine.
    struct GatedGenerator {
        gate: StdMutex<Option<oneshot::Receiver<()>>>,
    }

    impl GatedGenerator {
        fn new() -> (Self, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            (
                Self {
                    gate: StdMutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    #[async_trait]
    impl ResponseGenerator for GatedGenerator {
        async fn stream(&self, _session: &Session) -> Result<ChunkStream, GeneratorError> {
            match self.gate.lock().unwrap().take() {
                Some(gate) => Ok(futures::stream::once(async move {
                    let _ = gate.await;
                    Ok("done".to_owned())
                })
                .boxed()),
                // Gate already used; later streams finish immediately.
                None => Ok(futures::stream::empty().boxed()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        partials: StdMutex<Vec<String>>,
        errors: StdMutex<Vec<String>>,
        input_enabled: StdMutex<Vec<bool>>,
        changes: StdMutex<Vec<ChangeEvent>>,
    }

    impl Presenter for RecordingPresenter {
        fn on_change(&self, event: &ChangeEvent) {
            self.changes.lock().unwrap().push(event.clone());
        }

        fn on_stream_chunk(&self, partial: &str) {
            self.partials.lock().unwrap().push(partial.to_owned());
        }

        fn on_stream_error(&self, error: &str) {
            self.errors.lock().unwrap().push(error.to_owned());
        }

        fn set_input_enabled(&self, enabled: bool) {
            self.input_enabled.lock().unwrap().push(enabled);
        }
    }

    async fn repository_with_session(name: &str) -> Arc<SessionRepository<MemoryStore>> {
        let repo = Arc::new(
            SessionRepository::load(MemoryStore::new())
                .await
                .expect("load"),
        );
        let app = AppDescriptor::new("scratchpad")
            .with_initial_message(Role::System, "You are a helpful assistant.");
        repo.create_session(name, &app).await.expect("create");
        repo
    }

    #[tokio::test]
    async fn chunks_accumulate_into_one_assistant_message() {
        let repo = repository_with_session("notes").await;
        let presenter = Arc::new(RecordingPresenter::default());
        let coordinator = StreamCoordinator::new(
            Arc::clone(&repo),
            Arc::new(ScriptedGenerator::ok(&["Hel", "lo"])),
            Arc::clone(&presenter) as Arc<dyn Presenter>,
        );

        let handle = coordinator.begin_response("notes").await.unwrap();
        assert_eq!(handle.message_id(), "notes-1");
        assert_eq!(handle.join().await, StreamOutcome::Completed);

        let session = repo.get_session("notes").await.unwrap();
        let assistants: Vec<_> = session
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content, "Hello");
        assert_eq!(assistants[0].id, "notes-1");

        assert_eq!(
            *presenter.partials.lock().unwrap(),
            vec!["Hel".to_owned(), "Hello".to_owned()]
        );
        assert_eq!(*presenter.input_enabled.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn failure_commits_partial_content_with_marker() {
        let repo = repository_with_session("notes").await;
        let presenter = Arc::new(RecordingPresenter::default());
        let coordinator = StreamCoordinator::new(
            Arc::clone(&repo),
            Arc::new(ScriptedGenerator::failing_after(&["Par"], "backend gone")),
            Arc::clone(&presenter) as Arc<dyn Presenter>,
        );

        let handle = coordinator.begin_response("notes").await.unwrap();
        assert_eq!(handle.join().await, StreamOutcome::Failed);

        let session = repo.get_session("notes").await.unwrap();
        let last = session.last_message().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, format!("Par{STREAM_FAILURE_MARKER}"));

        assert_eq!(presenter.errors.lock().unwrap().len(), 1);
        // Input is re-enabled even on failure.
        assert_eq!(*presenter.input_enabled.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn second_request_for_streaming_session_is_rejected() {
        let repo = repository_with_session("notes").await;
        let presenter = Arc::new(RecordingPresenter::default());
        let (generator, release) = GatedGenerator::new();
        let coordinator = StreamCoordinator::new(
            Arc::clone(&repo),
            Arc::new(generator),
            Arc::clone(&presenter) as Arc<dyn Presenter>,
        );

        let handle = coordinator.begin_response("notes").await.unwrap();
        let err = coordinator.begin_response("notes").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::AlreadyStreaming(id) if id == "notes"));

        release.send(()).unwrap();
        handle.join().await;

        // Released after completion: a new request is accepted again.
        let handle = coordinator.begin_response("notes").await.unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let repo = repository_with_session("notes").await;
        let presenter = Arc::new(RecordingPresenter::default());
        let coordinator = StreamCoordinator::new(
            repo,
            Arc::new(ScriptedGenerator::ok(&["x"])),
            presenter as Arc<dyn Presenter>,
        );

        let err = coordinator.begin_response("missing-id").await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Repository(RepositoryError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn switching_sessions_mid_stream_still_commits_to_origin() {
        let repo = repository_with_session("origin").await;
        let app = AppDescriptor::new("scratchpad");
        repo.create_session("elsewhere", &app).await.unwrap();
        repo.set_current_session("origin", SwitchReason::SetChat)
            .await
            .unwrap();

        let presenter = Arc::new(RecordingPresenter::default());
        let (generator, release) = GatedGenerator::new();
        let coordinator = StreamCoordinator::new(
            Arc::clone(&repo),
            Arc::new(generator),
            Arc::clone(&presenter) as Arc<dyn Presenter>,
        );

        let handle = coordinator.begin_response("origin").await.unwrap();
        repo.set_current_session("elsewhere", SwitchReason::SetChat)
            .await
            .unwrap();

        release.send(()).unwrap();
        assert_eq!(handle.join().await, StreamOutcome::Completed);

        let origin = repo.get_session("origin").await.unwrap();
        assert_eq!(origin.last_message().unwrap().content, "done");
        let elsewhere = repo.get_session("elsewhere").await.unwrap();
        assert!(elsewhere.messages.is_empty());
    }
}
