//! Session repository: the single owner of conversation state.

use chat_sessions_core::{
    AppDescriptor, ChangeEvent, ChangeKind, ChangeNotifier, Checkpoint, CheckpointStore, IdError,
    Message, Presenter, Role, Session, StoreError, SwitchReason, ids,
};
use tokio::sync::Mutex;

/// Repository error.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session already exists: {0}")]
    DuplicateSession(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("no active session")]
    NoActiveSession,
    #[error(transparent)]
    MalformedId(#[from] IdError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct Inner {
    sessions: Vec<Session>,
    current_session_id: Option<String>,
    sidebar_scrollpos: u32,
}

impl Inner {
    fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            last_session: self.current_session_id.clone(),
            sidebar_scrollpos: self.sidebar_scrollpos,
            sessions: self.sessions.clone(),
        }
    }
}

/// In-memory collection of sessions, checkpointed through a
/// [`CheckpointStore`] after every mutation.
///
/// All mutating operations hold one lock from identifier generation through
/// persist, so append order equals call order and message-id suffixes stay
/// strictly increasing even when user appends interleave with a streaming
/// commit.
pub struct SessionRepository<S: CheckpointStore> {
    store: S,
    inner: Mutex<Inner>,
    notifier: ChangeNotifier,
}

impl<S: CheckpointStore> SessionRepository<S> {
    /// Load the repository from the store's checkpoint.
    ///
    /// A missing checkpoint starts an empty collection; a read failure aborts
    /// with no state constructed.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Store`] if the checkpoint cannot be read.
    pub async fn load(store: S) -> Result<Self, RepositoryError> {
        let checkpoint = store.load().await?.unwrap_or_default();

        let mut current_session_id = checkpoint.last_session;
        if let Some(ref id) = current_session_id {
            if !checkpoint.sessions.iter().any(|session| &session.id == id) {
                tracing::warn!("checkpoint references unknown session '{id}', clearing");
                current_session_id = None;
            }
        }

        Ok(Self {
            store,
            inner: Mutex::new(Inner {
                sessions: checkpoint.sessions,
                current_session_id,
                sidebar_scrollpos: checkpoint.sidebar_scrollpos,
            }),
            notifier: ChangeNotifier::new(),
        })
    }

    /// The single-slot change mailbox.
    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Forward the pending change event (if any) to the presenter.
    ///
    /// This is the poll step: call it after an external redraw signal.
    pub fn drain_changes(&self, presenter: &dyn Presenter) {
        if let Some(event) = self.notifier.consume() {
            presenter.on_change(&event);
        }
    }

    /// Create a session seeded from an app descriptor and make it current.
    ///
    /// Raises `SessionAdded`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::DuplicateSession`] if `name` is already
    /// taken (case-sensitive exact match); the collection is left unchanged.
    pub async fn create_session(
        &self,
        name: &str,
        app: &AppDescriptor,
    ) -> Result<Session, RepositoryError> {
        let mut inner = self.inner.lock().await;
        if inner.session(name).is_some() {
            return Err(RepositoryError::DuplicateSession(name.to_owned()));
        }

        let timestamp = ids::timestamp();
        let message_ids = ids::initial_message_ids(name, app.initial_messages.len());
        let messages = app
            .initial_messages
            .iter()
            .zip(message_ids)
            .map(|(template, id)| {
                Message::new(template.role, template.content.clone(), timestamp.clone(), id)
            })
            .collect();

        let session = Session {
            id: name.to_owned(),
            app_id: app.id.clone(),
            scroll_pos: 0,
            messages,
        };
        inner.sessions.push(session.clone());
        inner.current_session_id = Some(name.to_owned());
        tracing::debug!("session '{name}' created from app '{}'", app.id);

        self.notifier.raise(ChangeEvent::new(
            SwitchReason::AddChat.change_kind(),
            session.clone(),
        ));
        self.persist(&inner).await?;
        Ok(session)
    }

    /// Snapshot of one session.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        self.inner.lock().await.session(id).cloned()
    }

    /// Snapshot of all sessions, in creation order.
    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.lock().await.sessions.clone()
    }

    /// Number of sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Whether a session with this exact name exists.
    pub async fn session_exists(&self, name: &str) -> bool {
        self.inner.lock().await.session(name).is_some()
    }

    /// Id of the current session, if one is set.
    pub async fn current_session_id(&self) -> Option<String> {
        self.inner.lock().await.current_session_id.clone()
    }

    /// Snapshot of the current session.
    pub async fn current_session(&self) -> Option<Session> {
        let inner = self.inner.lock().await;
        let id = inner.current_session_id.as_deref()?;
        inner.session(id).cloned()
    }

    /// Position of the current session in the session list.
    pub async fn current_session_index(&self) -> Option<usize> {
        let inner = self.inner.lock().await;
        let id = inner.current_session_id.as_deref()?;
        inner.sessions.iter().position(|session| session.id == id)
    }

    /// Messages of the current session.
    pub async fn messages_for_current_session(&self) -> Option<Vec<Message>> {
        self.current_session().await.map(|session| session.messages)
    }

    /// Append a user message to the current session.
    ///
    /// Id generation and append happen under one lock; persists and raises
    /// `MessageAdded`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NoActiveSession`] without a current
    /// session, or [`RepositoryError::MalformedId`] on corrupted history.
    pub async fn append_user_message(
        &self,
        content: impl Into<String> + Send,
    ) -> Result<Message, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .current_session_id
            .clone()
            .ok_or(RepositoryError::NoActiveSession)?;
        let session = inner
            .session_mut(&current)
            .ok_or_else(|| RepositoryError::SessionNotFound(current.clone()))?;

        let id = ids::next_message_id(session)?;
        let message = Message::new(Role::User, content, ids::timestamp(), id);
        session.messages.push(message.clone());
        let snapshot = session.clone();

        self.notifier
            .raise(ChangeEvent::new(ChangeKind::MessageAdded, snapshot));
        self.persist(&inner).await?;
        Ok(message)
    }

    /// Generate the identity of the assistant placeholder before streaming
    /// begins, so the UI can render it empty immediately.
    ///
    /// # Errors
    /// Returns [`RepositoryError::SessionNotFound`] for an unknown session,
    /// or [`RepositoryError::MalformedId`] on corrupted history.
    pub async fn reserve_assistant_message(
        &self,
        session_id: &str,
    ) -> Result<(String, String), RepositoryError> {
        let inner = self.inner.lock().await;
        let session = inner
            .session(session_id)
            .ok_or_else(|| RepositoryError::SessionNotFound(session_id.to_owned()))?;
        Ok((ids::next_message_id(session)?, ids::timestamp()))
    }

    /// Commit a pre-identified assistant message.
    ///
    /// Raises no change event: the placeholder was already observed through
    /// the streaming path, and double-notifying would double-redraw. The
    /// session is named explicitly so a stream whose session was switched
    /// away from still commits to its own session.
    ///
    /// # Errors
    /// Returns [`RepositoryError::SessionNotFound`] for an unknown session.
    pub async fn append_assistant_message(
        &self,
        session_id: &str,
        content: impl Into<String> + Send,
        timestamp: String,
        id: String,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .session_mut(session_id)
            .ok_or_else(|| RepositoryError::SessionNotFound(session_id.to_owned()))?;
        session
            .messages
            .push(Message::new(Role::Assistant, content, timestamp, id));
        self.persist(&inner).await
    }

    /// Make a session current, raising an event tagged with `reason`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::SessionNotFound`] if `id` is absent; the
    /// current session is left untouched.
    pub async fn set_current_session(
        &self,
        id: &str,
        reason: SwitchReason,
    ) -> Result<Session, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .session(id)
            .cloned()
            .ok_or_else(|| RepositoryError::SessionNotFound(id.to_owned()))?;
        inner.current_session_id = Some(id.to_owned());
        tracing::debug!("current session -> '{id}' ({})", reason.as_str());

        self.notifier
            .raise(ChangeEvent::new(reason.change_kind(), session.clone()));
        self.persist(&inner).await?;
        Ok(session)
    }

    /// Persisted scroll position of a session. No change event.
    ///
    /// # Errors
    /// Returns [`RepositoryError::SessionNotFound`] for an unknown session.
    pub async fn set_scroll_position(
        &self,
        session_id: &str,
        position: u32,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .session_mut(session_id)
            .ok_or_else(|| RepositoryError::SessionNotFound(session_id.to_owned()))?;
        session.scroll_pos = position;
        self.persist(&inner).await
    }

    /// Persisted sidebar scroll position. No change event.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Store`] if the checkpoint write fails.
    pub async fn set_sidebar_scroll_position(&self, position: u32) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        inner.sidebar_scrollpos = position;
        self.persist(&inner).await
    }

    /// Persisted sidebar scroll position.
    pub async fn sidebar_scroll_position(&self) -> u32 {
        self.inner.lock().await.sidebar_scrollpos
    }

    // Write failures do not roll the mutation back; the in-memory state is
    // the source of truth and the checkpoint is only a crash-recovery copy.
    async fn persist(&self, inner: &Inner) -> Result<(), RepositoryError> {
        if let Err(e) = self.store.save(&inner.checkpoint()).await {
            tracing::warn!("checkpoint write failed, in-memory state retained: {e}");
            return Err(e.into());
        }
        Ok(())
    }
}
