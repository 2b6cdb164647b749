//! Session state engine: repository, streaming coordinator, and storage.
//!
//! Provides:
//! - `SessionRepository` - owns the session collection and engine state
//! - `StreamCoordinator` - drives one streaming response per session
//! - Storage implementations (JSON checkpoint, memory)

pub mod coordinator;
pub mod repository;
pub mod storage;

pub use coordinator::{
    CoordinatorError, STREAM_FAILURE_MARKER, StreamCoordinator, StreamHandle, StreamOutcome,
    StreamPhase,
};
pub use repository::{RepositoryError, SessionRepository};
pub use storage::{JsonStore, MemoryStore};
