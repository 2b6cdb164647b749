//! In-memory checkpoint storage.

use std::sync::RwLock;

use async_trait::async_trait;
use chat_sessions_core::{Checkpoint, CheckpointStore, StoreError};

/// In-memory storage implementation.
///
/// Useful for development and tests. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkpoint: RwLock<Option<Checkpoint>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a checkpoint.
    #[must_use]
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: RwLock::new(Some(checkpoint)),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self
            .checkpoint
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        *self
            .checkpoint
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))? = Some(checkpoint.clone());
        Ok(())
    }
}
