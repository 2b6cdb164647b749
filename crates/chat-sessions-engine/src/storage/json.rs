//! JSON checkpoint file storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chat_sessions_core::{Checkpoint, CheckpointStore, StoreError};

/// Checkpoint file name inside the storage directory.
pub const CHECKPOINT_FILE: &str = "session.json";

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "CHAT_SESSIONS_PATH";

const APP_DIR: &str = "chat-sessions";

/// Durable checkpoint as a pretty-printed JSON file.
///
/// Writes go to a temp file in the same directory followed by a rename, so a
/// crash mid-write cannot corrupt the previous checkpoint.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Store at an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform config directory, honoring the
    /// [`STORAGE_DIR_ENV`] override.
    #[must_use]
    pub fn at_default_location() -> Self {
        Self::new(Self::storage_dir().join(CHECKPOINT_FILE))
    }

    fn storage_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(STORAGE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for JsonStore {
    async fn load(&self) -> Result<Option<Checkpoint>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(checkpoint)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
