//! Message identifier generation and display timestamps.

use chrono::Local;
use thiserror::Error;

use crate::model::Session;

/// Fixed, locale-independent display format (minute granularity).
pub const TIMESTAMP_FORMAT: &str = "%y.%m.%d %H:%M";

/// Identifier error.
#[derive(Debug, Error)]
pub enum IdError {
    /// A stored message id does not match the `<prefix>-<integer>` shape.
    /// Surfaced rather than defaulted; silent defaulting risks id collisions.
    #[error("malformed message id: {0:?}")]
    Malformed(String),
}

/// Next message id for a session: `<sessionId>-<n>`.
///
/// `n` is one past the numerically highest existing suffix, not the message
/// count, so a history with gaps still yields fresh ids. An empty session
/// starts at suffix `0`.
///
/// # Errors
/// Returns [`IdError::Malformed`] if any stored id lacks a numeric suffix.
pub fn next_message_id(session: &Session) -> Result<String, IdError> {
    let mut highest: Option<u64> = None;
    for message in &session.messages {
        let suffix = parse_suffix(&message.id)?;
        highest = Some(highest.map_or(suffix, |h| h.max(suffix)));
    }
    let next = highest.map_or(0, |h| h + 1);
    Ok(format!("{}-{next}", session.id))
}

/// Seed `count` ids starting at suffix `0` for a freshly created session.
#[must_use]
pub fn initial_message_ids(session_name: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{session_name}-{i}")).collect()
}

/// Current display timestamp. Not unique; purely for rendering.
#[must_use]
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

// Suffix is taken from the last '-' so session names may themselves
// contain dashes.
fn parse_suffix(id: &str) -> Result<u64, IdError> {
    id.rsplit_once('-')
        .and_then(|(_, suffix)| suffix.parse().ok())
        .ok_or_else(|| IdError::Malformed(id.to_owned()))
}
