//! Typed change events describing the most recent engine mutation.

use serde::{Deserialize, Serialize};

use crate::model::Session;

/// What kind of mutation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    SessionAdded,
    MessageAdded,
    SessionSwitched,
    /// Reserved; session deletion is not implemented by this engine.
    SessionRemoved,
}

/// Why the current session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    /// The user selected an existing session.
    SetChat,
    /// A freshly created session became current.
    AddChat,
}

impl SwitchReason {
    /// The event kind a switch with this reason raises.
    ///
    /// Session creation funnels through the switch path, so `AddChat` maps
    /// to [`ChangeKind::SessionAdded`] rather than `SessionSwitched`.
    #[must_use]
    pub fn change_kind(self) -> ChangeKind {
        match self {
            Self::SetChat => ChangeKind::SessionSwitched,
            Self::AddChat => ChangeKind::SessionAdded,
        }
    }

    /// Wire-format name of the reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetChat => "set_chat",
            Self::AddChat => "add_chat",
        }
    }
}

/// A notification describing the most recent mutation, for UI refresh.
///
/// The payload carries a snapshot of the mutated session; consumers of
/// `SessionAdded`/`SessionSwitched` are expected to re-derive full state from
/// the session list rather than rely on payload deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub session: Session,
}

impl ChangeEvent {
    /// Create a change event carrying a session snapshot.
    #[must_use]
    pub fn new(kind: ChangeKind, session: Session) -> Self {
        Self { kind, session }
    }
}
