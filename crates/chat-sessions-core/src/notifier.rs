//! Single-slot change mailbox.

use std::sync::Mutex;

use crate::event::ChangeEvent;

/// Holds at most one pending change event.
///
/// `raise` overwrites any unread event; consumers poll after being externally
/// signaled (e.g. a UI redraw tick). If two mutations land before a poll only
/// the second is observed. That loss is by contract: consumers re-derive full
/// state from the session list instead of replaying event deltas.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    slot: Mutex<Option<ChangeEvent>>,
}

impl ChangeNotifier {
    /// Create an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, replacing any unread one.
    pub fn raise(&self, event: ChangeEvent) {
        tracing::trace!("change raised: {:?}", event.kind);
        *self.slot.lock().unwrap() = Some(event);
    }

    /// Most recent event without clearing the slot.
    #[must_use]
    pub fn peek(&self) -> Option<ChangeEvent> {
        self.slot.lock().unwrap().clone()
    }

    /// Take the most recent event, leaving the slot empty.
    #[must_use]
    pub fn consume(&self) -> Option<ChangeEvent> {
        self.slot.lock().unwrap().take()
    }
}
