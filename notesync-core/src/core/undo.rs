//! Client-side undo for bulk archive and delete.
//!
//! The store has no tombstones. Undoing a delete re-inserts the notes as they
//! were, and undoing an archive flips the flag back. Only the most recent
//! action is offered, and only until its window closes. An action belongs to
//! the collection it was taken in and is never replayed into another one.

use crate::{CollectionPath, Note};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// Sets `is_archived` back to false. The pin state is not restored.
    Unarchive {
        owner: CollectionPath,
        ids: Vec<String>,
    },
    /// Re-inserts deleted notes under their original ids.
    Restore {
        owner: CollectionPath,
        notes: Vec<Note>,
    },
}

impl UndoAction {
    /// Collection the reverted action was applied to.
    #[must_use]
    pub fn owner(&self) -> &CollectionPath {
        match self {
            Self::Unarchive { owner, .. } | Self::Restore { owner, .. } => owner,
        }
    }
}

#[derive(Debug)]
pub struct UndoSlot {
    window: Duration,
    pending: Mutex<Option<(UndoAction, Instant)>>,
}

impl UndoSlot {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Replaces whatever was offered before.
    pub fn offer(&self, action: UndoAction) {
        *self.pending.lock().expect("Mutex poisoned") = Some((action, Instant::now()));
    }

    /// Takes the pending action if its window is still open and it belongs to
    /// `current`. A pending action of another owner is discarded.
    pub fn take(&self, current: Option<&CollectionPath>) -> Option<UndoAction> {
        let (action, offered_at) = self.pending.lock().expect("Mutex poisoned").take()?;
        if offered_at.elapsed() > self.window {
            log::debug!("undo window closed");
            return None;
        }
        if current != Some(action.owner()) {
            log::warn!("discarding undo for {}: identity changed", action.owner());
            return None;
        }
        Some(action)
    }

    #[must_use]
    pub fn is_pending(&self, current: Option<&CollectionPath>) -> bool {
        self.pending
            .lock()
            .expect("Mutex poisoned")
            .as_ref()
            .is_some_and(|(action, at)| {
                at.elapsed() <= self.window && current == Some(action.owner())
            })
    }
}
