//! Out-of-band, user-visible error string.
//!
//! Failures captured by the collection adapter and the mutation gateway end
//! up here as display text. The message stays until a caller clears it.

use crate::NotesyncError;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ErrorSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for ErrorSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, error: &NotesyncError) {
        log::warn!("{error}");
        self.tx.send_replace(Some(error.user_message()));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
