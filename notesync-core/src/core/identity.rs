//! Identity collaborator.
//!
//! The pipeline never asks "who is signed in" directly; it watches an
//! [`IdentityProvider`] and reacts to every change of the current user id,
//! including transitions to and from "nobody".

use std::sync::Arc;
use tokio::sync::watch;

/// Source of the current user id (`None` when signed out).
pub trait IdentityProvider: Send + Sync {
    fn watch(&self) -> watch::Receiver<Option<String>>;
}

/// An identity provider driven by explicit calls.
///
/// Auth integrations forward their state-change callbacks into
/// [`sign_in`](Self::sign_in) / [`sign_out`](Self::sign_out); tests use it to
/// script identity sequences.
#[derive(Clone)]
pub struct IdentityHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl IdentityHandle {
    pub fn new(initial: Option<String>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        log::info!("identity changed to {user_id}");
        self.tx.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        log::info!("identity cleared");
        self.tx.send_replace(None);
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }
}

impl IdentityProvider for IdentityHandle {
    fn watch(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
