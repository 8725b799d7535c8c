//! Live subscription to the signed-in user's notes.
//!
//! A [`NoteCollection`] runs one background task that follows the identity
//! signal. Each distinct user id starts a new *generation*: the previous store
//! listener is dropped, an empty state is published, and a listener on the new
//! user's collection is opened. Everything the old listener had buffered is
//! discarded unread, so one user's notes can never surface after a switch.

use crate::{note_from_document, CollectionPath, Document, DocumentStore, ErrorSignal, Note, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The latest snapshot of one subscription generation.
#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    /// User the snapshot belongs to; `None` when signed out.
    pub user_id: Option<String>,
    /// Increments on every identity change.
    pub generation: u64,
    pub notes: Arc<Vec<Note>>,
    /// `true` until the first snapshot (or an error) of this generation arrives.
    pub loading: bool,
}

type SnapshotStream = BoxStream<'static, Result<Vec<Document>>>;

pub struct NoteCollection {
    state: watch::Receiver<CollectionState>,
    task: JoinHandle<()>,
}

impl NoteCollection {
    /// Starts following `identity`. Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        identity: watch::Receiver<Option<String>>,
        collection: impl Into<String>,
        errors: ErrorSignal,
    ) -> Self {
        let (tx, state) = watch::channel(CollectionState::default());
        let task = tokio::spawn(run(store, identity, collection.into(), tx, errors));
        Self { state, task }
    }

    /// A receiver of every published state; clones share the one listener.
    pub fn state(&self) -> watch::Receiver<CollectionState> {
        self.state.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Note>> {
        self.state.borrow().notes.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }
}

impl Drop for NoteCollection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn decode(docs: &[Document]) -> Vec<Note> {
    docs.iter()
        .filter_map(|doc| match note_from_document(doc) {
            Ok(note) => Some(note),
            Err(e) => {
                log::warn!("skipping document: {e}");
                None
            }
        })
        .collect()
}

async fn next_snapshot(stream: &mut Option<SnapshotStream>) -> Option<Result<Vec<Document>>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    mut identity: watch::Receiver<Option<String>>,
    collection: String,
    tx: watch::Sender<CollectionState>,
    errors: ErrorSignal,
) {
    let mut user = identity.borrow_and_update().clone();
    let mut identity_open = true;
    let mut generation = 0;

    loop {
        generation += 1;
        tx.send_replace(CollectionState {
            user_id: user.clone(),
            generation,
            notes: Arc::new(Vec::new()),
            loading: user.is_some(),
        });

        let mut snapshots: Option<SnapshotStream> = user.as_ref().map(|uid| {
            let path = CollectionPath::new(uid.as_str(), collection.as_str());
            log::debug!("subscribing to {path} (generation {generation})");
            store.subscribe(&path)
        });

        loop {
            if !identity_open && snapshots.is_none() {
                log::debug!("identity source closed and no listener left, stopping");
                return;
            }

            tokio::select! {
                biased;

                changed = identity.changed(), if identity_open => {
                    if changed.is_err() {
                        identity_open = false;
                        continue;
                    }
                    let next = identity.borrow_and_update().clone();
                    if next == user {
                        continue;
                    }
                    log::debug!("identity changed, dropping generation {generation}");
                    user = next;
                    break;
                }

                item = next_snapshot(&mut snapshots) => match item {
                    Some(Ok(docs)) => {
                        let notes = Arc::new(decode(&docs));
                        log::debug!("snapshot with {} notes (generation {generation})", notes.len());
                        tx.send_modify(|state| {
                            state.notes = notes;
                            state.loading = false;
                        });
                    }
                    Some(Err(e)) => {
                        // Keep the last good snapshot; retry only on the next identity change.
                        errors.publish(&e);
                        tx.send_modify(|state| state.loading = false);
                        snapshots = None;
                    }
                    None => {
                        log::debug!("listener ended (generation {generation})");
                        tx.send_modify(|state| state.loading = false);
                        snapshots = None;
                    }
                },
            }
        }

        // Tear down the old listener before the next generation subscribes.
        drop(snapshots);
    }
}
