//! The scope that owns one screen's pipeline.
//!
//! A [`NoteSession`] wires a [`NoteCollection`], a [`NotesView`] and a
//! [`NoteGateway`] together and runs user intents as fire-and-forget tasks.
//! Everything it started dies with it: dropping the session tears down the
//! store listener and aborts mutations that are still waiting for the store.
//! An aborted mutation is not rolled back; the store may still apply it.

use crate::{
    random_color_index, upcoming_reminders, ChecklistItem, CollectionState, DocumentStore,
    ErrorSignal, IdentityProvider, Note, NoteCollection, NoteGateway, NotesView,
    ReminderScheduler, SyncSettings, UndoAction, UndoSlot,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinSet;

pub struct NoteSession {
    // Declaration order is drop order: the view stops before its source.
    view: NotesView,
    collection: NoteCollection,
    gateway: Arc<NoteGateway>,
    errors: ErrorSignal,
    undo: Arc<UndoSlot>,
    settings: SyncSettings,
    tasks: Mutex<JoinSet<()>>,
}

impl NoteSession {
    /// Opens a session. Must be called from within a tokio runtime.
    pub fn start(
        store: Arc<dyn DocumentStore>,
        identity: &dyn IdentityProvider,
        settings: SyncSettings,
    ) -> Self {
        Self::start_with(store, identity, settings, None)
    }

    pub fn start_with(
        store: Arc<dyn DocumentStore>,
        identity: &dyn IdentityProvider,
        settings: SyncSettings,
        reminders: Option<Arc<dyn ReminderScheduler>>,
    ) -> Self {
        let errors = ErrorSignal::new();
        let collection = NoteCollection::spawn(
            store.clone(),
            identity.watch(),
            settings.collection.as_str(),
            errors.clone(),
        );
        let view = NotesView::spawn(collection.state(), settings.initial_query());
        let mut gateway = NoteGateway::new(
            store,
            identity.watch(),
            settings.collection.as_str(),
            errors.clone(),
        );
        if let Some(scheduler) = reminders {
            gateway = gateway.with_reminders(scheduler);
        }
        log::debug!("session started on collection {}", settings.collection);

        Self {
            view,
            collection,
            gateway: Arc::new(gateway),
            errors,
            undo: Arc::new(UndoSlot::new(settings.undo_window())),
            settings,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn view(&self) -> &NotesView {
        &self.view
    }

    pub fn gateway(&self) -> &NoteGateway {
        &self.gateway
    }

    pub fn errors(&self) -> &ErrorSignal {
        &self.errors
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn collection_state(&self) -> watch::Receiver<CollectionState> {
        self.collection.state()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.collection.is_loading()
    }

    /// Notes of the current snapshot with a reminder after `now`, soonest first.
    #[must_use]
    pub fn upcoming_reminders(&self, now: DateTime<Utc>) -> Vec<Note> {
        upcoming_reminders(&self.collection.snapshot(), now)
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().expect("Mutex poisoned");
        // Reap finished mutations so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Waits until every mutation started so far has resolved.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.tasks.lock().expect("Mutex poisoned"));
        while pending.join_next().await.is_some() {}
    }

    /// Aborts in-flight mutations and tears the session down.
    pub fn close(self) {
        self.tasks.lock().expect("Mutex poisoned").abort_all();
        log::debug!("session closed");
    }

    /// Saves a new note with a random palette color.
    pub fn add_note(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
        checklist: Option<Vec<ChecklistItem>>,
    ) {
        let mut draft = Note::draft(title, body, random_color_index(self.settings.palette_size));
        draft.checklist = checklist;
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.create_note(draft).await;
        });
    }

    /// Creates the note if it has never been saved, otherwise overwrites it.
    pub fn save_note(&self, note: Note) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            if note.id.is_some() {
                gateway.update(&note).await;
            } else {
                gateway.create_note(note).await;
            }
        });
    }

    pub fn toggle_completion(&self, note: Note) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.toggle_completion(&note).await;
        });
    }

    pub fn toggle_pin(&self, note: Note) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.toggle_pin(&note).await;
        });
    }

    pub fn toggle_archive(&self, note: Note) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.toggle_archive(&note).await;
        });
    }

    pub fn delete_note(&self, note: Note) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.delete(&note).await;
        });
    }

    pub fn pin_selected(&self, ids: BTreeSet<String>, value: bool) {
        let gateway = self.gateway.clone();
        self.spawn(async move {
            gateway.pin_many(&ids, value).await;
        });
    }

    /// Archives the selection and offers to unarchive it.
    pub fn archive_selected(&self, ids: BTreeSet<String>) {
        let Some(owner) = self.gateway.owner() else {
            log::warn!("no signed-in user, ignoring archive");
            return;
        };
        let gateway = self.gateway.clone();
        let undo = self.undo.clone();
        self.spawn(async move {
            if gateway.archive_many_in(&owner, &ids, true).await.is_applied() {
                undo.offer(UndoAction::Unarchive {
                    owner,
                    ids: ids.into_iter().collect(),
                });
            }
        });
    }

    /// Deletes the selection and offers to restore it as it is right now.
    pub fn delete_selected(&self, ids: BTreeSet<String>) {
        let Some(owner) = self.gateway.owner() else {
            log::warn!("no signed-in user, ignoring delete");
            return;
        };
        let prior: Vec<Note> = self
            .collection
            .snapshot()
            .iter()
            .filter(|n| n.id.as_ref().is_some_and(|id| ids.contains(id)))
            .cloned()
            .collect();
        let gateway = self.gateway.clone();
        let undo = self.undo.clone();
        self.spawn(async move {
            if gateway.delete_many_in(&owner, &ids).await.is_applied() {
                undo.offer(UndoAction::Restore {
                    owner,
                    notes: prior,
                });
            }
        });
    }

    /// Whether [`undo`](Self::undo) would do anything for the signed-in user.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.undo.is_pending(self.gateway.owner().as_ref())
    }

    /// Reverts the last bulk archive or delete if its window is still open.
    ///
    /// Returns `false` when there was nothing to undo, including an action
    /// taken by a user who is no longer signed in.
    pub fn undo(&self) -> bool {
        let Some(action) = self.undo.take(self.gateway.owner().as_ref()) else {
            return false;
        };
        log::info!("undoing {action:?}");
        let gateway = self.gateway.clone();
        self.spawn(async move {
            match action {
                UndoAction::Unarchive { owner, ids } => {
                    let ids: BTreeSet<String> = ids.into_iter().collect();
                    gateway.archive_many_in(&owner, &ids, false).await;
                }
                UndoAction::Restore { owner, notes } => {
                    gateway.restore_many_in(&owner, &notes).await;
                }
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields::keys;
    use crate::{
        creation_fields, CollectionPath, Document, DocumentPath, FieldValue, Fields,
        IdentityHandle, MemoryStore, NotesyncError, Result, SortOrder, WriteOp,
    };
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};

    /// Holds every `update` on the "server" until the gate opens. The write
    /// runs in its own task, so it lands even if the caller is gone.
    #[derive(Clone)]
    struct GatedStore {
        inner: MemoryStore,
        gate: Arc<Notify>,
        entered: Arc<Notify>,
        applied: Arc<Notify>,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                gate: Arc::new(Notify::new()),
                entered: Arc::new(Notify::new()),
                applied: Arc::new(Notify::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        fn subscribe(&self, collection: &CollectionPath) -> BoxStream<'static, Result<Vec<Document>>> {
            self.inner.subscribe(collection)
        }

        fn subscribe_document(
            &self,
            path: &DocumentPath,
        ) -> BoxStream<'static, Result<Option<Document>>> {
            self.inner.subscribe_document(path)
        }

        async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
            self.inner.add(collection, fields).await
        }

        async fn set(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
            self.inner.set(path, fields).await
        }

        async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
            let (tx, rx) = oneshot::channel();
            let store = self.clone();
            let path = path.clone();
            tokio::spawn(async move {
                store.gate.notified().await;
                let result = store.inner.update(&path, fields).await;
                let _ = tx.send(result);
                store.applied.notify_one();
            });
            self.entered.notify_one();
            rx.await
                .map_err(|_| NotesyncError::Write("connection lost".to_string()))?
        }

        async fn delete(&self, path: &DocumentPath) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
            self.inner.batch_write(ops).await
        }
    }

    /// Starts a session over a gated store and leaves one `toggle_pin` parked
    /// at the gate.
    async fn session_with_parked_pin() -> (GatedStore, DocumentPath, NoteSession) {
        let store = GatedStore::new();
        let path = CollectionPath::new("alice", "tasks");
        let id = store
            .inner
            .add(&path, creation_fields(&Note::draft("parked", "", 0)))
            .await
            .unwrap();
        let identity = IdentityHandle::signed_in("alice");
        let session = NoteSession::start(Arc::new(store.clone()), &identity, SyncSettings::default());
        let note = active_len(&session, 1).await[0].clone();

        session.toggle_pin(note);
        tokio::time::timeout(Duration::from_secs(2), store.entered.notified())
            .await
            .expect("update never reached the store");
        (store, path.doc(id), session)
    }

    async fn settle(store: &GatedStore) {
        tokio::time::timeout(Duration::from_secs(2), store.applied.notified())
            .await
            .expect("server write never completed");
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn active_len(session: &NoteSession, len: usize) -> Arc<Vec<Note>> {
        let mut rx = session.view().active();
        let list = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|l| l.len() == len))
            .await
            .expect("timed out waiting for active list")
            .unwrap()
            .clone();
        list
    }

    fn open_session() -> (Arc<MemoryStore>, IdentityHandle, NoteSession) {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityHandle::signed_in("alice");
        let session = NoteSession::start(store.clone(), &identity, SyncSettings::default());
        (store, identity, session)
    }

    #[tokio::test]
    async fn test_add_note_picks_color_in_palette() {
        let (_store, _identity, session) = open_session();
        session.add_note("hello", "", None);
        session.flush().await;

        let active = active_len(&session, 1).await;
        let color = active[0].color_index;
        assert!((0..session.settings().palette_size as i32).contains(&color));
    }

    #[tokio::test]
    async fn test_save_note_creates_then_updates() {
        let (store, _identity, session) = open_session();
        session.save_note(Note::draft("draft", "", 0));
        session.flush().await;
        let saved = active_len(&session, 1).await[0].clone();

        session.save_note(Note {
            title: "final".to_string(),
            ..saved
        });
        session.flush().await;
        assert_eq!(store.len(&crate::CollectionPath::new("alice", "tasks")), 1);
        let mut rx = session.view().active();
        rx.wait_for(|l| l.first().is_some_and(|n| n.title == "final"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_initial_query_comes_from_settings() {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityHandle::signed_in("alice");
        let settings = SyncSettings {
            default_sort_order: SortOrder::AlphabeticalAsc,
            ..SyncSettings::default()
        };
        let session = NoteSession::start(store, &identity, settings);
        assert_eq!(session.view().query().sort_order, SortOrder::AlphabeticalAsc);
    }

    #[tokio::test]
    async fn test_undo_without_action_is_noop() {
        let (_store, _identity, session) = open_session();
        assert!(!session.can_undo());
        assert!(!session.undo());
    }

    #[tokio::test]
    async fn test_close_cancels_pending_mutation_but_store_may_apply_it() {
        let (store, doc, session) = session_with_parked_pin().await;
        let errors = session.errors().clone();

        session.close();
        store.gate.notify_one();
        settle(&store).await;

        let fields = store.inner.document(&doc).unwrap();
        assert_eq!(fields.get(keys::IS_PINNED), Some(&FieldValue::Boolean(true)));
        assert_eq!(errors.current(), None);
    }

    #[tokio::test]
    async fn test_close_swallows_failure_of_cancelled_mutation() {
        let (store, doc, session) = session_with_parked_pin().await;
        let errors = session.errors().clone();

        session.close();
        store.inner.fail_writes("offline");
        store.gate.notify_one();
        settle(&store).await;

        let fields = store.inner.document(&doc).unwrap();
        assert_eq!(fields.get(keys::IS_PINNED), Some(&FieldValue::Boolean(false)));
        assert_eq!(errors.current(), None);
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let (store, _identity, session) = open_session();
        active_len(&session, 0).await;
        let path = crate::CollectionPath::new("alice", "tasks");
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.listener_count(&path) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        session.close();
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.listener_count(&path) != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
