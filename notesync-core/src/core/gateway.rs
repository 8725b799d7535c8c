//! User intents turned into store writes.
//!
//! Operations resolve the signed-in user at call time, except the `*_in`
//! variants which write to an owner fixed by the caller. Field maps are built
//! through the [`fields`](crate::core::fields) projections.
//! Failures never escape as `Err`: they are published on the [`ErrorSignal`]
//! and reported as [`MutationOutcome::Failed`]. Nothing is rolled back or
//! retried here.

use crate::{
    creation_fields, patch_fields, restore_fields, updatable_fields, ChecklistItem, CollectionPath,
    DocumentStore, ErrorSignal, Note, NotePatch, NotesyncError, Reminder, ReminderScheduler,
    WriteOp,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Result of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T = ()> {
    /// The store acknowledged the write.
    Applied(T),
    /// Nothing was written: empty input, unsaved note, or nobody signed in.
    Skipped,
    /// The store rejected the write; the message was also published.
    Failed(String),
}

impl<T> MutationOutcome<T> {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(v) => Some(v),
            _ => None,
        }
    }
}

pub struct NoteGateway {
    store: Arc<dyn DocumentStore>,
    identity: watch::Receiver<Option<String>>,
    collection: String,
    errors: ErrorSignal,
    reminders: Option<Arc<dyn ReminderScheduler>>,
}

impl NoteGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: watch::Receiver<Option<String>>,
        collection: impl Into<String>,
        errors: ErrorSignal,
    ) -> Self {
        Self {
            store,
            identity,
            collection: collection.into(),
            errors,
            reminders: None,
        }
    }

    #[must_use]
    pub fn with_reminders(mut self, scheduler: Arc<dyn ReminderScheduler>) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    /// Collection of the user signed in right now, if any.
    #[must_use]
    pub fn owner(&self) -> Option<CollectionPath> {
        self.identity
            .borrow()
            .as_deref()
            .map(|uid| CollectionPath::new(uid, self.collection.as_str()))
    }

    fn collection(&self) -> Option<CollectionPath> {
        let owner = self.owner();
        if owner.is_none() {
            log::warn!("no signed-in user, ignoring mutation");
        }
        owner
    }

    fn fail<T>(&self, error: NotesyncError) -> MutationOutcome<T> {
        self.errors.publish(&error);
        MutationOutcome::Failed(error.user_message())
    }

    fn sync_reminder(&self, note: &Note) {
        let Some(scheduler) = &self.reminders else {
            return;
        };
        match (Reminder::for_note(note), &note.id) {
            (Some(reminder), _) => scheduler.schedule(reminder),
            (None, Some(id)) => scheduler.cancel(id),
            (None, None) => {}
        }
    }

    fn cancel_reminders<'a>(&self, ids: impl IntoIterator<Item = &'a String>) {
        if let Some(scheduler) = &self.reminders {
            for id in ids {
                scheduler.cancel(id);
            }
        }
    }

    /// Persists a new note and returns the id assigned by the store.
    ///
    /// Blank input (no title, no body, no checklist items) is skipped. Each
    /// call creates a distinct note; identical calls are not deduplicated.
    pub async fn create(
        &self,
        title: &str,
        body: &str,
        color_index: i32,
        checklist: Option<Vec<ChecklistItem>>,
    ) -> MutationOutcome<String> {
        let mut note = Note::draft(title, body, color_index);
        note.checklist = checklist;
        self.create_note(note).await
    }

    /// Persists a draft; flags and timestamps on the draft are reset.
    pub async fn create_note(&self, draft: Note) -> MutationOutcome<String> {
        if !draft.has_content() {
            log::debug!("empty note discarded");
            return MutationOutcome::Skipped;
        }
        let Some(collection) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        let note = Note {
            id: None,
            is_pinned: false,
            is_archived: false,
            is_completed: false,
            created_at: None,
            last_edited: None,
            ..draft
        };
        match self.store.add(&collection, creation_fields(&note)).await {
            Ok(id) => {
                log::info!("created note {id}");
                self.sync_reminder(&Note {
                    id: Some(id.clone()),
                    ..note
                });
                MutationOutcome::Applied(id)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Overwrites every editable field of a stored note and refreshes `last_edited`.
    pub async fn update(&self, note: &Note) -> MutationOutcome {
        let Some(id) = &note.id else {
            log::debug!("update of unsaved note ignored");
            return MutationOutcome::Skipped;
        };
        let Some(collection) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        let path = collection.doc(id.as_str());
        match self.store.update(&path, updatable_fields(note)).await {
            Ok(()) => {
                log::info!("updated note {id}");
                self.sync_reminder(note);
                MutationOutcome::Applied(())
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn toggle_completion(&self, note: &Note) -> MutationOutcome {
        self.update(&Note {
            is_completed: !note.is_completed,
            ..note.clone()
        })
        .await
    }

    pub async fn toggle_pin(&self, note: &Note) -> MutationOutcome {
        self.update(&Note {
            is_pinned: !note.is_pinned,
            ..note.clone()
        })
        .await
    }

    /// Flips `is_archived` and clears `is_pinned` in the same write.
    pub async fn toggle_archive(&self, note: &Note) -> MutationOutcome {
        self.update(&Note {
            is_archived: !note.is_archived,
            is_pinned: false,
            ..note.clone()
        })
        .await
    }

    pub async fn delete(&self, note: &Note) -> MutationOutcome {
        let Some(id) = &note.id else {
            return MutationOutcome::Skipped;
        };
        let Some(collection) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        match self.store.delete(&collection.doc(id.as_str())).await {
            Ok(()) => {
                log::info!("deleted note {id}");
                self.cancel_reminders([id]);
                MutationOutcome::Applied(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Re-inserts a previously deleted note under its original id.
    pub async fn restore(&self, note: &Note) -> MutationOutcome {
        let Some(id) = &note.id else {
            return MutationOutcome::Skipped;
        };
        let Some(collection) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        let path = collection.doc(id.as_str());
        match self.store.set(&path, restore_fields(note)).await {
            Ok(()) => {
                log::info!("restored note {id}");
                self.sync_reminder(note);
                MutationOutcome::Applied(())
            }
            Err(e) => self.fail(e),
        }
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> MutationOutcome {
        if ops.is_empty() {
            return MutationOutcome::Skipped;
        }
        let count = ops.len();
        match self.store.batch_write(ops).await {
            Ok(()) => {
                log::info!("batch of {count} writes applied");
                MutationOutcome::Applied(())
            }
            Err(e) => self.fail(e),
        }
    }

    async fn batch(
        &self,
        ids: &BTreeSet<String>,
        op: impl Fn(&CollectionPath, &str) -> WriteOp,
    ) -> MutationOutcome {
        if ids.is_empty() {
            return MutationOutcome::Skipped;
        }
        let Some(collection) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        self.write_batch(ids.iter().map(|id| op(&collection, id)).collect())
            .await
    }

    /// Sets `is_pinned` on every listed note in one atomic write.
    pub async fn pin_many(&self, ids: &BTreeSet<String>, value: bool) -> MutationOutcome {
        self.batch(ids, |collection, id| WriteOp::Update {
            path: collection.doc(id),
            fields: patch_fields(NotePatch::pin(value)),
        })
        .await
    }

    /// Sets `is_archived` and clears `is_pinned` on every listed note in one atomic write.
    pub async fn archive_many(&self, ids: &BTreeSet<String>, value: bool) -> MutationOutcome {
        let Some(owner) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        self.archive_many_in(&owner, ids, value).await
    }

    /// [`archive_many`](Self::archive_many) against a fixed owner instead of
    /// whoever is signed in when the write runs.
    pub async fn archive_many_in(
        &self,
        owner: &CollectionPath,
        ids: &BTreeSet<String>,
        value: bool,
    ) -> MutationOutcome {
        let ops = ids
            .iter()
            .map(|id| WriteOp::Update {
                path: owner.doc(id.as_str()),
                fields: patch_fields(NotePatch::archive(value)),
            })
            .collect();
        self.write_batch(ops).await
    }

    /// Hard-deletes every listed note in one atomic write.
    pub async fn delete_many(&self, ids: &BTreeSet<String>) -> MutationOutcome {
        let Some(owner) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        self.delete_many_in(&owner, ids).await
    }

    pub async fn delete_many_in(
        &self,
        owner: &CollectionPath,
        ids: &BTreeSet<String>,
    ) -> MutationOutcome {
        let ops = ids
            .iter()
            .map(|id| WriteOp::Delete {
                path: owner.doc(id.as_str()),
            })
            .collect();
        let outcome = self.write_batch(ops).await;
        if outcome.is_applied() {
            self.cancel_reminders(ids);
        }
        outcome
    }

    /// Re-inserts previously deleted notes in one atomic write.
    pub async fn restore_many(&self, notes: &[Note]) -> MutationOutcome {
        let Some(owner) = self.collection() else {
            return MutationOutcome::Skipped;
        };
        self.restore_many_in(&owner, notes).await
    }

    /// [`restore_many`](Self::restore_many) into a fixed owner's collection.
    ///
    /// Notes without an id are ignored.
    pub async fn restore_many_in(&self, owner: &CollectionPath, notes: &[Note]) -> MutationOutcome {
        let ops = notes
            .iter()
            .filter_map(|note| {
                note.id.as_deref().map(|id| WriteOp::Set {
                    path: owner.doc(id),
                    fields: restore_fields(note),
                })
            })
            .collect();
        let outcome = self.write_batch(ops).await;
        if outcome.is_applied() {
            for note in notes {
                self.sync_reminder(note);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        note_from_document, Document, IdentityHandle, IdentityProvider, MemoryStore,
        RecordingScheduler, ReminderEvent,
    };
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<MemoryStore>,
        identity: IdentityHandle,
        errors: ErrorSignal,
        reminders: Arc<RecordingScheduler>,
        gateway: NoteGateway,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityHandle::signed_in("alice");
        let errors = ErrorSignal::new();
        let reminders = Arc::new(RecordingScheduler::new());
        let gateway = NoteGateway::new(store.clone(), identity.watch(), "tasks", errors.clone())
            .with_reminders(reminders.clone());
        Fixture {
            store,
            identity,
            errors,
            reminders,
            gateway,
        }
    }

    fn tasks() -> CollectionPath {
        CollectionPath::new("alice", "tasks")
    }

    fn load(store: &MemoryStore, id: &str) -> Note {
        let fields = store.document(&tasks().doc(id)).expect("document missing");
        note_from_document(&Document {
            id: id.to_string(),
            fields,
        })
        .unwrap()
    }

    fn set_of(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_rejects_blank_note() {
        let f = fixture();
        assert_eq!(f.gateway.create("", "", 0, None).await, MutationOutcome::Skipped);
        assert_eq!(f.gateway.create(" ", "\t", 0, Some(vec![])).await, MutationOutcome::Skipped);
        assert!(f.store.is_empty(&tasks()));
        assert_eq!(f.errors.current(), None);
    }

    #[tokio::test]
    async fn test_create_accepts_blank_title_with_body() {
        let f = fixture();
        let id = f.gateway.create(" ", "x", 4, None).await.applied().unwrap();
        let note = load(&f.store, &id);
        assert_eq!(note.body, "x");
        assert_eq!(note.color_index, 4);
        assert!(!note.is_pinned && !note.is_archived && !note.is_completed);
        assert!(note.created_at.is_some());
        assert!(note.last_edited.is_some());
    }

    #[tokio::test]
    async fn test_create_is_not_idempotent() {
        let f = fixture();
        let a = f.gateway.create("same", "", 0, None).await.applied().unwrap();
        let b = f.gateway.create("same", "", 0, None).await.applied().unwrap();
        assert_ne!(a, b);
        assert_eq!(f.store.len(&tasks()), 2);
    }

    #[tokio::test]
    async fn test_create_resets_draft_flags() {
        let f = fixture();
        let mut draft = Note::draft("t", "", 0);
        draft.is_pinned = true;
        draft.is_archived = true;
        let id = f.gateway.create_note(draft).await.applied().unwrap();
        let note = load(&f.store, &id);
        assert!(!note.is_pinned && !note.is_archived);
    }

    #[tokio::test]
    async fn test_update_requires_id_and_refreshes_last_edited() {
        let f = fixture();
        assert_eq!(f.gateway.update(&Note::draft("t", "", 0)).await, MutationOutcome::Skipped);

        let id = f.gateway.create("t", "", 0, None).await.applied().unwrap();
        let before = load(&f.store, &id);
        let edited = Note {
            title: "renamed".to_string(),
            ..before.clone()
        };
        assert!(f.gateway.update(&edited).await.is_applied());

        let after = load(&f.store, &id);
        assert_eq!(after.title, "renamed");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.last_edited > before.last_edited);
    }

    #[tokio::test]
    async fn test_toggles_flip_one_flag() {
        let f = fixture();
        let id = f.gateway.create("t", "", 0, None).await.applied().unwrap();

        f.gateway.toggle_completion(&load(&f.store, &id)).await;
        assert!(load(&f.store, &id).is_completed);
        f.gateway.toggle_pin(&load(&f.store, &id)).await;
        let note = load(&f.store, &id);
        assert!(note.is_pinned && note.is_completed);
    }

    #[tokio::test]
    async fn test_toggle_archive_always_unpins_and_loses_pin() {
        let f = fixture();
        let id = f.gateway.create("t", "", 0, None).await.applied().unwrap();
        f.gateway.toggle_pin(&load(&f.store, &id)).await;
        assert!(load(&f.store, &id).is_pinned);

        f.gateway.toggle_archive(&load(&f.store, &id)).await;
        let archived = load(&f.store, &id);
        assert!(archived.is_archived);
        assert!(!archived.is_pinned);

        f.gateway.toggle_archive(&archived).await;
        let back = load(&f.store, &id);
        assert!(!back.is_archived);
        assert!(!back.is_pinned, "pin state must not come back after unarchiving");
    }

    #[tokio::test]
    async fn test_archive_many_unpins_every_note() {
        let f = fixture();
        let a = f.gateway.create("a", "", 0, None).await.applied().unwrap();
        let b = f.gateway.create("b", "", 0, None).await.applied().unwrap();
        f.gateway.toggle_pin(&load(&f.store, &a)).await;

        let ids = set_of(&[&a, &b]);
        assert!(f.gateway.archive_many(&ids, true).await.is_applied());
        for id in [&a, &b] {
            let note = load(&f.store, id);
            assert!(note.is_archived);
            assert!(!note.is_pinned);
        }
    }

    #[tokio::test]
    async fn test_pin_many_and_empty_batch() {
        let f = fixture();
        let a = f.gateway.create("a", "", 0, None).await.applied().unwrap();
        assert!(f.gateway.pin_many(&set_of(&[&a]), true).await.is_applied());
        assert!(load(&f.store, &a).is_pinned);

        let writes = f.store.write_count();
        assert_eq!(f.gateway.pin_many(&BTreeSet::new(), true).await, MutationOutcome::Skipped);
        assert_eq!(f.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_batch_failure_changes_nothing() {
        let f = fixture();
        let a = f.gateway.create("a", "", 0, None).await.applied().unwrap();
        let ids = set_of(&[&a, "gone"]);

        let outcome = f.gateway.archive_many(&ids, true).await;
        assert!(matches!(outcome, MutationOutcome::Failed(_)));
        assert!(!load(&f.store, &a).is_archived);
        assert_eq!(f.errors.current().as_deref(), Some("Note no longer exists"));
    }

    #[tokio::test]
    async fn test_delete_many_removes_all() {
        let f = fixture();
        let a = f.gateway.create("a", "", 0, None).await.applied().unwrap();
        let b = f.gateway.create("b", "", 0, None).await.applied().unwrap();
        let c = f.gateway.create("c", "", 0, None).await.applied().unwrap();

        assert!(f.gateway.delete_many(&set_of(&[&a, &b])).await.is_applied());
        assert_eq!(f.store.len(&tasks()), 1);
        assert!(f.store.document(&tasks().doc(&c)).is_some());
    }

    #[tokio::test]
    async fn test_restore_reinserts_prior_state() {
        let f = fixture();
        let id = f.gateway.create("keep me", "body", 2, None).await.applied().unwrap();
        let before = load(&f.store, &id);
        f.gateway.delete(&before).await;
        assert!(f.store.is_empty(&tasks()));

        assert!(f.gateway.restore(&before).await.is_applied());
        let after = load(&f.store, &id);
        assert_eq!(after.title, "keep me");
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_restore_many_is_all_or_nothing() {
        let f = fixture();
        let a = f.gateway.create("a", "", 0, None).await.applied().unwrap();
        let b = f.gateway.create("b", "", 0, None).await.applied().unwrap();
        let prior = vec![load(&f.store, &a), load(&f.store, &b)];
        f.gateway.delete_many(&set_of(&[&a, &b])).await;

        f.store.fail_writes("offline");
        let outcome = f.gateway.restore_many(&prior).await;
        assert!(matches!(outcome, MutationOutcome::Failed(_)));
        assert!(f.store.is_empty(&tasks()));

        f.store.heal_writes();
        assert!(f.gateway.restore_many(&prior).await.is_applied());
        assert_eq!(f.store.len(&tasks()), 2);
        assert_eq!(load(&f.store, &a).created_at, prior[0].created_at);
    }

    #[tokio::test]
    async fn test_explicit_owner_ignores_current_identity() {
        let f = fixture();
        let id = f.gateway.create("mine", "", 0, None).await.applied().unwrap();
        let note = load(&f.store, &id);
        f.gateway.delete(&note).await;

        f.identity.sign_in("bob");
        assert!(f.gateway.restore_many_in(&tasks(), &[note]).await.is_applied());
        assert_eq!(f.store.len(&tasks()), 1);
        assert!(f.store.is_empty(&CollectionPath::new("bob", "tasks")));

        assert!(f.gateway.archive_many_in(&tasks(), &set_of(&[&id]), true).await.is_applied());
        assert!(load(&f.store, &id).is_archived);
        assert_eq!(f.gateway.owner(), Some(CollectionPath::new("bob", "tasks")));
    }

    #[tokio::test]
    async fn test_write_failure_is_published_not_returned() {
        let f = fixture();
        f.store.fail_writes("network unreachable");
        let outcome = f.gateway.create("t", "", 0, None).await;
        assert_eq!(
            outcome,
            MutationOutcome::Failed("Failed to save: network unreachable".to_string())
        );
        assert_eq!(f.errors.current().as_deref(), Some("Failed to save: network unreachable"));
    }

    #[tokio::test]
    async fn test_signed_out_mutations_are_skipped() {
        let f = fixture();
        f.identity.sign_out();
        assert_eq!(f.gateway.create("t", "", 0, None).await, MutationOutcome::Skipped);
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reminders_follow_note_state() {
        let f = fixture();
        let at = Utc::now() + Duration::hours(1);
        let mut draft = Note::draft("dentist", "3pm", 0);
        draft.reminder_at = Some(at);
        let id = f.gateway.create_note(draft).await.applied().unwrap();

        let cleared = Note {
            reminder_at: None,
            ..load(&f.store, &id)
        };
        f.gateway.update(&cleared).await;
        f.gateway.delete(&cleared).await;

        assert_eq!(
            f.reminders.events(),
            vec![
                ReminderEvent::Scheduled(Reminder {
                    note_id: id.clone(),
                    title: "dentist".to_string(),
                    body: "3pm".to_string(),
                    fire_at: at,
                }),
                ReminderEvent::Cancelled(id.clone()),
                ReminderEvent::Cancelled(id),
            ]
        );
    }
}
