//! Active and archived lists derived from one collection subscription.
//!
//! A [`NotesView`] never talks to the store. It follows the
//! [`CollectionState`] published by a [`NoteCollection`](crate::NoteCollection)
//! and re-runs [`arrange`] whenever the snapshot or the query changes.
//! Query setters recompute synchronously, so a reader observing `active()`
//! right after `set_sort_order` already sees the new order.

use crate::{arrange, CollectionState, CompletionFilter, Note, NoteQuery, SortOrder};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

type Projection = watch::Sender<Arc<Vec<Note>>>;

struct Projector {
    source: watch::Receiver<CollectionState>,
    query: Mutex<NoteQuery>,
    active: Projection,
    archived: Projection,
}

impl Projector {
    fn recompute_with(&self, query: &NoteQuery) {
        let notes = self.source.borrow().notes.clone();
        self.active.send_replace(Arc::new(arrange(&notes, query, false)));
        self.archived.send_replace(Arc::new(arrange(&notes, query, true)));
    }

    fn recompute(&self) {
        let query = self.query.lock().expect("Mutex poisoned");
        self.recompute_with(&query);
    }

    fn update_query(&self, change: impl FnOnce(&mut NoteQuery)) {
        let mut query = self.query.lock().expect("Mutex poisoned");
        let before = query.clone();
        change(&mut query);
        if *query != before {
            log::debug!("query changed to {:?}", *query);
            self.recompute_with(&query);
        }
    }
}

pub struct NotesView {
    projector: Arc<Projector>,
    task: JoinHandle<()>,
}

impl NotesView {
    /// Starts projecting `source`. Must be called from within a tokio runtime.
    pub fn spawn(source: watch::Receiver<CollectionState>, query: NoteQuery) -> Self {
        let (active, _) = watch::channel(Arc::new(Vec::new()));
        let (archived, _) = watch::channel(Arc::new(Vec::new()));
        let projector = Arc::new(Projector {
            source: source.clone(),
            query: Mutex::new(query),
            active,
            archived,
        });
        projector.recompute();

        let task = tokio::spawn(follow(source, projector.clone()));
        Self { projector, task }
    }

    pub fn active(&self) -> watch::Receiver<Arc<Vec<Note>>> {
        self.projector.active.subscribe()
    }

    pub fn archived(&self) -> watch::Receiver<Arc<Vec<Note>>> {
        self.projector.archived.subscribe()
    }

    #[must_use]
    pub fn query(&self) -> NoteQuery {
        self.projector.query.lock().expect("Mutex poisoned").clone()
    }

    pub fn set_sort_order(&self, order: SortOrder) {
        self.projector.update_query(|q| q.sort_order = order);
    }

    pub fn set_search(&self, search: impl Into<String>) {
        let search = search.into();
        self.projector.update_query(|q| q.search = search);
    }

    pub fn set_completion_filter(&self, filter: CompletionFilter) {
        self.projector.update_query(|q| q.filter = filter);
    }

    /// The current state of one note, if it is in the snapshot.
    #[must_use]
    pub fn note(&self, id: &str) -> Option<Note> {
        find(&self.projector.source.borrow().notes, id)
    }

    /// Follows one note through every snapshot.
    ///
    /// Emits `None` while the note is absent. Consecutive identical values
    /// are collapsed. No extra store listener is opened.
    pub fn lookup(&self, id: impl Into<String>) -> BoxStream<'static, Option<Note>> {
        let id = id.into();
        let mut last: Option<Option<Note>> = None;
        WatchStream::new(self.projector.source.clone())
            .filter_map(move |state| {
                let current = find(&state.notes, &id);
                let fresh = last.as_ref() != Some(&current);
                if fresh {
                    last = Some(current.clone());
                }
                futures::future::ready(fresh.then_some(current))
            })
            .boxed()
    }
}

impl Drop for NotesView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn find(notes: &[Note], id: &str) -> Option<Note> {
    notes.iter().find(|n| n.id.as_deref() == Some(id)).cloned()
}

async fn follow(mut source: watch::Receiver<CollectionState>, projector: Arc<Projector>) {
    while source.changed().await.is_ok() {
        projector.recompute();
    }
    log::debug!("collection closed, projection stopped");
}
