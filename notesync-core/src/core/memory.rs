//! In-process [`DocumentStore`] implementation.
//!
//! Documents are kept per collection in insertion order. Every write bumps the
//! collection's revision and wakes the live listeners, which then emit a fresh
//! full snapshot. Server timestamps come from a clock that never repeats or
//! goes backwards, so edits are strictly ordered.
//!
//! Faults can be injected to exercise failure paths: [`MemoryStore::fail_writes`]
//! rejects every write until healed, [`MemoryStore::break_collection`]
//! terminates current and future listeners of one collection with an error.

use crate::{
    CollectionPath, Document, DocumentPath, DocumentStore, FieldValue, Fields, NotesyncError,
    Result, WriteOp,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::BoxStream;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, IndexMap<String, Fields>>,
    revisions: HashMap<String, u64>,
    listeners: HashMap<String, usize>,
    broken: HashMap<String, String>,
    write_fault: Option<String>,
    last_server_time: Option<DateTime<Utc>>,
    writes: u64,
}

impl MemoryState {
    fn server_now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_server_time {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_server_time = Some(next);
        next
    }

    fn resolve(&mut self, fields: Fields) -> Fields {
        let now = self.server_now();
        fields
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::ServerTimestamp => (k, FieldValue::Timestamp(now)),
                other => (k, other),
            })
            .collect()
    }

    fn check_writable(&self) -> Result<()> {
        match &self.write_fault {
            Some(message) => Err(NotesyncError::Write(message.clone())),
            None => Ok(()),
        }
    }

    fn touch(&mut self, collection: &str) {
        *self.revisions.entry(collection.to_string()).or_insert(0) += 1;
        self.writes += 1;
    }

    fn apply(&mut self, op: WriteOp) {
        let key = op.path().collection().to_string();
        match op {
            WriteOp::Set { path, fields } => {
                let fields = self.resolve(fields);
                self.collections
                    .entry(key.clone())
                    .or_default()
                    .insert(path.id().to_string(), fields);
            }
            WriteOp::Update { path, fields } => {
                let fields = self.resolve(fields);
                if let Some(doc) = self
                    .collections
                    .get_mut(&key)
                    .and_then(|docs| docs.get_mut(path.id()))
                {
                    doc.extend(fields);
                }
            }
            WriteOp::Delete { path } => {
                if let Some(docs) = self.collections.get_mut(&key) {
                    docs.shift_remove(path.id());
                }
            }
        }
        self.touch(&key);
    }

    fn exists(&self, path: &DocumentPath) -> bool {
        self.collections
            .get(&path.collection().to_string())
            .is_some_and(|docs| docs.contains_key(path.id()))
    }

    fn snapshot(&self, key: &str) -> std::result::Result<(u64, Vec<Document>), String> {
        if let Some(message) = self.broken.get(key) {
            return Err(message.clone());
        }
        let revision = self.revisions.get(key).copied().unwrap_or(0);
        let docs = self
            .collections
            .get(key)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok((revision, docs))
    }
}

/// A [`DocumentStore`] held entirely in memory.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the listener count for a collection when a subscription stream is dropped.
struct ListenerGuard {
    state: Arc<Mutex<MemoryState>>,
    key: String,
}

impl ListenerGuard {
    fn register(state: &Arc<Mutex<MemoryState>>, key: &str) -> Self {
        *lock(state).listeners.entry(key.to_string()).or_insert(0) += 1;
        log::debug!("listener registered on {key}");
        Self {
            state: state.clone(),
            key: key.to_string(),
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(count) = lock(&self.state).listeners.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        log::debug!("listener removed from {}", self.key);
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().expect("memory store lock poisoned")
}

fn read_snapshot(
    state: &Mutex<MemoryState>,
    key: &str,
) -> std::result::Result<(u64, Vec<Document>), String> {
    lock(state).snapshot(key)
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            changes: Arc::new(changes),
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|n| *n += 1);
    }

    /// Makes every subsequent write fail with `message` until [`Self::heal_writes`].
    pub fn fail_writes(&self, message: impl Into<String>) {
        lock(&self.state).write_fault = Some(message.into());
    }

    pub fn heal_writes(&self) {
        lock(&self.state).write_fault = None;
    }

    /// Terminates listeners of `collection` with `message`; new listeners fail immediately.
    pub fn break_collection(&self, collection: &CollectionPath, message: impl Into<String>) {
        lock(&self.state)
            .broken
            .insert(collection.to_string(), message.into());
        self.notify();
    }

    pub fn heal_collection(&self, collection: &CollectionPath) {
        lock(&self.state).broken.remove(&collection.to_string());
    }

    /// Number of live listeners on `collection`, counting document listeners.
    #[must_use]
    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        lock(&self.state)
            .listeners
            .get(&collection.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Total number of successful write calls (a batch counts once per op).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        lock(&self.state).writes
    }

    /// Stored fields of one document, with server timestamps already resolved.
    #[must_use]
    pub fn document(&self, path: &DocumentPath) -> Option<Fields> {
        lock(&self.state)
            .collections
            .get(&path.collection().to_string())
            .and_then(|docs| docs.get(path.id()).cloned())
    }

    #[must_use]
    pub fn len(&self, collection: &CollectionPath) -> usize {
        lock(&self.state)
            .collections
            .get(&collection.to_string())
            .map_or(0, IndexMap::len)
    }

    #[must_use]
    pub fn is_empty(&self, collection: &CollectionPath) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe(&self, collection: &CollectionPath) -> BoxStream<'static, Result<Vec<Document>>> {
        let state = self.state.clone();
        let mut changes = self.changes.subscribe();
        let key = collection.to_string();
        Box::pin(async_stream::stream! {
            let _guard = ListenerGuard::register(&state, &key);
            let mut last_revision = None;
            loop {
                match read_snapshot(&state, &key) {
                    Err(message) => {
                        yield Err(NotesyncError::Subscription(message));
                        break;
                    }
                    Ok((revision, docs)) => {
                        if last_revision != Some(revision) {
                            last_revision = Some(revision);
                            yield Ok(docs);
                        }
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn subscribe_document(&self, path: &DocumentPath) -> BoxStream<'static, Result<Option<Document>>> {
        let state = self.state.clone();
        let mut changes = self.changes.subscribe();
        let key = path.collection().to_string();
        let id = path.id().to_string();
        Box::pin(async_stream::stream! {
            let _guard = ListenerGuard::register(&state, &key);
            let mut last: Option<Option<Document>> = None;
            loop {
                match read_snapshot(&state, &key) {
                    Err(message) => {
                        yield Err(NotesyncError::Subscription(message));
                        break;
                    }
                    Ok((_, docs)) => {
                        let current = docs.into_iter().find(|d| d.id == id);
                        if last.as_ref() != Some(&current) {
                            last = Some(current.clone());
                            yield Ok(current);
                        }
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        {
            let mut state = lock(&self.state);
            state.check_writable()?;
            state.apply(WriteOp::Set {
                path: collection.doc(id.clone()),
                fields,
            });
        }
        self.notify();
        Ok(id)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.check_writable()?;
            state.apply(WriteOp::Set {
                path: path.clone(),
                fields,
            });
        }
        self.notify();
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.check_writable()?;
            if !state.exists(path) {
                return Err(NotesyncError::NotFound(path.to_string()));
            }
            state.apply(WriteOp::Update {
                path: path.clone(),
                fields,
            });
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.check_writable()?;
            state.apply(WriteOp::Delete { path: path.clone() });
        }
        self.notify();
        Ok(())
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.check_writable()?;
            // Validate everything before touching anything.
            for op in &ops {
                if let WriteOp::Update { path, .. } = op {
                    if !state.exists(path) {
                        return Err(NotesyncError::NotFound(path.to_string()));
                    }
                }
            }
            for op in ops {
                state.apply(op);
            }
        }
        self.notify();
        Ok(())
    }
}
