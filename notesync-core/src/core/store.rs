//! Remote document store collaborator.
//!
//! Notes live in one sub-collection per user, addressed as
//! `users/{userId}/{collection}/{noteId}`. The store owns id assignment and
//! the server clock; [`FieldValue::ServerTimestamp`](crate::FieldValue::ServerTimestamp)
//! placeholders are resolved on its side.

use crate::{Fields, NotesyncError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection name used when settings do not override it.
pub const DEFAULT_COLLECTION: &str = "tasks";

/// Path of a user's note collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    user_id: String,
    collection: String,
}

impl CollectionPath {
    pub fn new(user_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            collection: collection.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            parent: self.clone(),
            id: id.into(),
        }
    }

    /// Parses `users/{uid}/{collection}`.
    ///
    /// # Errors
    ///
    /// Returns [`NotesyncError::InvalidPath`] for any other shape.
    pub fn parse(path: &str) -> Result<Self> {
        match path.split('/').collect::<Vec<_>>().as_slice() {
            ["users", uid, collection] if !uid.is_empty() && !collection.is_empty() => {
                Ok(Self::new(*uid, *collection))
            }
            _ => Err(NotesyncError::InvalidPath(path.to_string())),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/{}", self.user_id, self.collection)
    }
}

/// Path of a single note document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    parent: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.parent
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parses `users/{uid}/{collection}/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`NotesyncError::InvalidPath`] for any other shape.
    pub fn parse(path: &str) -> Result<Self> {
        match path.rsplit_once('/') {
            Some((parent, id)) if !id.is_empty() => Ok(CollectionPath::parse(parent)
                .map_err(|_| NotesyncError::InvalidPath(path.to_string()))?
                .doc(id)),
            _ => Err(NotesyncError::InvalidPath(path.to_string())),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.id)
    }
}

/// A stored document as delivered by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole document, creating it if missing.
    Set { path: DocumentPath, fields: Fields },
    /// Merge `fields` into an existing document.
    Update { path: DocumentPath, fields: Fields },
    /// Remove the document; deleting a missing document succeeds.
    Delete { path: DocumentPath },
}

impl WriteOp {
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }

    #[must_use]
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::Set { .. } => WriteKind::Set,
            Self::Update { .. } => WriteKind::Update,
            Self::Delete { .. } => WriteKind::Delete,
        }
    }
}

/// Discriminant of a [`WriteOp`], for logging and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WriteKind {
    Set,
    Update,
    Delete,
}

/// A remote, multi-writer document store.
///
/// Subscriptions are lazy and restartable: the listener is registered when the
/// returned stream is first polled and torn down when it is dropped. Each item
/// is the complete current collection, never a delta. A listener failure is
/// delivered as one `Err` item, after which the stream ends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn subscribe(&self, collection: &CollectionPath) -> BoxStream<'static, Result<Vec<Document>>>;

    fn subscribe_document(&self, path: &DocumentPath) -> BoxStream<'static, Result<Option<Document>>>;

    /// Inserts a new document and returns the id the store assigned.
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<String>;

    async fn set(&self, path: &DocumentPath, fields: Fields) -> Result<()>;

    /// Partial update; fails with [`NotesyncError::NotFound`] if the document is gone.
    async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()>;

    async fn delete(&self, path: &DocumentPath) -> Result<()>;

    /// Applies every op or none of them.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()>;
}
