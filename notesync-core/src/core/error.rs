//! Error types for the Notesync core library.

use thiserror::Error;

/// All errors that can occur within the Notesync core library.
#[derive(Debug, Clone, Error)]
pub enum NotesyncError {
    /// A live collection or document listener failed.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// A create, update, delete or batch write was rejected by the store.
    #[error("Write error: {0}")]
    Write(String),

    /// The store refused access to the requested path.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A document targeted by a partial update does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A stored document could not be decoded into a note.
    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    /// A store path did not have the `users/{uid}/{collection}[/{id}]` shape.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Reading or writing the settings file failed.
    #[error("IO error: {0}")]
    Io(String),

    /// The settings file could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for NotesyncError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for NotesyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Convenience alias that pins the error type to [`NotesyncError`].
pub type Result<T> = std::result::Result<T, NotesyncError>;

impl NotesyncError {
    /// Returns a short, human-readable message suitable for a banner or snackbar.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Subscription(e) => format!("Error loading notes: {e}"),
            Self::Write(e) => format!("Failed to save: {e}"),
            Self::PermissionDenied(_) => "You don't have access to these notes".to_string(),
            Self::NotFound(_) => "Note no longer exists".to_string(),
            Self::InvalidDocument { id, .. } => format!("Note {id} could not be read"),
            Self::InvalidPath(path) => format!("Invalid note location: {path}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
