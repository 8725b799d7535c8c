//! Core library for Notesync, a cloud-synced note list with pinning,
//! archiving, checklists and reminders.
//!
//! The primary entry point is [`NoteSession`], which follows the signed-in
//! user's note collection in a [`DocumentStore`], projects it into active and
//! archived lists, and turns user intents into store writes. The pieces it is
//! built from ([`NoteCollection`], [`NotesView`], [`NoteGateway`]) can also be
//! used on their own.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    collection::{CollectionState, NoteCollection},
    config::{
        config_dir, load_settings, load_settings_from, save_settings, save_settings_to,
        settings_file_path, SyncSettings,
    },
    error::{NotesyncError, Result},
    fields::{
        creation_fields, note_from_document, patch_fields, restore_fields, updatable_fields,
        FieldValue, Fields, NotePatch,
    },
    gateway::{MutationOutcome, NoteGateway},
    identity::{IdentityHandle, IdentityProvider},
    logging::init_logging,
    memory::MemoryStore,
    note::{ChecklistItem, Note},
    palette::{random_color_index, PALETTE_SIZE},
    query::{
        arrange, sort_notes, split_pinned, upcoming_reminders, CompletionFilter, NoteQuery,
        SortOrder,
    },
    reminder::{RecordingScheduler, Reminder, ReminderEvent, ReminderScheduler},
    session::NoteSession,
    signal::ErrorSignal,
    store::{
        CollectionPath, Document, DocumentPath, DocumentStore, WriteKind, WriteOp,
        DEFAULT_COLLECTION,
    },
    undo::{UndoAction, UndoSlot},
    view::NotesView,
};
