//! Internal domain modules for the Notesync core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod collection;
pub mod config;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod memory;
pub mod note;
pub mod palette;
pub mod query;
pub mod reminder;
pub mod session;
pub mod signal;
pub mod store;
pub mod undo;
pub mod view;

#[doc(inline)]
pub use collection::{CollectionState, NoteCollection};
#[doc(inline)]
pub use config::{
    config_dir, load_settings, load_settings_from, save_settings, save_settings_to,
    settings_file_path, SyncSettings,
};
#[doc(inline)]
pub use error::{NotesyncError, Result};
#[doc(inline)]
pub use fields::{
    creation_fields, note_from_document, patch_fields, restore_fields, updatable_fields,
    FieldValue, Fields, NotePatch,
};
#[doc(inline)]
pub use gateway::{MutationOutcome, NoteGateway};
#[doc(inline)]
pub use identity::{IdentityHandle, IdentityProvider};
#[doc(inline)]
pub use logging::init_logging;
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use note::{ChecklistItem, Note};
#[doc(inline)]
pub use palette::{random_color_index, PALETTE_SIZE};
#[doc(inline)]
pub use query::{
    arrange, sort_notes, split_pinned, upcoming_reminders, CompletionFilter, NoteQuery, SortOrder,
};
#[doc(inline)]
pub use reminder::{RecordingScheduler, Reminder, ReminderEvent, ReminderScheduler};
#[doc(inline)]
pub use session::NoteSession;
#[doc(inline)]
pub use signal::ErrorSignal;
#[doc(inline)]
pub use store::{
    CollectionPath, Document, DocumentPath, DocumentStore, WriteKind, WriteOp, DEFAULT_COLLECTION,
};
#[doc(inline)]
pub use undo::{UndoAction, UndoSlot};
#[doc(inline)]
pub use view::NotesView;
