//! The field-map contract between [`Note`] and stored documents.
//!
//! Stored key names are fixed by [`keys`]. Every write path builds its field
//! map through [`updatable_fields`], [`creation_fields`] or [`patch_fields`],
//! all of which stamp `lastEdited` with [`FieldValue::ServerTimestamp`] so the
//! store's clock, not the client's, orders edits across devices.

use crate::{ChecklistItem, Document, Note, NotesyncError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored key names.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const BODY: &str = "task";
    pub const IS_PINNED: &str = "isPinned";
    pub const IS_ARCHIVED: &str = "isArchived";
    pub const IS_COMPLETED: &str = "isCompleted";
    pub const COLOR_INDEX: &str = "colorIndex";
    pub const CREATED_AT: &str = "timestamp";
    pub const LAST_EDITED: &str = "lastEdited";
    pub const REMINDER_AT: &str = "reminderTime";
    pub const CHECKLIST: &str = "checklistItems";
    pub const ITEM_TEXT: &str = "text";
    pub const ITEM_CHECKED: &str = "isChecked";
}

/// A single value in a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Placeholder the store replaces with its own clock when the write lands.
    ServerTimestamp,
    Array(Vec<FieldValue>),
    Map(Fields),
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Flag changes applied by bulk actions; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_completed: Option<bool>,
}

impl NotePatch {
    pub fn pin(value: bool) -> Self {
        Self {
            is_pinned: Some(value),
            ..Self::default()
        }
    }

    /// Archiving in either direction always unpins.
    pub fn archive(value: bool) -> Self {
        Self {
            is_archived: Some(value),
            is_pinned: Some(false),
            ..Self::default()
        }
    }
}

fn stamp(mut fields: Fields) -> Fields {
    fields.insert(keys::LAST_EDITED.to_string(), FieldValue::ServerTimestamp);
    fields
}

fn optional_timestamp(value: Option<DateTime<Utc>>) -> FieldValue {
    value.map_or(FieldValue::Null, FieldValue::Timestamp)
}

fn checklist_value(checklist: &Option<Vec<ChecklistItem>>) -> FieldValue {
    match checklist {
        None => FieldValue::Null,
        Some(items) => FieldValue::Array(
            items
                .iter()
                .map(|item| {
                    let mut map = Fields::new();
                    map.insert(keys::ITEM_TEXT.to_string(), FieldValue::Text(item.text.clone()));
                    map.insert(keys::ITEM_CHECKED.to_string(), FieldValue::Boolean(item.is_checked));
                    FieldValue::Map(map)
                })
                .collect(),
        ),
    }
}

/// The canonical projection of a note's user-editable state.
///
/// Used for whole-note updates and, via [`creation_fields`], for inserts.
/// `id` and `created_at` are never part of it.
#[must_use]
pub fn updatable_fields(note: &Note) -> Fields {
    let mut fields = Fields::new();
    fields.insert(keys::TITLE.to_string(), FieldValue::Text(note.title.clone()));
    fields.insert(keys::BODY.to_string(), FieldValue::Text(note.body.clone()));
    fields.insert(keys::IS_PINNED.to_string(), FieldValue::Boolean(note.is_pinned));
    fields.insert(keys::IS_ARCHIVED.to_string(), FieldValue::Boolean(note.is_archived));
    fields.insert(keys::IS_COMPLETED.to_string(), FieldValue::Boolean(note.is_completed));
    fields.insert(keys::COLOR_INDEX.to_string(), FieldValue::Integer(i64::from(note.color_index)));
    fields.insert(keys::REMINDER_AT.to_string(), optional_timestamp(note.reminder_at));
    fields.insert(keys::CHECKLIST.to_string(), checklist_value(&note.checklist));
    stamp(fields)
}

/// Fields for inserting a new note; `created_at` comes from the server clock.
#[must_use]
pub fn creation_fields(note: &Note) -> Fields {
    let mut fields = updatable_fields(note);
    fields.insert(keys::CREATED_AT.to_string(), FieldValue::ServerTimestamp);
    fields
}

/// Fields for re-inserting a previously stored note under its original id.
///
/// The original `created_at` is kept when known so the note keeps its age.
#[must_use]
pub fn restore_fields(note: &Note) -> Fields {
    let mut fields = updatable_fields(note);
    let created = note.created_at.map_or(FieldValue::ServerTimestamp, FieldValue::Timestamp);
    fields.insert(keys::CREATED_AT.to_string(), created);
    fields
}

/// Partial update for bulk flag changes.
#[must_use]
pub fn patch_fields(patch: NotePatch) -> Fields {
    let mut fields = Fields::new();
    if let Some(v) = patch.is_pinned {
        fields.insert(keys::IS_PINNED.to_string(), FieldValue::Boolean(v));
    }
    if let Some(v) = patch.is_archived {
        fields.insert(keys::IS_ARCHIVED.to_string(), FieldValue::Boolean(v));
    }
    if let Some(v) = patch.is_completed {
        fields.insert(keys::IS_COMPLETED.to_string(), FieldValue::Boolean(v));
    }
    stamp(fields)
}

fn invalid(id: &str, key: &str, expected: &str) -> NotesyncError {
    NotesyncError::InvalidDocument {
        id: id.to_string(),
        reason: format!("field '{key}' is not {expected}"),
    }
}

fn read_text(doc: &Document, key: &str) -> Result<String> {
    match doc.fields.get(key) {
        None | Some(FieldValue::Null) => Ok(String::new()),
        Some(FieldValue::Text(s)) => Ok(s.clone()),
        Some(_) => Err(invalid(&doc.id, key, "text")),
    }
}

fn read_bool(doc: &Document, key: &str) -> Result<bool> {
    match doc.fields.get(key) {
        None | Some(FieldValue::Null) => Ok(false),
        Some(FieldValue::Boolean(b)) => Ok(*b),
        Some(_) => Err(invalid(&doc.id, key, "a boolean")),
    }
}

fn read_int(doc: &Document, key: &str) -> Result<i32> {
    match doc.fields.get(key) {
        None | Some(FieldValue::Null) => Ok(0),
        Some(FieldValue::Integer(i)) => {
            i32::try_from(*i).map_err(|_| invalid(&doc.id, key, "a 32-bit integer"))
        }
        Some(_) => Err(invalid(&doc.id, key, "an integer")),
    }
}

fn read_timestamp(doc: &Document, key: &str) -> Result<Option<DateTime<Utc>>> {
    match doc.fields.get(key) {
        None | Some(FieldValue::Null) | Some(FieldValue::ServerTimestamp) => Ok(None),
        Some(FieldValue::Timestamp(t)) => Ok(Some(*t)),
        Some(_) => Err(invalid(&doc.id, key, "a timestamp")),
    }
}

fn read_checklist(doc: &Document) -> Result<Option<Vec<ChecklistItem>>> {
    let items = match doc.fields.get(keys::CHECKLIST) {
        None | Some(FieldValue::Null) => return Ok(None),
        Some(FieldValue::Array(items)) => items,
        Some(_) => return Err(invalid(&doc.id, keys::CHECKLIST, "an array")),
    };
    items
        .iter()
        .map(|item| match item {
            FieldValue::Map(map) => {
                let text = match map.get(keys::ITEM_TEXT) {
                    None | Some(FieldValue::Null) => String::new(),
                    Some(FieldValue::Text(s)) => s.clone(),
                    Some(_) => return Err(invalid(&doc.id, keys::ITEM_TEXT, "text")),
                };
                let is_checked = match map.get(keys::ITEM_CHECKED) {
                    None | Some(FieldValue::Null) => false,
                    Some(FieldValue::Boolean(b)) => *b,
                    Some(_) => return Err(invalid(&doc.id, keys::ITEM_CHECKED, "a boolean")),
                };
                Ok(ChecklistItem { text, is_checked })
            }
            _ => Err(invalid(&doc.id, keys::CHECKLIST, "an array of maps")),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Decodes a stored document into a [`Note`].
///
/// Missing keys take their defaults; a key holding the wrong kind of value
/// makes the whole document undecodable.
///
/// # Errors
///
/// Returns [`NotesyncError::InvalidDocument`] naming the offending key.
pub fn note_from_document(doc: &Document) -> Result<Note> {
    Ok(Note {
        id: Some(doc.id.clone()),
        title: read_text(doc, keys::TITLE)?,
        body: read_text(doc, keys::BODY)?,
        is_pinned: read_bool(doc, keys::IS_PINNED)?,
        is_archived: read_bool(doc, keys::IS_ARCHIVED)?,
        is_completed: read_bool(doc, keys::IS_COMPLETED)?,
        color_index: read_int(doc, keys::COLOR_INDEX)?,
        created_at: read_timestamp(doc, keys::CREATED_AT)?,
        last_edited: read_timestamp(doc, keys::LAST_EDITED)?,
        reminder_at: read_timestamp(doc, keys::REMINDER_AT)?,
        checklist: read_checklist(doc)?,
    })
}
