use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a checklist note.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub text: String,
    pub is_checked: bool,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_checked: false,
        }
    }
}

/// A single note owned by the signed-in user.
///
/// `id` is `None` while the note is an unsaved draft. The store assigns it on
/// creation, together with `created_at`; `last_edited` is refreshed by the
/// store on every write. A timestamp is `None` only while the server value is
/// still pending.
///
/// `checklist` doubles as the note kind: `Some` marks a checklist note, `None`
/// a free-text note whose content lives in `body`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub is_completed: bool,
    pub color_index: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub last_edited: Option<DateTime<Utc>>,
    pub reminder_at: Option<DateTime<Utc>>,
    pub checklist: Option<Vec<ChecklistItem>>,
}

impl Note {
    /// Builds an unsaved draft with all flags cleared.
    pub fn draft(title: impl Into<String>, body: impl Into<String>, color_index: i32) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            color_index,
            ..Self::default()
        }
    }

    /// Returns `true` if the note carries anything worth persisting.
    ///
    /// Whitespace-only text does not count; a checklist counts as soon as it
    /// has at least one item.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty()
            || !self.body.trim().is_empty()
            || self.checklist.as_ref().is_some_and(|items| !items.is_empty())
    }

    #[must_use]
    pub fn is_checklist(&self) -> bool {
        self.checklist.is_some()
    }

    /// Palette slot for rendering, clamped into `0..palette_size`.
    ///
    /// Stored indices are never rewritten; a palette that shrank between
    /// releases simply wraps around.
    #[must_use]
    pub fn color_slot(&self, palette_size: usize) -> usize {
        if palette_size == 0 {
            return 0;
        }
        (self.color_index as i64).rem_euclid(palette_size as i64) as usize
    }

    /// Case-insensitive substring match against title or body.
    #[must_use]
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }
}
