//! Sorting, searching and filtering of note lists.
//!
//! [`arrange`] is a pure function of its inputs and is re-run on every change
//! to the snapshot or the [`NoteQuery`]; nothing is maintained incrementally.
//!
//! Pinned notes always lead the active list in the order the store delivered
//! them. The selected [`SortOrder`] applies to the remaining notes only.
//! Archived lists are never split by pin.

use crate::Note;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SortOrder {
    /// Keep the store's order.
    Custom,
    #[default]
    NewestFirst,
    OldestFirst,
    AlphabeticalAsc,
    AlphabeticalDesc,
    CompletedFirst,
    IncompleteFirst,
}

impl SortOrder {
    pub const ALL: [SortOrder; 7] = [
        SortOrder::Custom,
        SortOrder::NewestFirst,
        SortOrder::OldestFirst,
        SortOrder::AlphabeticalAsc,
        SortOrder::AlphabeticalDesc,
        SortOrder::CompletedFirst,
        SortOrder::IncompleteFirst,
    ];

    /// Menu label, e.g. "Newest first".
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::NewestFirst => "Newest first",
            Self::OldestFirst => "Oldest first",
            Self::AlphabeticalAsc => "Alphabetical (A-Z)",
            Self::AlphabeticalDesc => "Alphabetical (Z-A)",
            Self::CompletedFirst => "Completed first",
            Self::IncompleteFirst => "Incomplete first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CompletionFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl CompletionFilter {
    #[must_use]
    pub fn accepts(self, note: &Note) -> bool {
        match self {
            Self::All => true,
            Self::Completed => note.is_completed,
            Self::Incomplete => !note.is_completed,
        }
    }
}

/// Everything the engine needs besides the notes themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    pub sort_order: SortOrder,
    pub search: String,
    pub filter: CompletionFilter,
}

impl NoteQuery {
    pub fn sorted(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            ..Self::default()
        }
    }

    /// A blank query matches everything.
    #[must_use]
    pub fn matches(&self, note: &Note) -> bool {
        (self.search.trim().is_empty() || note.matches_search(&self.search))
            && self.filter.accepts(note)
    }
}

// Pending server timestamps belong to the most recent writes.
fn edited_key(note: &Note) -> DateTime<Utc> {
    note.last_edited.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn title_key(note: &Note) -> String {
    note.title.to_lowercase()
}

/// Sorts in place; equal keys keep their relative order.
pub fn sort_notes(notes: &mut [Note], order: SortOrder) {
    match order {
        SortOrder::Custom => {}
        SortOrder::NewestFirst => notes.sort_by_key(|n| Reverse(edited_key(n))),
        SortOrder::OldestFirst => notes.sort_by_key(edited_key),
        // Lowercasing allocates; compute each key once.
        SortOrder::AlphabeticalAsc => notes.sort_by_cached_key(title_key),
        SortOrder::AlphabeticalDesc => notes.sort_by_cached_key(|n| Reverse(title_key(n))),
        SortOrder::CompletedFirst => {
            notes.sort_by_key(|n| (Reverse(n.is_completed), Reverse(edited_key(n))));
        }
        SortOrder::IncompleteFirst => {
            notes.sort_by_key(|n| (n.is_completed, Reverse(edited_key(n))));
        }
    }
}

/// Produces the renderable list for one side of the archive partition.
///
/// Notes whose `is_archived` differs from `archived` are dropped, then the
/// search and completion filter narrow the rest. For the active side the
/// pinned notes come first, unsorted, followed by the sorted unpinned notes.
/// On the archived side every note is sorted together; a stray pin flag is
/// ignored.
#[must_use]
pub fn arrange(notes: &[Note], query: &NoteQuery, archived: bool) -> Vec<Note> {
    let candidates = notes
        .iter()
        .filter(|n| n.is_archived == archived)
        .filter(|n| query.matches(n))
        .cloned();

    if archived {
        let mut all: Vec<Note> = candidates.collect();
        sort_notes(&mut all, query.sort_order);
        return all;
    }

    let (mut pinned, mut rest): (Vec<Note>, Vec<Note>) = candidates.partition(|n| n.is_pinned);
    sort_notes(&mut rest, query.sort_order);
    pinned.append(&mut rest);
    pinned
}

/// Splits an active list produced by [`arrange`] into its pinned and other sections.
#[must_use]
pub fn split_pinned(list: &[Note]) -> (&[Note], &[Note]) {
    let count = list.iter().take_while(|n| n.is_pinned).count();
    list.split_at(count)
}

/// Unarchived notes with a reminder still ahead of `now`, soonest first.
#[must_use]
pub fn upcoming_reminders(notes: &[Note], now: DateTime<Utc>) -> Vec<Note> {
    let mut upcoming: Vec<Note> = notes
        .iter()
        .filter(|n| !n.is_archived && n.reminder_at.is_some_and(|at| at > now))
        .cloned()
        .collect();
    upcoming.sort_by_key(|n| n.reminder_at);
    upcoming
}
