//! Reminder collaborator.
//!
//! Scheduling the actual wake-up belongs to the platform. The gateway only
//! tells a [`ReminderScheduler`] which notes have a pending reminder and which
//! no longer do.

use crate::Note;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// What the platform needs to raise a reminder notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub note_id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

impl Reminder {
    /// Builds the reminder for a stored note, if it has one.
    #[must_use]
    pub fn for_note(note: &Note) -> Option<Self> {
        Some(Self {
            note_id: note.id.clone()?,
            title: note.title.clone(),
            body: note.body.clone(),
            fire_at: note.reminder_at?,
        })
    }
}

pub trait ReminderScheduler: Send + Sync {
    /// Schedules or reschedules the reminder for `reminder.note_id`.
    fn schedule(&self, reminder: Reminder);

    fn cancel(&self, note_id: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderEvent {
    Scheduled(Reminder),
    Cancelled(String),
}

/// A scheduler that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<ReminderEvent>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ReminderEvent> {
        self.events.lock().expect("Mutex poisoned").clone()
    }
}

impl ReminderScheduler for RecordingScheduler {
    fn schedule(&self, reminder: Reminder) {
        self.events
            .lock()
            .expect("Mutex poisoned")
            .push(ReminderEvent::Scheduled(reminder));
    }

    fn cancel(&self, note_id: &str) {
        self.events
            .lock()
            .expect("Mutex poisoned")
            .push(ReminderEvent::Cancelled(note_id.to_string()));
    }
}
