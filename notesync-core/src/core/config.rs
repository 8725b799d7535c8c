//! Settings persistence for Notesync.
//!
//! Stores the sync and presentation defaults in a JSON file at an
//! OS-appropriate location.

use crate::{CompletionFilter, NoteQuery, Result, SortOrder, DEFAULT_COLLECTION, PALETTE_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Per-user sub-collection that holds the notes.
    pub collection: String,
    pub default_sort_order: SortOrder,
    pub default_filter: CompletionFilter,
    /// Palette size used when picking a random color for a new note.
    pub palette_size: usize,
    /// How long a bulk archive or delete can be undone.
    pub undo_window_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            default_sort_order: SortOrder::default(),
            default_filter: CompletionFilter::default(),
            palette_size: PALETTE_SIZE,
            undo_window_secs: 5,
        }
    }
}

impl SyncSettings {
    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }

    /// The query a fresh view starts with.
    pub fn initial_query(&self) -> NoteQuery {
        NoteQuery {
            sort_order: self.default_sort_order,
            filter: self.default_filter,
            ..NoteQuery::default()
        }
    }
}

const APP_DIR: &str = if cfg!(target_os = "windows") { "Notesync" } else { "notesync" };

/// Directory holding every file notesync writes locally.
///
/// - Linux: `$XDG_CONFIG_HOME/notesync`, falling back to `~/.config/notesync`
/// - macOS: `~/.config/notesync`, next to the other command-line tools rather
///   than in `Library/Application Support`
/// - Windows: the roaming `%APPDATA%/Notesync`
pub fn config_dir() -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join(".config"))
    } else {
        dirs::config_dir()
    };
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Returns the path to the settings JSON file inside [`config_dir`].
pub fn settings_file_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Loads settings from disk; returns defaults if the file is missing or corrupt.
pub fn load_settings() -> SyncSettings {
    load_settings_from(&settings_file_path())
}

pub fn load_settings_from(path: &Path) -> SyncSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings at {}: {e}", path.display());
            SyncSettings::default()
        }),
        Err(_) => SyncSettings::default(),
    }
}

/// Saves settings to disk, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`NotesyncError::Io`](crate::NotesyncError::Io) or
/// [`NotesyncError::Json`](crate::NotesyncError::Json) on failure.
pub fn save_settings(settings: &SyncSettings) -> Result<()> {
    save_settings_to(&settings_file_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &SyncSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    log::debug!("settings written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_live_in_app_dir() {
        let path = settings_file_path();
        assert_eq!(path.file_name().unwrap(), "settings.json");
        assert_eq!(path.parent().unwrap(), config_dir());
        assert_eq!(config_dir().file_name().unwrap().to_ascii_lowercase(), "notesync");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("absent.json"));
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.collection, "tasks");
        assert_eq!(settings.undo_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_round_trip_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = SyncSettings {
            collection: "notes".to_string(),
            default_sort_order: SortOrder::AlphabeticalAsc,
            default_filter: CompletionFilter::Incomplete,
            palette_size: 12,
            undo_window_secs: 10,
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn test_json_uses_camel_case_and_partial_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"defaultSortOrder":"OldestFirst","undoWindowSecs":2}"#).unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.default_sort_order, SortOrder::OldestFirst);
        assert_eq!(settings.undo_window_secs, 2);
        assert_eq!(settings.palette_size, PALETTE_SIZE);
        assert_eq!(settings.initial_query().sort_order, SortOrder::OldestFirst);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path), SyncSettings::default());
    }
}
