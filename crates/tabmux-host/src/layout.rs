//! Best-effort persistence of the tab layout.
//!
//! The layout is one JSON blob at a fixed path. Loading never fails —
//! a missing, unreadable, or corrupt file yields the empty document —
//! and saving swallows every error. Loss of layout persistence must
//! never block terminal functionality.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One persisted tab.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    pub id: String,
    pub title: String,
}

/// The persisted layout: an ordered sequence of tabs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDocument {
    pub tabs: Vec<TabEntry>,
}

/// Reads and writes the layout document at a fixed location.
pub struct LayoutStore {
    path: PathBuf,
}

impl LayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The host-determined default location, `~/.tabmux/layout.json`.
    pub fn default_path() -> PathBuf {
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tabmux")
            .join("layout.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last saved layout, or the empty document if there is
    /// none or it cannot be read.
    pub fn load(&self) -> LayoutDocument {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                log::debug!("no layout at {}: {e}", self.path.display());
                return LayoutDocument::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(layout) => layout,
            Err(e) => {
                log::warn!("unreadable layout at {}: {e}", self.path.display());
                LayoutDocument::default()
            }
        }
    }

    /// Durably write the layout, best effort. Failures are logged and
    /// swallowed.
    pub fn save(&self, layout: &LayoutDocument) {
        if let Err(e) = self.try_save(layout) {
            log::warn!("failed to save layout to {}: {e}", self.path.display());
        }
    }

    fn try_save(&self, layout: &LayoutDocument) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(layout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, contents)
    }
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_empty_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path().join("layout.json"));

        assert_eq!(store.load(), LayoutDocument::default());
    }

    #[test]
    fn test_corrupt_file_yields_empty_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = LayoutStore::new(path);
        assert_eq!(store.load(), LayoutDocument::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path().join("nested").join("layout.json"));

        let layout = LayoutDocument {
            tabs: vec![
                TabEntry {
                    id: "1700000000000-abcd1234".to_string(),
                    title: "zsh".to_string(),
                },
                TabEntry {
                    id: "1700000000001-ef567890".to_string(),
                    title: "logs".to_string(),
                },
            ],
        };
        store.save(&layout);

        // Order of tabs is preserved.
        assert_eq!(store.load(), layout);
    }

    #[test]
    fn test_save_to_unwritable_path_is_swallowed() {
        let store = LayoutStore::new("/proc/tabmux-cannot-write-here/layout.json");
        store.save(&LayoutDocument::default());
    }
}
