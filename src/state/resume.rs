use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Durable record of crawl progress
///
/// `current_page` is the next page to fetch, not the last one finished.
/// `prado_state` keeps the token observed at the last checkpoint; it is
/// informational only, since a fresh token is fetched before every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    pub current_page: u32,

    pub prado_state: Option<String>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            current_page: 1,
            prado_state: None,
        }
    }
}

/// File-backed store for [`CrawlState`]
///
/// Saves replace the whole file through a temp-file-then-rename sequence,
/// so the previous checkpoint survives a crash mid-write.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted state
    ///
    /// A missing, unreadable, or corrupt file is a "start over" signal and
    /// yields the default state rather than an error. The failure is logged
    /// so an operator can tell a fresh start from a discarded checkpoint.
    pub fn load(&self) -> CrawlState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting fresh", self.path.display());
                return CrawlState::default();
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read state file {}: {}. Starting from page 1.",
                    self.path.display(),
                    e
                );
                return CrawlState::default();
            }
        };

        match serde_json::from_str::<CrawlState>(&content) {
            Ok(state) if state.current_page >= 1 => state,
            Ok(state) => {
                tracing::warn!(
                    "State file {} has invalid current_page {}, starting from page 1",
                    self.path.display(),
                    state.current_page
                );
                CrawlState::default()
            }
            Err(e) => {
                tracing::warn!(
                    "State file {} is corrupt ({}), starting from page 1",
                    self.path.display(),
                    e
                );
                CrawlState::default()
            }
        }
    }

    /// Atomically persists the given state
    ///
    /// Writes the JSON to a sibling temp file and renames it over the
    /// target, so the file on disk is always a complete checkpoint.
    pub fn save(&self, state: &CrawlState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| HarvestError::State(format!("serialize state: {}", e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            "Checkpointed state: current_page={}",
            state.current_page
        );
        Ok(())
    }

    /// Removes the state file, forcing the next run to start at page 1
    ///
    /// Explicit operator action; a missing file is not an error.
    pub fn reset(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load(), CrawlState::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let state = CrawlState {
            current_page: 7,
            prado_state: Some("abc123".to_string()),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_save_overwrites_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .save(&CrawlState {
                current_page: 2,
                prado_state: None,
            })
            .unwrap();
        store
            .save(&CrawlState {
                current_page: 3,
                prado_state: Some("tok".to_string()),
            })
            .unwrap();

        assert_eq!(store.load().current_page, 3);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json at all").unwrap();
        assert_eq!(store.load(), CrawlState::default());
    }

    #[test]
    fn test_zero_page_treated_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"current_page":0,"prado_state":null}"#).unwrap();
        assert_eq!(store.load().current_page, 1);
    }

    #[test]
    fn test_on_disk_format_matches_contract() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&CrawlState {
                current_page: 5,
                prado_state: Some("xyz".to_string()),
            })
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["current_page"], 5);
        assert_eq!(json["prado_state"], "xyz");
    }

    #[test]
    fn test_reset_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&CrawlState::default()).unwrap();

        store.reset().unwrap();
        assert!(!store.path().exists());
        // Second reset on a missing file is fine
        store.reset().unwrap();
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&CrawlState::default()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("state.json")]);
    }
}
