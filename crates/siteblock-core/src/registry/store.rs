//! Durable storage for the registry document

use super::record::PersistedState;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Storage backend for [`PersistedState`]
pub trait StateStore: Send {
    /// Load the stored document, `None` if nothing was stored yet
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the stored document
    fn save(&mut self, state: &PersistedState) -> Result<()>;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}

/// JSON document on disk, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let state = serde_json::from_str(&content)
            .map_err(|e| Error::state_store(self.path.display().to_string(), e.to_string()))?;
        Ok(Some(state))
    }

    fn save(&mut self, state: &PersistedState) -> Result<()> {
        write_atomic(&self.path, &self.temp_path(), &serde_json::to_vec_pretty(state)?)?;
        debug!(path = %self.path.display(), blocks = state.blocks.len(), "Saved state");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `content` to `temp` and move it over `path`
///
/// Readers never observe a half-written document.
pub fn write_atomic(path: &Path, temp: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(temp, content)?;
    std::fs::rename(temp, path)?;
    Ok(())
}

/// In-memory store
///
/// Clones share the same document, which lets tests simulate a restart by
/// opening a second registry on a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Option<PersistedState>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Copy of the stored document
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.inner.lock().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&mut self, state: &PersistedState) -> Result<()> {
        *self.inner.lock() = Some(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_json_store_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut store = JsonFileStore::new(&path);

        let mut state = PersistedState::default();
        state.next_rule_id = 1234;
        state.last_command_timestamp = 99.5;
        store.save(&state).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn test_json_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(Error::StateStore { .. })));
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let mut store = MemoryStore::new();
        let observer = store.clone();
        store.save(&PersistedState::default()).unwrap();
        assert!(observer.snapshot().is_some());
    }
}
