use std::{fs, io, path::{Path, PathBuf}, sync::Arc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::HistoryItem;

/// Most recent entries kept; older ones are dropped on insert.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history slot io: {0}")] Io(#[from] io::Error),
    #[error("history encoding: {0}")] Encode(#[from] serde_json::Error),
}

/// One named piece of persistent key-value storage.
pub trait Slot: Send + Sync {
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, contents: &str) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// Slot backed by a single JSON file.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Slot for FileSlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Replace via a sibling temp file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot. Clones share the same value.
#[derive(Clone, Default)]
pub struct MemorySlot {
    value: Arc<Mutex<Option<String>>>,
}

impl MemorySlot {
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self { value: Arc::new(Mutex::new(Some(contents.into()))) }
    }

    pub fn contents(&self) -> Option<String> {
        self.value.lock().clone()
    }
}

impl Slot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.value.lock().clone())
    }

    fn write(&self, contents: &str) -> Result<(), StoreError> {
        *self.value.lock() = Some(contents.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.value.lock() = None;
        Ok(())
    }
}

/// The persisted history list: always the complete, ordered, capped list.
pub struct HistoryStore {
    slot: Box<dyn Slot>,
}

impl HistoryStore {
    pub fn new(slot: impl Slot + 'static) -> Self {
        Self { slot: Box::new(slot) }
    }

    /// Absent slot yields an empty list; a slot that fails to parse is removed and also yields an empty list.
    pub fn load(&self) -> Vec<HistoryItem> {
        let raw = match self.slot.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("⚠️ Could not read history slot, starting empty: {}", e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<HistoryItem>>(&raw) {
            Ok(items) => {
                info!("📚 Loaded {} history entries", items.len());
                items
            }
            Err(e) => {
                warn!("⚠️ Malformed history slot ({}), resetting", e);
                if let Err(e) = self.slot.remove() {
                    warn!("⚠️ Failed to reset history slot: {}", e);
                }
                Vec::new()
            }
        }
    }

    /// Overwrites the slot with the full list.
    pub fn save(&self, items: &[HistoryItem]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(items)?;
        self.slot.write(&encoded)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.slot.remove()
    }
}

/// Puts `item` first and drops everything past [`HISTORY_CAPACITY`].
pub fn insert_capped(items: &mut Vec<HistoryItem>, item: HistoryItem) {
    items.insert(0, item);
    items.truncate(HISTORY_CAPACITY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_scheme;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn item(n: usize) -> HistoryItem {
        HistoryItem {
            id: format!("id-{n}"),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + n as i64).unwrap(),
            prompt: format!("prompt {n}"),
            scheme: sample_scheme(),
        }
    }

    #[test]
    fn insert_keeps_ten_most_recent_newest_first() {
        let mut items = Vec::new();
        for n in 0..25 {
            insert_capped(&mut items, item(n));
        }
        let prompts: Vec<_> = items.iter().map(|i| i.prompt.as_str()).collect();
        let expected: Vec<String> = (15..25).rev().map(|n| format!("prompt {n}")).collect();
        assert_eq!(prompts, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn absent_slot_loads_empty() {
        let store = HistoryStore::new(MemorySlot::default());
        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_slot_loads_empty_and_is_reset() {
        let slot = MemorySlot::with_contents("{not json");
        let store = HistoryStore::new(slot.clone());
        assert!(store.load().is_empty());
        assert_eq!(slot.contents(), None);
    }

    #[test]
    fn saving_what_was_loaded_leaves_slot_unchanged() {
        let slot = MemorySlot::default();
        let store = HistoryStore::new(slot.clone());
        let items = vec![item(2), item(1)];
        store.save(&items).unwrap();
        let before = slot.contents();

        let loaded = store.load();
        assert_eq!(loaded, items);
        store.save(&loaded).unwrap();
        assert_eq!(slot.contents(), before);
    }

    #[test]
    fn clear_removes_slot() {
        let slot = MemorySlot::default();
        let store = HistoryStore::new(slot.clone());
        store.save(&[item(0)]).unwrap();
        store.clear().unwrap();
        assert_eq!(slot.contents(), None);
        assert!(store.load().is_empty());
    }

    #[test]
    fn file_slot_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested").join("history.json"));
        assert_eq!(slot.read().unwrap(), None);

        slot.write("[]").unwrap();
        assert_eq!(slot.read().unwrap().as_deref(), Some("[]"));

        slot.remove().unwrap();
        slot.remove().unwrap();
        assert!(!slot.path().exists());
    }
}
