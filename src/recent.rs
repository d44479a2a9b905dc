//! Recent searches
//!
//! Most-recently-used list of picked titles, capped at [`RECENT_CAPACITY`]
//! and keyed by `(id, media_kind)`. Persisted as JSON through a
//! [`KeyValueStore`] so the storage backend can be swapped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::models::TitleSummary;

/// Maximum number of remembered titles
pub const RECENT_CAPACITY: usize = 10;

/// Storage key for the recent list
pub const RECENT_KEY: &str = "recent_searches";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored data is invalid: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Minimal key-value storage collaborator
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the user data dir (~/.local/share/streamflix)
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|p| Self::new(p.join("streamflix")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// MRU list of picked titles backed by a store
pub struct RecentSearches<S: KeyValueStore> {
    store: S,
    items: Vec<TitleSummary>,
}

impl<S: KeyValueStore> RecentSearches<S> {
    /// Load from the store. Unreadable or corrupt data starts empty.
    pub fn load(store: S) -> Self {
        let items = match store.get(RECENT_KEY) {
            Ok(Some(json)) => serde_json::from_str::<Vec<TitleSummary>>(&json).unwrap_or_else(|e| {
                warn!(error = %e, "discarding corrupt recent searches");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not read recent searches");
                Vec::new()
            }
        };

        let mut recent = Self { store, items };
        recent.normalize();
        recent
    }

    /// Most recent first
    pub fn items(&self) -> &[TitleSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move (or insert) a title to the front and persist
    pub fn record(&mut self, title: TitleSummary) -> Result<(), StoreError> {
        self.items
            .retain(|t| !(t.id == title.id && t.media_kind == title.media_kind));
        self.items.insert(0, title);
        self.items.truncate(RECENT_CAPACITY);
        self.persist()
    }

    /// Forget everything
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.items.clear();
        self.store.remove(RECENT_KEY)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.items)?;
        self.store.set(RECENT_KEY, &json)
    }

    /// Drop duplicates and overflow from stored data
    fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.items.len());
        self.items.retain(|t| {
            let key = (t.id, t.media_kind);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        self.items.truncate(RECENT_CAPACITY);
    }
}
