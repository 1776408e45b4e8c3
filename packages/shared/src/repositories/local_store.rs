use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::repositories::errors::local_store_errors::LocalStoreError;

pub const DEFAULT_PREFIX: &str = "classroom_";

/// The process-wide cache, shared between services and the mirror task.
pub type SharedLocalStore = Arc<tokio::sync::Mutex<LocalStore>>;

/// Keys the app keeps under the namespace prefix.
pub mod keys {
    pub const CURRENT_USER: &str = "currentUser";
    pub const PROFILE: &str = "profile";
    pub const CLASSES: &str = "classes";
    pub const BADGE_LOGS: &str = "badgeLogs";
    pub const THERMOSTAT_SETTINGS: &str = "thermostatSettings";
    pub const LAST_PICK_ROUND: &str = "lastPickRound";
    pub const LAST_GROUP_PREVIEW: &str = "lastGroupPreview";
    pub const ONBOARDING_DRAFT: &str = "onboardingDraft";

    /// Safe to drop when the quota is hit.
    pub const TRANSIENT: &[&str] = &[LAST_PICK_ROUND, LAST_GROUP_PREVIEW, ONBOARDING_DRAFT];
}

/// Raw string storage. `set` reports `QuotaExceeded` when the value does not fit.
pub trait StorageBackend: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError>;
    fn remove(&mut self, key: &str) -> Result<(), LocalStoreError>;
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        MemoryBackend {
            entries: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn usage_with(&self, key: &str, value: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        if let Some(quota) = self.quota_bytes {
            if self.usage_with(key, value) > quota {
                return Err(LocalStoreError::QuotaExceeded);
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), LocalStoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// A `MemoryBackend` persisted as one JSON object on disk after every change.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: MemoryBackend,
}

impl FileBackend {
    pub fn open(path: &Path, quota_bytes: Option<usize>) -> Result<Self, LocalStoreError> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(FileBackend {
            path: path.to_path_buf(),
            inner: MemoryBackend {
                entries,
                quota_bytes,
            },
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Applies `change` to a copy, writes it, then swaps it in.
    /// A failed write leaves memory matching disk.
    fn commit<F>(&mut self, change: F) -> Result<(), LocalStoreError>
    where
        F: FnOnce(&mut MemoryBackend) -> Result<(), LocalStoreError>,
    {
        let mut next = self.inner.clone();
        change(&mut next)?;
        self.persist(&next.entries)?;
        self.inner = next;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.commit(|entries| entries.set(key, value))
    }

    fn remove(&mut self, key: &str) -> Result<(), LocalStoreError> {
        self.commit(|entries| entries.remove(key))
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

/// Namespaced key-value cache over a `StorageBackend`.
pub struct LocalStore {
    backend: Box<dyn StorageBackend>,
    prefix: String,
}

impl LocalStore {
    pub fn new(backend: Box<dyn StorageBackend>, prefix: &str) -> Self {
        LocalStore {
            backend,
            prefix: prefix.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()), DEFAULT_PREFIX)
    }

    pub fn shared(self) -> SharedLocalStore {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.backend.get(&self.namespaced(key))
    }

    /// Writes `value`. When the quota is hit, transient keys are evicted and
    /// the write is retried once before giving up with `StorageFull`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let full_key = self.namespaced(key);
        match self.backend.set(&full_key, value) {
            Err(LocalStoreError::QuotaExceeded) => {
                let evicted = self.evict_transient()?;
                warn!(
                    "Local storage quota exceeded writing '{}', evicted {} transient key(s)",
                    key, evicted
                );
                match self.backend.set(&full_key, value) {
                    Err(LocalStoreError::QuotaExceeded) => Err(LocalStoreError::StorageFull {
                        key: key.to_string(),
                    }),
                    other => other,
                }
            }
            other => other,
        }
    }

    pub fn remove(&mut self, key: &str) -> Result<(), LocalStoreError> {
        let full_key = self.namespaced(key);
        self.backend.remove(&full_key)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LocalStoreError> {
        match self.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), LocalStoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Keys inside the namespace, without the prefix.
    pub fn keys(&self) -> Vec<String> {
        self.backend
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    /// Removes every namespaced key and leaves foreign keys alone.
    pub fn clear_namespace(&mut self) -> Result<usize, LocalStoreError> {
        let keys = self.keys();
        for key in &keys {
            self.remove(key)?;
        }
        debug!("Cleared {} local key(s)", keys.len());
        Ok(keys.len())
    }

    fn evict_transient(&mut self) -> Result<usize, LocalStoreError> {
        let mut evicted = 0;
        for key in keys::TRANSIENT {
            if self.get(key).is_some() {
                self.remove(key)?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}
