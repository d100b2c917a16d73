use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Storage key for the identity record.
pub const AUTH_KEY: &str = "auth-storage";
/// Storage key for the task record.
pub const TASK_KEY: &str = "task-storage";

/// Injected key-value durability service: one serialized document per named
/// key, overwritten whole on every save.
pub trait StorageBackend {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&self, key: &str, payload: &str) -> anyhow::Result<()>;
}

/// File-backed storage: each key becomes `<key>.json` inside the data
/// directory, written atomically via a temp file in the same directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        info!(data_dir = %data_dir.display(), "opened file storage");
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    #[tracing::instrument(skip(self))]
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no record on disk");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "loaded record");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, payload))]
    fn save(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), bytes = payload.len(), "saving record atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(payload.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

/// In-memory storage for tests. Clones share the same map, so a test can
/// hand one clone to the store and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), payload.to_string());
        Ok(())
    }
}

/// Loads a record, normalizing every failure mode to the default value.
/// Losing a local list is recoverable; refusing to start is not.
#[tracing::instrument(skip(backend))]
pub fn load_record<T>(backend: &dyn StorageBackend, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match backend.load(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(key, error = %err, "malformed record; falling back to defaults");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(err) => {
            warn!(key, error = %err, "unreadable record; falling back to defaults");
            T::default()
        }
    }
}

#[tracing::instrument(skip(backend, record))]
pub fn save_record<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    record: &T,
) -> anyhow::Result<()> {
    let payload =
        serde_json::to_string(record).with_context(|| format!("failed to serialize {key}"))?;
    backend.save(key, &payload)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_storage_round_trips_a_payload() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        assert!(storage.load("task-storage").expect("load").is_none());
        storage
            .save("task-storage", "{\"tasks\":[]}")
            .expect("save");
        assert_eq!(
            storage.load("task-storage").expect("load").as_deref(),
            Some("{\"tasks\":[]}")
        );
    }

    #[test]
    fn load_record_defaults_on_garbage() {
        let storage = MemoryStorage::default();
        storage.save(TASK_KEY, "not json at all").expect("save");

        let record: crate::store::TaskRecord = load_record(&storage, TASK_KEY);
        assert!(record.tasks.is_empty());
        assert!(!record.categories.is_empty(), "seeded categories survive");
    }

    #[test]
    fn load_record_defaults_on_missing_key() {
        let storage = MemoryStorage::default();
        let record: crate::identity::IdentityRecord = load_record(&storage, AUTH_KEY);
        assert!(record.accounts.is_empty());
        assert!(!record.is_authenticated);
    }
}
