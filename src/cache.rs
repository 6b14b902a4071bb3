//! Durable key→value caches, one JSON file per namespace.
//!
//! Every access re-reads the file (read-modify-write), so two store handles
//! over the same namespace never see stale in-memory state. Writes are
//! last-writer-wins; there is no cross-process locking.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A cached payload stamped with its write time and time-to-live.
///
/// Expiry is a read-time validity check: stale records stay on disk until
/// they are overwritten by a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub written_at: DateTime<Utc>,
    pub ttl: Duration,
    pub payload: T,
}

impl<T> CacheRecord<T> {
    pub fn new(payload: T, ttl: Duration) -> Self {
        Self {
            written_at: Utc::now(),
            ttl,
            payload,
        }
    }

    /// A record is valid while `now - written_at < ttl`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.written_at < ttl,
            // A TTL too large for chrono never expires
            Err(_) => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// String key→value store persisted as `<save_dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    name: String,
    save_dir: PathBuf,
}

impl KeyValueStore {
    /// Open (or create) the namespace file under `save_dir`.
    pub fn open(name: &str, save_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(save_dir)?;
        let store = Self {
            name: name.to_string(),
            save_dir: save_dir.to_path_buf(),
        };
        if !store.save_file().exists() {
            store.store(&HashMap::new())?;
        }
        Ok(store)
    }

    fn save_file(&self) -> PathBuf {
        self.save_dir.join(format!("{}.json", self.name))
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let content = std::fs::read_to_string(self.save_file())?;
        match serde_json::from_str(&content) {
            Ok(data) => Ok(data),
            Err(e) => {
                log::warn!(
                    "Cache file {} is unreadable, starting fresh: {}",
                    self.save_file().display(),
                    e
                );
                Ok(HashMap::new())
            }
        }
    }

    fn store(&self, data: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(self.save_file(), content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.load()?;
        data.insert(key.to_string(), value.to_string());
        self.store(&data)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.load()?;
        data.remove(key);
        self.store(&data)
    }
}

/// Typed wrapper storing [`CacheRecord`]s as JSON strings in a
/// [`KeyValueStore`] namespace.
#[derive(Debug, Clone)]
pub struct TypedStore<T> {
    inner: KeyValueStore,
    _payload: PhantomData<fn() -> T>,
}

impl<T> TypedStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn open(name: &str, save_dir: &Path) -> Result<Self> {
        Ok(Self {
            inner: KeyValueStore::open(name, save_dir)?,
            _payload: PhantomData,
        })
    }

    /// Fetch a record. An unparsable record is logged and treated as absent
    /// so a refresh can overwrite it.
    pub fn get(&self, key: &str) -> Result<Option<CacheRecord<T>>> {
        let Some(raw) = self.inner.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("Discarding unreadable cache record {}: {}", key, e);
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &str, record: &CacheRecord<T>) -> Result<()> {
        self.inner.set(key, &serde_json::to_string(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record_at(written_at: DateTime<Utc>, ttl_secs: u64) -> CacheRecord<u32> {
        CacheRecord {
            written_at,
            ttl: Duration::from_secs(ttl_secs),
            payload: 1,
        }
    }

    #[test]
    fn record_valid_strictly_inside_ttl() {
        let now = Utc::now();
        let fresh = record_at(now - chrono::Duration::seconds(59), 60);
        assert!(fresh.is_valid_at(now));

        // exactly at the boundary the record is already stale
        let boundary = record_at(now - chrono::Duration::seconds(60), 60);
        assert!(!boundary.is_valid_at(now));

        let stale = record_at(now - chrono::Duration::seconds(61), 60);
        assert!(!stale.is_valid_at(now));
    }

    #[test]
    fn get_set_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = KeyValueStore::open("notes", dir.path()).unwrap();

        assert_eq!(store.get("genshin").unwrap(), None);
        store.set("genshin", "UID only").unwrap();
        assert_eq!(store.get("genshin").unwrap(), Some("UID only".to_string()));

        store.delete("genshin").unwrap();
        assert_eq!(store.get("genshin").unwrap(), None);
    }

    #[test]
    fn two_handles_share_one_file() {
        let dir = TempDir::new().unwrap();
        let writer = KeyValueStore::open("shared", dir.path()).unwrap();
        let reader = KeyValueStore::open("shared", dir.path()).unwrap();

        writer.set("k", "v1").unwrap();
        assert_eq!(reader.get("k").unwrap(), Some("v1".to_string()));

        // no staleness: the second write is visible through the first handle
        reader.set("k", "v2").unwrap();
        assert_eq!(writer.get("k").unwrap(), Some("v2".to_string()));
    }

    #[test]
    fn namespaces_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let a = KeyValueStore::open("a", dir.path()).unwrap();
        let b = KeyValueStore::open("b", dir.path()).unwrap();

        a.set("k", "from-a").unwrap();
        assert_eq!(b.get("k").unwrap(), None);
        assert!(dir.path().join("a.json").exists());
        assert!(dir.path().join("b.json").exists());
    }

    #[test]
    fn typed_store_round_trips_records() {
        let dir = TempDir::new().unwrap();
        let store: TypedStore<BTreeMap<String, String>> =
            TypedStore::open("denominations", dir.path()).unwrap();

        let mut payload = BTreeMap::new();
        payload.insert("60".to_string(), "0.99".to_string());
        let record = CacheRecord::new(payload.clone(), Duration::from_secs(3600));
        store.set("genshin", &record).unwrap();

        let loaded = store.get("genshin").unwrap().unwrap();
        assert_eq!(loaded.payload, payload);
        assert!(loaded.is_valid());
    }

    #[test]
    fn typed_store_treats_garbage_as_absent() {
        let dir = TempDir::new().unwrap();
        let raw = KeyValueStore::open("denominations", dir.path()).unwrap();
        raw.set("genshin", "not a record").unwrap();

        let store: TypedStore<u32> = TypedStore::open("denominations", dir.path()).unwrap();
        assert!(store.get("genshin").unwrap().is_none());
    }
}
