//! Key/value memoization stores for catalog lookups.
//!
//! [`DiskCache`] keeps one file per key under `<root>/<cache id>` and survives
//! between runs; [`MemoryCache`] lives for a single process. Both store JSON
//! values, and lookups that failed with a not-found are stored as well (see
//! [`CachedResult`]) so they are not asked again until the cache is cleared.
//!
//! A cache id must be owned by a single run: concurrent writers to the same
//! directory are not coordinated.

use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};
use tracing::{debug, warn};

use crate::error::{Result, SpotmoverError};

pub trait Cache: Send + Sync {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    /// Fails with [`SpotmoverError::KeyNotFound`] when `key` is absent.
    fn remove(&self, key: &str) -> Result<()>;
    /// Every stored key. Each call starts a fresh enumeration.
    fn keys(&self) -> Result<Box<dyn Iterator<Item = String> + '_>>;

    fn get_or(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    fn clear(&self) -> Result<()> {
        let keys: Vec<String> = self.keys()?.collect();
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }
}

/// What a single cache file holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
}

fn cache_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid cache id pattern"))
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Opens the cache `cache_id` under the system temp directory.
    pub fn new(cache_id: &str) -> Result<Self> {
        Self::in_dir(&std::env::temp_dir(), cache_id)
    }

    /// Opens the cache `cache_id` under `root`, creating its directory if needed.
    pub fn in_dir(root: &Path, cache_id: &str) -> Result<Self> {
        // The id becomes a path component.
        if !cache_id_pattern().is_match(cache_id) {
            return Err(SpotmoverError::InvalidIdentifier(cache_id.to_string()));
        }

        let cache_dir = root.join(cache_id);
        fs::create_dir_all(&cache_dir)?;
        debug!("Using cache directory {}", cache_dir.display());
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{:x}", Sha256::digest(key.as_bytes())))
    }

    fn read_entry(path: &Path) -> Option<CacheEntry> {
        let bytes = match fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return None,
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl DiskCache {
    /// Empty files (an interrupted write) and unreadable ones both count as absent.
    fn entry(&self, key: &str) -> Option<CacheEntry> {
        Self::read_entry(&self.path_for_key(key)).filter(|entry| entry.key == key)
    }
}

impl Cache for DiskCache {
    fn has(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entry(key).map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
        };
        fs::write(self.path_for_key(key), serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.has(key) {
            return Err(SpotmoverError::KeyNotFound(key.to_string()));
        }
        fs::remove_file(self.path_for_key(key))?;
        Ok(())
    }

    fn keys(&self) -> Result<Box<dyn Iterator<Item = String> + '_>> {
        let entries = fs::read_dir(&self.cache_dir)?;
        Ok(Box::new(entries.filter_map(|entry| {
            let path = entry.ok()?.path();
            Self::read_entry(&path).map(|entry| entry.key)
        })))
    }

    fn clear(&self) -> Result<()> {
        // Also sweeps empty leftovers that `keys` never reports.
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Process-local cache, used when the on-disk cache is disabled.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Cache for MemoryCache {
    fn has(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SpotmoverError::KeyNotFound(key.to_string()))
    }

    fn keys(&self) -> Result<Box<dyn Iterator<Item = String> + '_>> {
        let keys: Vec<String> = self.entries().keys().cloned().collect();
        Ok(Box::new(keys.into_iter()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedErrorKind {
    NotFound,
}

/// The outcome of a lookup as it is persisted: either the value, or the
/// error that ended it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedResult<T> {
    Ok { value: T },
    Err { kind: CachedErrorKind, message: String },
}

impl<T: Clone> CachedResult<T> {
    /// `None` for errors that must not be remembered (transport, auth, ...).
    pub fn from_result(result: &Result<T>) -> Option<Self> {
        match result {
            Ok(value) => Some(CachedResult::Ok {
                value: value.clone(),
            }),
            Err(SpotmoverError::NotFound(message)) => Some(CachedResult::Err {
                kind: CachedErrorKind::NotFound,
                message: message.clone(),
            }),
            Err(_) => None,
        }
    }
}

impl<T> CachedResult<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            CachedResult::Ok { value } => Ok(value),
            CachedResult::Err {
                kind: CachedErrorKind::NotFound,
                message,
            } => Err(SpotmoverError::NotFound(message)),
        }
    }
}

/// Reads back a remembered lookup. A stored error comes back as `Some(Err(_))`.
pub fn recall<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<Result<T>>> {
    let Some(value) = cache.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_value::<CachedResult<T>>(value) {
        Ok(cached) => Ok(Some(cached.into_result())),
        Err(e) => {
            warn!("Discarding malformed cache value for {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Stores the outcome of a lookup, unless it is an error worth retrying later.
pub fn remember<T: Serialize + Clone>(cache: &dyn Cache, key: &str, result: &Result<T>) -> Result<()> {
    match CachedResult::from_result(result) {
        Some(cached) => cache.set(key, serde_json::to_value(cached)?),
        None => Ok(()),
    }
}
