use crate::error::DiningError;
use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const CHAT_SESSIONS_KEY: &str = "chatSessions";
pub const MEAL_HISTORY_KEY: &str = "mealHistory";

/// String-keyed JSON documents, the local equivalent of browser storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Raw document stored under `key`, if any
    async fn read(&self, key: &str) -> Result<Option<String>, DiningError>;

    async fn write(&self, key: &str, document: String) -> Result<(), DiningError>;
}

/// Load a JSON list stored under `key`. Missing or malformed data yields an
/// empty list; entries that do not match `T` are dropped.
pub async fn load_list<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    match store.read(key).await {
        Ok(Some(document)) => parse_entries(key, &document),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Could not read {}: {}", key, e);
            Vec::new()
        }
    }
}

fn parse_entries<T: DeserializeOwned>(key: &str, document: &str) -> Vec<T> {
    let values = match serde_json::from_str::<Vec<Value>>(document) {
        Ok(values) => values,
        Err(e) => {
            warn!("Discarding malformed {} data: {}", key, e);
            return Vec::new();
        }
    };

    let total = values.len();
    let entries: Vec<T> = values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if entries.len() < total {
        warn!("Skipped {} malformed {} entries", total - entries.len(), key);
    }
    entries
}

pub async fn save_list<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    list: &[T],
) -> Result<(), DiningError> {
    store.write(key, serde_json::to_string(list)?).await
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, DiningError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, document: String) -> Result<(), DiningError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        debug!("Writing {} bytes to {}", document.len(), path.display());
        tokio::fs::write(path, document).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, DiningError> {
        Ok(self.documents.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, document: String) -> Result<(), DiningError> {
        self.documents.lock().await.insert(key.to_string(), document);
        Ok(())
    }
}

/// Memory-backed store whose writes can be switched to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self) {
        self.failing.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn read(&self, key: &str) -> Result<Option<String>, DiningError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, document: String) -> Result<(), DiningError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.write(key, document).await
    }
}
