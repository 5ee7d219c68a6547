//! Key-value backends
//!
//! Values are JSON text. Both backends can enforce a byte quota over the
//! sum of key and value lengths, like a browser storage area does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::error::{StoreError, StoreResult};

const FILE_SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";

/// String key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or replace. Fails with `QuotaExceeded` leaving the old value
    /// in place when the write would exceed the quota.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key; missing keys are not an error
    async fn remove(&self, key: &str) -> StoreResult<()>;

    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn check_quota(key: &str, usage_without_key: u64, value_len: u64, quota: Option<u64>) -> StoreResult<()> {
    if let Some(limit) = quota {
        let requested = usage_without_key + key.len() as u64 + value_len;
        if requested > limit {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                requested,
                limit,
            });
        }
    }
    Ok(())
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota_bytes),
        }
    }

    /// Bytes in use (keys plus values)
    pub async fn usage(&self) -> u64 {
        let entries = self.entries.read().await;
        entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        check_key(key)?;
        let mut entries = self.entries.write().await;
        let others: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        check_quota(key, others, value.len() as u64, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Directory-backed store: one file per key
pub struct FileStore {
    root: PathBuf,
    quota: Option<u64>,
    /// Serializes writers so quota accounting sees a stable directory
    write_lock: tokio::sync::Mutex<()>,
}

/// Escape a key into a portable file name
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept; every other byte becomes
/// `%XX`.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Inverse of [`escape_key`]; None for names this store did not write
pub fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            quota: None,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota = quota_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{}", escape_key(key), FILE_SUFFIX))
    }

    /// Bytes in use by every key except `skip`
    async fn usage_without(&self, skip: &str) -> StoreResult<u64> {
        let mut total = 0;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(key) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
                .and_then(unescape_key)
            else {
                continue;
            };
            if key == skip {
                continue;
            }
            total += key.len() as u64 + entry.metadata().await?.len();
        }
        Ok(total)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    #[instrument(skip(self), fields(storage = "file"))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        check_key(key)?;
        match fs::read_to_string(self.path_for(key)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(key, error = %e, "Stored value is not text, ignoring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, value), fields(storage = "file", len = value.len()))]
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        check_key(key)?;
        let _guard = self.write_lock.lock().await;

        if self.quota.is_some() {
            let others = self.usage_without(key).await?;
            check_quota(key, others, value.len() as u64, self.quota)?;
        }

        let path = self.path_for(key);
        let tmp = self
            .root
            .join(format!("{}{}{}", escape_key(key), FILE_SUFFIX, TMP_SUFFIX));
        fs::write(&tmp, value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            warn!(path = %path.display(), error = %e, "Atomic rename failed");
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), "Value stored");
        Ok(())
    }

    #[instrument(skip(self), fields(storage = "file"))]
    async fn remove(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
                .and_then(unescape_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip() {
        let key = "IdeaLegnoApp_V0_7:job:17";
        let escaped = escape_key(key);
        assert_eq!(escaped, "IdeaLegnoApp_V0_7%3Ajob%3A17");
        assert_eq!(unescape_key(&escaped).as_deref(), Some(key));
        assert_eq!(escape_key("a/b"), "a%2Fb");
        assert!(unescape_key("bad%Z").is_none());
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_quota_keeps_old_value() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").await.unwrap();

        let err = store.set("k", "1234567890").await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { requested: 11, limit: 10, .. }));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("12345"));
        // replacing with a value of the same size still fits
        store.set("k", "abcde").await.unwrap();
        assert_eq!(store.usage().await, 6);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("commesse:v2:index", "{\"a\":1}").await.unwrap();
        store.set("commesse:v2:job:x", "{}").await.unwrap();
        assert_eq!(
            store.get("commesse:v2:index").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["commesse:v2:index".to_string(), "commesse:v2:job:x".to_string()]
        );

        store.remove("commesse:v2:job:x").await.unwrap();
        store.remove("commesse:v2:job:x").await.unwrap();
        assert_eq!(store.get("commesse:v2:job:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_non_utf8_value_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        fs::write(dir.path().join("commesse%3Av2%3Aindex.json"), [0xFF, 0xFE, b'{'])
            .await
            .unwrap();

        assert_eq!(store.get("commesse:v2:index").await.unwrap(), None);
        store.set("commesse:v2:index", "{}").await.unwrap();
        assert_eq!(store.get("commesse:v2:index").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_file_store_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap().with_quota(Some(20));

        store.set("a", "0123456789").await.unwrap();
        let err = store.set("b", "0123456789").await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { requested: 22, limit: 20, .. }));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set("", "x").await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}
