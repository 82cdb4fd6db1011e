//! Metadata store plugins
//!
//! Durable get/set/remove of attribute documents keyed by string, used by the
//! transfer layer for discovery and auxiliary persisted state. Operations are
//! atomic per key; no cross-key transactions. A transient backend failure
//! surfaces as `Unavailable` and is the caller's to retry with backoff.
//!
//! Backends are selected by connection descriptor:
//! `memory://` (in-process), `rocksdb://<path>` (local file-based),
//! `redis://host:port` (external coordination service).

use crate::common::{AttributeDocument, Error, Result};
use crate::plugin::split_descriptor;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch the document stored under `key`; `NotFound` when absent.
    async fn get(&self, key: &str) -> Result<AttributeDocument>;

    /// Store `value` under `key`, replacing any previous document.
    async fn set(&self, key: &str, value: AttributeDocument) -> Result<()>;

    /// Delete the document under `key`; `NotFound` when absent.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Open the backend selected by `descriptor`.
pub async fn open_store(descriptor: &str) -> Result<Arc<dyn MetadataStore>> {
    let (scheme, rest) = split_descriptor(descriptor)?;
    match scheme {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "rocksdb" => Ok(Arc::new(RocksStore::open(rest)?)),
        "redis" => Ok(Arc::new(RedisStore::connect(rest).await?)),
        other => Err(Error::InvalidConfig(format!(
            "unknown metadata store scheme: {other}"
        ))),
    }
}

// === In-process backend ===

/// Reference backend: a process-local map. Used in tests and single-node
/// deployments where nothing has to survive a restart.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, AttributeDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<AttributeDocument> {
        self.entries
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: AttributeDocument) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

// === File-based backend ===

/// RocksDB-backed store for single-node durability. Documents are stored as
/// JSON values under the raw key bytes.
pub struct RocksStore {
    db: rocksdb::DB,
}

impl RocksStore {
    pub fn open(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidConfig(
                "rocksdb descriptor needs a path, e.g. rocksdb:///var/lib/segkv".into(),
            ));
        }
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let db = rocksdb::DB::open(&opts, path)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl MetadataStore for RocksStore {
    async fn get(&self, key: &str) -> Result<AttributeDocument> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: AttributeDocument) -> Result<()> {
        let bytes = serde_json::to_vec(&value)?;
        self.db.put(key.as_bytes(), bytes)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.db.get(key.as_bytes())?.is_none() {
            return Err(Error::NotFound(key.to_string()));
        }
        self.db.delete(key.as_bytes())?;
        Ok(())
    }
}

// === External coordination service backend ===

/// Redis-backed store. The connection manager reconnects on its own; errors
/// while the backend is unreachable map to `Unavailable`.
pub struct RedisStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = redis::Client::open(format!("redis://{addr}"))?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl MetadataStore for RedisStore {
    async fn get(&self, key: &str) -> Result<AttributeDocument> {
        let mut con = self.manager.clone();
        let raw: Option<String> = con.get(key).await?;
        match raw {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: AttributeDocument) -> Result<()> {
        let mut con = self.manager.clone();
        let text = serde_json::to_string(&value)?;
        con.set::<_, _, ()>(key, text).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut con = self.manager.clone();
        let deleted: u64 = con.del(key).await?;
        if deleted == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_doc() -> AttributeDocument {
        let mut doc = AttributeDocument::map();
        doc.insert("addr", "10.0.0.1:7000");
        doc.insert("buffer_key", 42i64);
        doc
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = open_store("memory://").await.unwrap();

        assert!(matches!(store.get("peer/1").await, Err(Error::NotFound(_))));

        store.set("peer/1", sample_doc()).await.unwrap();
        let doc = store.get("peer/1").await.unwrap();
        assert_eq!(doc.get("addr").and_then(|d| d.as_str()), Some("10.0.0.1:7000"));

        store.remove("peer/1").await.unwrap();
        assert!(matches!(
            store.remove("peer/1").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryStore::new();
        store.set("k", sample_doc()).await.unwrap();

        let mut updated = AttributeDocument::map();
        updated.insert("addr", "10.0.0.2:7000");
        store.set("k", updated.clone()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_rocksdb_store_persists() {
        let dir = tempdir().unwrap();
        let descriptor = format!("rocksdb://{}", dir.path().join("meta").display());

        {
            let store = open_store(&descriptor).await.unwrap();
            store.set("peer/1", sample_doc()).await.unwrap();
        }
        // Reopen and read back.
        let store = open_store(&descriptor).await.unwrap();
        let doc = store.get("peer/1").await.unwrap();
        assert_eq!(doc.get("buffer_key").and_then(|d| d.as_i64()), Some(42));

        store.remove("peer/1").await.unwrap();
        assert!(matches!(
            store.get("peer/1").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        assert!(matches!(
            open_store("zookeeper://x").await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            open_store("garbage").await,
            Err(Error::InvalidConfig(_))
        ));
    }
}
