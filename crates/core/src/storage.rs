//! Typed key/value storage for a single room.
//!
//! A room's state lives as a flat namespace of string keys to JSON values.
//! The only cross-cutting read pattern the dispatcher needs is a prefix
//! scan (e.g. every `event:` key in key order), so the backing map is a
//! `BTreeMap` rather than a `HashMap`. The whole map round-trips to a single
//! JSON snapshot file on disk, the same discipline the rest of this corpus
//! uses for its file-backed stores: load once on startup, write-through on
//! every mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::Result;

/// Abstract key/value contract consumed by the dispatcher (spec §4.3).
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<Value>>;
    async fn put_raw(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Keys are returned in ascending lexical order.
    async fn list_prefix_raw(&self, prefix: &str) -> Result<Vec<(String, Value)>>;
}

/// Blanket typed helpers layered over the raw `Value` contract.
#[async_trait::async_trait]
pub trait StorageExt: Storage {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        self.put_raw(key, serde_json::to_value(value)?).await
    }

    async fn list_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<(String, T)>> {
        let raw = self.list_prefix_raw(prefix).await?;
        raw.into_iter()
            .map(|(k, v)| Ok((k, serde_json::from_value(v)?)))
            .collect()
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// In-process storage backed by a JSON snapshot file. Every mutating call
/// rewrites the whole file; reads never touch disk once loaded.
pub struct JsonFileStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| Error::Storage(format!("corrupt snapshot {}: {e}", path.display())))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    async fn persist(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStore {
    async fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.map.write().await;
        map.insert(key.to_string(), value);
        self.persist(&map).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.map.write().await;
        if map.remove(key).is_some() {
            self.persist(&map).await?;
        }
        Ok(())
    }

    async fn list_prefix_raw(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let map = self.map.read().await;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Key schema (spec §3). Centralized so a typo can't desync a reader from
/// a writer.
pub mod keys {
    pub fn event(ts: i64, id: &str) -> String {
        format!("event:{ts:020}:{id}")
    }

    pub const EVENT_PREFIX: &str = "event:";

    pub const LEADER_LEASE: &str = "leader_lease";
    pub const LEADER: &str = "leader";

    pub fn task_claim(task_id: &str) -> String {
        format!("task_claim:{task_id}")
    }
    pub const TASK_CLAIM_PREFIX: &str = "task_claim:";

    pub fn file_lock(path: &str) -> String {
        format!("file_lock:{path}")
    }
    pub const FILE_LOCK_PREFIX: &str = "file_lock:";

    pub fn auction(task_id: &str) -> String {
        format!("auction:{task_id}")
    }
    pub const AUCTION_PREFIX: &str = "auction:";

    pub fn frozen(agent: &str) -> String {
        format!("frozen:{agent}")
    }
    pub const FROZEN_PREFIX: &str = "frozen:";

    pub fn pulse(agent: &str) -> String {
        format!("pulse:{agent}")
    }
    pub const PULSE_PREFIX: &str = "pulse:";

    /// Singleton — spec §3 models urgent as a single slot, not a collection.
    pub const URGENT_ACTIVE: &str = "urgent_active";

    pub fn knowledge(id: &str) -> String {
        format!("knowledge:{id}")
    }
    pub const KNOWLEDGE_PREFIX: &str = "knowledge:";

    pub const AUTHORIZED_MCPS: &str = "authorized_mcps";
    pub const SWARM_STOPPED: &str = "swarm_stopped";
}

pub(crate) fn snapshot_path(data_dir: &Path, project: &str) -> PathBuf {
    data_dir.join(format!("{project}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("room.json")).await.unwrap();
        store.put("leader", &"alice".to_string()).await.unwrap();
        let got: Option<String> = store.get("leader").await.unwrap();
        assert_eq!(got.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn prefix_scan_is_ordered_and_scoped() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("room.json")).await.unwrap();
        store.put_raw("event:00000000000000000100:a", Value::from(1)).await.unwrap();
        store.put_raw("event:00000000000000000200:b", Value::from(2)).await.unwrap();
        store.put_raw("pulse:alice", Value::from(3)).await.unwrap();

        let events = store.list_prefix_raw("event:").await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].0 < events[1].0);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("room.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.put("k", &42i64).await.unwrap();
        }
        let store = JsonFileStore::open(&path).await.unwrap();
        let got: Option<i64> = store.get("k").await.unwrap();
        assert_eq!(got, Some(42));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("room.json")).await.unwrap();
        store.put("k", &1i32).await.unwrap();
        store.delete("k").await.unwrap();
        let got: Option<i32> = store.get("k").await.unwrap();
        assert_eq!(got, None);
    }
}
