//! In-memory storage backend for development and testing

use crate::error::StorageError;
use crate::traits::{EntityKind, Storage, StorageResult, WriteOp};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;

/// DashMap-backed storage. Records live until the process exits.
pub struct MemoryStorage {
    records: DashMap<EntityKind, HashMap<String, Vec<u8>>>,
    logs: DashMap<String, Vec<serde_json::Value>>,
    // Serializes transactions so batches never interleave.
    tx_lock: Mutex<()>,
}

impl MemoryStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        let records = DashMap::new();
        for kind in EntityKind::all() {
            records.insert(*kind, HashMap::new());
        }
        Self {
            records,
            logs: DashMap::new(),
            tx_lock: Mutex::new(()),
        }
    }

    fn put_sync(&self, kind: EntityKind, id: &str, bytes: Vec<u8>) {
        self.records
            .entry(kind)
            .or_default()
            .insert(id.to_string(), bytes);
    }

    fn append_sync(&self, log: &str, record: serde_json::Value) {
        self.logs.entry(log.to_string()).or_default().push(record);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.put_sync(kind, id, bytes);
        Ok(())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .records
            .get(&kind)
            .and_then(|map| map.get(id).cloned()))
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StorageResult<bool> {
        Ok(self
            .records
            .get_mut(&kind)
            .map(|mut map| map.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn scan(&self, kind: EntityKind) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .records
            .get(&kind)
            .map(|map| {
                map.iter()
                    .map(|(id, bytes)| (id.clone(), bytes.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, log: &str, record: serde_json::Value) -> StorageResult<()> {
        self.append_sync(log, record);
        Ok(())
    }

    async fn read_log(&self, log: &str) -> StorageResult<Vec<serde_json::Value>> {
        Ok(self
            .logs
            .get(log)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let _guard = self.tx_lock.lock();
        for op in ops {
            match op {
                WriteOp::Put { kind, id, bytes } => self.put_sync(kind, &id, bytes),
                WriteOp::Delete { kind, id } => {
                    if let Some(mut map) = self.records.get_mut(&kind) {
                        map.remove(&id);
                    }
                }
                WriteOp::Append { log, record } => self.append_sync(&log, record),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = MemoryStorage::new();

        storage
            .put(EntityKind::Project, "p1", b"data".to_vec())
            .await
            .unwrap();
        assert_eq!(
            storage.get(EntityKind::Project, "p1").await.unwrap(),
            Some(b"data".to_vec())
        );

        assert!(storage.delete(EntityKind::Project, "p1").await.unwrap());
        assert!(!storage.delete(EntityKind::Project, "p1").await.unwrap());
        assert_eq!(storage.get(EntityKind::Project, "p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let storage = MemoryStorage::new();

        storage
            .put(EntityKind::Checkpoint, "proj-a/cp-1", b"1".to_vec())
            .await
            .unwrap();
        storage
            .put(EntityKind::Checkpoint, "proj-a/cp-2", b"2".to_vec())
            .await
            .unwrap();
        storage
            .put(EntityKind::Checkpoint, "proj-b/cp-1", b"3".to_vec())
            .await
            .unwrap();

        let records = storage
            .scan_prefix(EntityKind::Checkpoint, "proj-a/")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_log_preserves_order() {
        let storage = MemoryStorage::new();

        for i in 0..5 {
            storage
                .append("events", json!({ "seq": i }))
                .await
                .unwrap();
        }

        let log = storage.read_log("events").await.unwrap();
        assert_eq!(log.len(), 5);
        for (i, record) in log.iter().enumerate() {
            assert_eq!(record["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_transaction_applies_all_ops() {
        let storage = MemoryStorage::new();

        storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Artifact,
                    id: "a1".to_string(),
                    bytes: b"artifact".to_vec(),
                },
                WriteOp::Append {
                    log: "events".to_string(),
                    record: json!({ "event_type": "ARTIFACT_DECLARED" }),
                },
            ])
            .await
            .unwrap();

        assert!(storage
            .get(EntityKind::Artifact, "a1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(storage.read_log("events").await.unwrap().len(), 1);
    }
}
