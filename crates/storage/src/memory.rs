use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::LockRecord;
use crate::traits::SortedPartitionsStore;

/// In-process backend keeping every row in one ordered map.
///
/// Intended for tests and single-instance sandboxes; state is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<(String, String), LockRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all partitions.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SortedPartitionsStore for MemoryStore {
    async fn get_item(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<LockRecord>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(partition_key.to_string(), sort_key.to_string()))
            .cloned())
    }

    async fn put_item_if(
        &self,
        mut record: LockRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool, StorageError> {
        let key = (record.partition_key.clone(), record.sort_key.clone());
        let mut rows = self.rows.write().await;
        let current = rows.get(&key).map(|r| r.revision);
        if current != expected_revision {
            return Ok(false);
        }
        record.revision = expected_revision.unwrap_or(0) + 1;
        rows.insert(key, record);
        Ok(true)
    }

    async fn query_partition(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<LockRecord>, StorageError> {
        let rows = self.rows.read().await;
        let start = (partition_key.to_string(), String::new());
        Ok(rows
            .range(start..)
            .take_while(|((pk, _), _)| pk == partition_key)
            .filter(|((_, sk), _)| sort_key_prefix.is_none_or(|prefix| sk.starts_with(prefix)))
            .map(|(_, record)| record.clone())
            .collect())
    }
}
