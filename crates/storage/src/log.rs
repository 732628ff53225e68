use std::sync::Arc;

use serde_json::Value;

use crate::error::StorageError;
use crate::record::LockRecord;
use crate::traits::SortedPartitionsStore;

/// Append-only, lock-free log of values ordered by sort key.
///
/// Writers choose sort keys of the form `<timestamp>#<id>` so concurrent
/// appends never collide and reads come back in chronological order.
pub struct ExchangeLog<S> {
    store: Arc<S>,
}

impl<S> Clone for ExchangeLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SortedPartitionsStore> ExchangeLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Write a new row. Fails with [`StorageError::AlreadyExists`] rather
    /// than overwrite an existing entry.
    pub async fn append(
        &self,
        partition_key: &str,
        sort_key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        let record = LockRecord::new(partition_key, sort_key, Some(value));
        if self.store.put_item_if(record, None).await? {
            Ok(())
        } else {
            Err(StorageError::AlreadyExists {
                partition_key: partition_key.to_string(),
                sort_key: sort_key.to_string(),
            })
        }
    }

    pub async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Value>, StorageError> {
        Ok(self
            .store
            .get_item(partition_key, sort_key)
            .await?
            .and_then(|record| record.value))
    }

    /// Every value of the partition in ascending sort-key order.
    pub async fn list_by_partition(&self, partition_key: &str) -> Result<Vec<Value>, StorageError> {
        self.list(partition_key, None).await
    }

    pub async fn list_by_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
    ) -> Result<Vec<Value>, StorageError> {
        self.list(partition_key, Some(sort_key_prefix)).await
    }

    async fn list(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<Value>, StorageError> {
        Ok(self
            .store
            .query_partition(partition_key, sort_key_prefix)
            .await?
            .into_iter()
            .filter_map(|record| record.value)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn list_is_sorted_regardless_of_write_order() {
        let log = ExchangeLog::new(Arc::new(MemoryStore::new()));
        log.append("P", "t2", json!("v2")).await.unwrap();
        log.append("P", "t1", json!("v1")).await.unwrap();
        assert_eq!(
            log.list_by_partition("P").await.unwrap(),
            vec![json!("v1"), json!("v2")]
        );
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let log = ExchangeLog::new(Arc::new(MemoryStore::new()));
        log.append("P", "t1", json!(1)).await.unwrap();
        let err = log.append("P", "t1", json!(2)).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(log.get("P", "t1").await.unwrap(), Some(json!(1)));
    }
}
