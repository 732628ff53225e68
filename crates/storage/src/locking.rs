use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::StorageError;
use crate::record::{now_millis, LockRecord, LockToken};
use crate::traits::SortedPartitionsStore;

/// Sort key of the single lockable row each session owns.
pub const STATE_SORT_KEY: &str = "state";

/// Lease-based exclusive access to rows of a [`SortedPartitionsStore`].
///
/// `load` grants a lease, `save` stores a new value and releases it, and
/// `unlock` releases it without writing. A lease that outlives
/// `lease_duration` lapses on its own: the next `load` succeeds and the
/// original holder's `save` fails with [`StorageError::LockExpired`].
pub struct LockingMap<S> {
    store: Arc<S>,
    config: LockConfig,
}

impl<S> Clone for LockingMap<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: SortedPartitionsStore> LockingMap<S> {
    pub fn new(store: Arc<S>, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Acquire the lease on `partition_key` and return its current value.
    pub async fn load(
        &self,
        partition_key: &str,
    ) -> Result<(Option<Value>, LockToken), StorageError> {
        self.load_item(partition_key, STATE_SORT_KEY).await
    }

    /// Store `value` under `partition_key` and release the lease.
    pub async fn save(
        &self,
        token: &LockToken,
        partition_key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        self.save_item(token, partition_key, STATE_SORT_KEY, value)
            .await
    }

    /// Release the lease without writing.
    pub async fn unlock(&self, token: &LockToken, partition_key: &str) -> Result<(), StorageError> {
        self.unlock_item(token, partition_key, STATE_SORT_KEY).await
    }

    /// The last saved value, read without taking a lease.
    pub async fn read(&self, partition_key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .store
            .get_item(partition_key, STATE_SORT_KEY)
            .await?
            .and_then(|record| record.value))
    }

    pub async fn load_item(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<(Option<Value>, LockToken), StorageError> {
        let now = now_millis();
        let current = self.store.get_item(partition_key, sort_key).await?;
        if let Some((holder, until)) = current.as_ref().and_then(|r| r.live_lease(now)) {
            return Err(StorageError::ItemIsLocked {
                partition_key: partition_key.to_string(),
                sort_key: sort_key.to_string(),
                locked_by: holder.to_string(),
                locked_until: until,
            });
        }

        let holder = Uuid::new_v4().to_string();
        let locked_until = now.saturating_add(self.config.lease_millis());
        let value = current.as_ref().and_then(|r| r.value.clone());
        let mut record = LockRecord::new(partition_key, sort_key, value.clone());
        record.locked_by = Some(holder.clone());
        record.locked_until = Some(locked_until);

        if !self
            .store
            .put_item_if(record, current.as_ref().map(|r| r.revision))
            .await?
        {
            // Another caller acquired the row between our read and write.
            return Err(self.contended(partition_key, sort_key).await);
        }

        debug!(partition_key, sort_key, %holder, locked_until, "lease acquired");
        Ok((value, LockToken::new(holder, locked_until)))
    }

    pub async fn save_item(
        &self,
        token: &LockToken,
        partition_key: &str,
        sort_key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        if token.is_expired(now_millis()) {
            return Err(StorageError::LockExpired {
                partition_key: partition_key.to_string(),
                sort_key: sort_key.to_string(),
                holder: token.holder().to_string(),
                locked_until: token.locked_until(),
            });
        }
        let current = self.held_record(token, partition_key, sort_key).await?;

        let record = LockRecord::new(partition_key, sort_key, Some(value));
        if !self.store.put_item_if(record, Some(current.revision)).await? {
            return Err(not_locked(token, partition_key, sort_key));
        }
        debug!(partition_key, sort_key, holder = token.holder(), "saved and released");
        Ok(())
    }

    pub async fn unlock_item(
        &self,
        token: &LockToken,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<(), StorageError> {
        if token.is_expired(now_millis()) {
            debug!(
                partition_key,
                sort_key,
                holder = token.holder(),
                "unlock after lease expiry ignored"
            );
            return Ok(());
        }
        let current = self.held_record(token, partition_key, sort_key).await?;

        let record = LockRecord::new(partition_key, sort_key, current.value.clone());
        if !self.store.put_item_if(record, Some(current.revision)).await? {
            return Err(not_locked(token, partition_key, sort_key));
        }
        debug!(partition_key, sort_key, holder = token.holder(), "lease released");
        Ok(())
    }

    async fn held_record(
        &self,
        token: &LockToken,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<LockRecord, StorageError> {
        match self.store.get_item(partition_key, sort_key).await? {
            Some(record)
                if record.locked_by.as_deref() == Some(token.holder())
                    && record.locked_until == Some(token.locked_until()) =>
            {
                Ok(record)
            }
            _ => Err(not_locked(token, partition_key, sort_key)),
        }
    }

    async fn contended(&self, partition_key: &str, sort_key: &str) -> StorageError {
        let winner = self
            .store
            .get_item(partition_key, sort_key)
            .await
            .ok()
            .flatten();
        let (locked_by, locked_until) = winner
            .and_then(|r| Some((r.locked_by?, r.locked_until?)))
            .unwrap_or_else(|| ("<concurrent writer>".to_string(), now_millis()));
        StorageError::ItemIsLocked {
            partition_key: partition_key.to_string(),
            sort_key: sort_key.to_string(),
            locked_by,
            locked_until,
        }
    }
}

fn not_locked(token: &LockToken, partition_key: &str, sort_key: &str) -> StorageError {
    StorageError::ItemNotLocked {
        partition_key: partition_key.to_string(),
        sort_key: sort_key.to_string(),
        holder: token.holder().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::MemoryStore;

    fn map(lease: Duration) -> LockingMap<MemoryStore> {
        LockingMap::new(
            Arc::new(MemoryStore::new()),
            LockConfig::default().with_lease_duration(lease),
        )
    }

    #[tokio::test]
    async fn first_load_is_absent() {
        let map = map(Duration::from_secs(5));
        let (value, token) = map.load("session#a").await.unwrap();
        assert!(value.is_none());
        map.save(&token, "session#a", json!({"n": 1})).await.unwrap();
        assert_eq!(map.read("session#a").await.unwrap(), Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn second_load_is_locked_until_save() {
        let map = map(Duration::from_secs(5));
        let (_, token) = map.load("session#a").await.unwrap();
        let err = map.load("session#a").await.unwrap_err();
        assert!(matches!(err, StorageError::ItemIsLocked { .. }), "{err}");
        map.save(&token, "session#a", json!(1)).await.unwrap();
        let (value, _) = map.load("session#a").await.unwrap();
        assert_eq!(value, Some(json!(1)));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let map = map(Duration::from_secs(5));
        let _a = map.load("session#a").await.unwrap();
        assert!(map.load("session#b").await.is_ok());
    }

    #[tokio::test]
    async fn save_after_expiry_reports_lock_expired() {
        let map = map(Duration::from_millis(30));
        let (_, stale) = map.load("session#a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let (_, fresh) = map.load("session#a").await.unwrap();
        let err = map.save(&stale, "session#a", json!("stale")).await.unwrap_err();
        assert!(matches!(err, StorageError::LockExpired { .. }), "{err}");
        map.save(&fresh, "session#a", json!("fresh")).await.unwrap();
        assert_eq!(map.read("session#a").await.unwrap(), Some(json!("fresh")));
    }

    #[tokio::test]
    async fn unlock_keeps_value() {
        let map = map(Duration::from_secs(5));
        let (_, token) = map.load("session#a").await.unwrap();
        map.save(&token, "session#a", json!("kept")).await.unwrap();
        let (_, token) = map.load("session#a").await.unwrap();
        map.unlock(&token, "session#a").await.unwrap();
        let (value, _) = map.load("session#a").await.unwrap();
        assert_eq!(value, Some(json!("kept")));
    }
}
