use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::locking::LockingMap;
use crate::traits::SortedPartitionsStore;

/// Runs load-mutate-save cycles against a [`LockingMap`], redoing the whole
/// cycle on lock contention.
///
/// Contention (`ItemIsLocked`, `ItemNotLocked`, `LockExpired`) is retried up
/// to `retry_count` times with a fixed `retry_delay`; after that the call
/// fails with [`StorageError::RetriesExhausted`]. An error returned by the
/// mutation itself releases the lease and is returned immediately.
pub struct StatefulExecutor<S> {
    locks: LockingMap<S>,
}

impl<S> Clone for StatefulExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            locks: self.locks.clone(),
        }
    }
}

enum Attempt<E> {
    Contended(StorageError),
    Fatal(E),
}

impl<S: SortedPartitionsStore> StatefulExecutor<S> {
    pub fn new(locks: LockingMap<S>) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &LockingMap<S> {
        &self.locks
    }

    /// Apply `mutate` to the current value of `partition_key` under its lease.
    ///
    /// `mutate` receives the stored value (absent on first use) and returns
    /// the value to store plus an output for the caller. It may run more than
    /// once when the cycle is retried, so it must not have effects outside
    /// the value it returns.
    pub async fn execute<T, E, F>(&self, partition_key: &str, mut mutate: F) -> Result<T, E>
    where
        F: FnMut(Option<Value>) -> Result<(Value, T), E>,
        E: From<StorageError>,
    {
        let config = self.locks.config();
        let attempts = config.retry_count.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(partition_key, &mut mutate).await {
                Ok(output) => return Ok(output),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Contended(e)) => {
                    debug!(partition_key, attempt, error = %e, "contended, retrying");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }

        let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
        warn!(partition_key, attempts, %last_error, "retries exhausted");
        Err(StorageError::RetriesExhausted {
            partition_key: partition_key.to_string(),
            attempts,
            last_error,
        }
        .into())
    }

    async fn attempt<T, E, F>(&self, partition_key: &str, mutate: &mut F) -> Result<T, Attempt<E>>
    where
        F: FnMut(Option<Value>) -> Result<(Value, T), E>,
        E: From<StorageError>,
    {
        let (value, token) = self
            .locks
            .load(partition_key)
            .await
            .map_err(classify)?;

        let (new_value, output) = match mutate(value) {
            Ok(result) => result,
            Err(e) => {
                if let Err(unlock_err) = self.locks.unlock(&token, partition_key).await {
                    warn!(partition_key, error = %unlock_err, "failed to release lease after rejected mutation");
                }
                return Err(Attempt::Fatal(e));
            }
        };

        self.locks
            .save(&token, partition_key, new_value)
            .await
            .map_err(classify)?;
        Ok(output)
    }
}

fn classify<E: From<StorageError>>(e: StorageError) -> Attempt<E> {
    if e.is_retryable() {
        Attempt::Contended(e)
    } else {
        Attempt::Fatal(e.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{LockConfig, MemoryStore};

    fn executor(retry_count: u32) -> StatefulExecutor<MemoryStore> {
        let config = LockConfig::default()
            .with_lease_duration(Duration::from_secs(5))
            .with_retries(retry_count, Duration::from_millis(5));
        StatefulExecutor::new(LockingMap::new(Arc::new(MemoryStore::new()), config))
    }

    fn increment(value: Option<Value>) -> Result<(Value, i64), StorageError> {
        let n = value.and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        Ok((json!(n), n))
    }

    #[tokio::test]
    async fn sequential_executions_see_previous_value() {
        let exec = executor(3);
        assert_eq!(exec.execute("p", increment).await.unwrap(), 1);
        assert_eq!(exec.execute("p", increment).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn held_lease_exhausts_retries() {
        let exec = executor(3);
        let (_, _token) = exec.locks().load("p").await.unwrap();
        let err = exec.execute("p", increment).await.unwrap_err();
        match err {
            StorageError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn mutation_error_releases_lease_without_retry() {
        let exec = executor(50);
        let mut calls = 0;
        let err = exec
            .execute("p", |_| -> Result<(Value, ()), StorageError> {
                calls += 1;
                Err(StorageError::Backend("rejected".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert_eq!(calls, 1);
        assert!(exec.locks().load("p").await.is_ok());
    }
}
