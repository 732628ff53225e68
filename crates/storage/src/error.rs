/// All errors that can be returned by the locking map, the exchange log or a
/// [`SortedPartitionsStore`](crate::SortedPartitionsStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Another caller holds a live lease on the item.
    #[error("item {partition_key}/{sort_key} is locked by {locked_by} until {locked_until}")]
    ItemIsLocked {
        partition_key: String,
        sort_key: String,
        locked_by: String,
        locked_until: i64,
    },

    /// The presented lock token is not the current holder of the item, or
    /// the item does not exist.
    #[error("item {partition_key}/{sort_key} is not locked by {holder}")]
    ItemNotLocked {
        partition_key: String,
        sort_key: String,
        holder: String,
    },

    /// The caller's own lease lapsed before it saved.
    #[error("lease of {holder} on {partition_key}/{sort_key} expired at {locked_until}")]
    LockExpired {
        partition_key: String,
        sort_key: String,
        holder: String,
        locked_until: i64,
    },

    /// An append-only row with this key already exists.
    #[error("item already exists: {partition_key}/{sort_key}")]
    AlreadyExists {
        partition_key: String,
        sort_key: String,
    },

    /// The retrying executor ran out of attempts.
    #[error("gave up on {partition_key} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        partition_key: String,
        attempts: u32,
        last_error: String,
    },

    /// A stored value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backend-specific storage error (connection, throttling, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether redoing the whole load-mutate-save cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::ItemIsLocked { .. }
                | StorageError::ItemNotLocked { .. }
                | StorageError::LockExpired { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_errors_are_retryable() {
        let locked = StorageError::ItemIsLocked {
            partition_key: "p".into(),
            sort_key: "state".into(),
            locked_by: "a".into(),
            locked_until: 1,
        };
        assert!(locked.is_retryable());
        assert!(!StorageError::Backend("down".into()).is_retryable());
        let exhausted = StorageError::RetriesExhausted {
            partition_key: "p".into(),
            attempts: 3,
            last_error: "locked".into(),
        };
        assert!(!exhausted.is_retryable());
        assert_eq!(
            exhausted.to_string(),
            "gave up on p after 3 attempts: locked"
        );
    }
}
