use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::LockRecord;

/// A partitioned key/value backend with rows sorted by sort key.
///
/// Both the [`LockingMap`](crate::LockingMap) and the
/// [`ExchangeLog`](crate::ExchangeLog) sit on top of this trait; they differ
/// only in the keys they use.
///
/// ## Conditional writes
///
/// `put_item_if` is the only write primitive. It succeeds only when the
/// stored row's revision equals `expected_revision` (`None` meaning the row
/// must not exist yet) and then stores the record with the revision bumped by
/// one. Lease acquisition and release are built entirely from this
/// compare-and-swap, so the backend's own state is the single source of truth
/// for who holds a lease. Backends must not keep a separate in-process lock
/// table.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared via
/// `Arc` between request handlers and spawned tasks.
#[async_trait]
pub trait SortedPartitionsStore: Send + Sync + 'static {
    /// Read one row.
    async fn get_item(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<LockRecord>, StorageError>;

    /// Compare-and-swap write.
    ///
    /// Returns `Ok(false)` when the condition did not hold; nothing is
    /// written in that case.
    async fn put_item_if(
        &self,
        record: LockRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool, StorageError>;

    /// All rows of a partition in ascending sort-key order, optionally
    /// restricted to sort keys starting with `sort_key_prefix`.
    async fn query_partition(
        &self,
        partition_key: &str,
        sort_key_prefix: Option<&str>,
    ) -> Result<Vec<LockRecord>, StorageError>;
}
