//! Durable session storage for the conformance harness.
//!
//! One sorted-partition backend ([`SortedPartitionsStore`]) serves two access
//! patterns distinguished only by key convention:
//!
//! - [`LockingMap`]: one row per session (sort key `"state"`) guarded by a
//!   time-bounded lease, wrapped by [`StatefulExecutor`] for retried
//!   load-mutate-save cycles.
//! - [`ExchangeLog`]: append-only rows ordered by a timestamp-prefixed sort key.

pub mod conformance;

mod config;
mod error;
mod executor;
mod locking;
mod log;
mod memory;
mod record;
mod traits;

pub use config::LockConfig;
pub use error::StorageError;
pub use executor::StatefulExecutor;
pub use locking::{LockingMap, STATE_SORT_KEY};
pub use log::ExchangeLog;
pub use memory::MemoryStore;
pub use record::{now_millis, LockRecord, LockToken};
pub use traits::SortedPartitionsStore;
