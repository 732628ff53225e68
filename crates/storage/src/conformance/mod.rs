//! Behavioural checks every `SortedPartitionsStore` backend must pass.
//!
//! The checks drive a backend through the layers built on top of it, so a
//! new backend proves the whole locking and logging stack works, not just
//! the raw partition operations. Each case gets a store of its own:
//!
//! - `lock`: a held lease blocks other loads until save or unlock
//! - `lease`: an expired lease can be taken over and its holder goes stale
//! - `log`: entries come back in sort-key order, by key or by prefix
//! - `executor`: load, mutate and save is retried until it wins the lease
//! - `concurrent`: many tasks contending for one key
//!
//! A backend's own test calls [`run_conformance_suite`] with a store
//! factory and fails on any failed case:
//!
//! ```ignore
//! use parley_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn redis_backend_conforms() {
//!     let report = run_conformance_suite(|| async { connect_test_redis().await }).await;
//!     assert_eq!(report.failed, 0, "{report}");
//! }
//! ```

mod concurrent;
mod executor;
mod lease;
mod lock;
mod log;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{LockConfig, LockingMap, SortedPartitionsStore, StatefulExecutor};

/// Lease used by cases that wait for expiry.
const SHORT_LEASE: Duration = Duration::from_millis(40);

/// Outcome of one case, e.g. `lease/stale_save_fails_with_lock_expired`.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub category: String,
    pub name: String,
    /// `None` when the case passed.
    pub failure: Option<String>,
}

impl CaseResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub results: Vec<CaseResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl SuiteReport {
    fn new(results: Vec<CaseResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
            total: results.len(),
            results,
        }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "store suite: {} of {} cases passed", self.passed, self.total)?;
        for result in &self.results {
            if let Some(failure) = &result.failure {
                writeln!(f, "  {}/{} failed: {}", result.category, result.name, failure)?;
            }
        }
        Ok(())
    }
}

/// Run every case against stores made by `factory`, one fresh store per
/// case.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> SuiteReport
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = lock::run_lock_tests(&factory).await;
    results.extend(lease::run_lease_tests(&factory).await);
    results.extend(log::run_log_tests(&factory).await);
    results.extend(executor::run_executor_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    SuiteReport::new(results)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn locking_map<S, F, Fut>(factory: &F, lease: Duration) -> LockingMap<S>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    LockingMap::new(
        Arc::new(factory().await),
        LockConfig::default()
            .with_lease_duration(lease)
            .with_retries(200, Duration::from_millis(5)),
    )
}

async fn stateful_executor<S, F, Fut>(factory: &F) -> StatefulExecutor<S>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    StatefulExecutor::new(locking_map(factory, Duration::from_secs(5)).await)
}
