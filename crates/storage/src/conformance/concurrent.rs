use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::{stateful_executor, CaseResult};
use crate::{LockConfig, LockingMap, SortedPartitionsStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseResult::from_result(
        "concurrent",
        "concurrent_loads_exactly_one_wins",
        concurrent_loads_exactly_one_wins(factory).await,
    ));
    results.push(CaseResult::from_result(
        "concurrent",
        "concurrent_executions_all_apply",
        concurrent_executions_all_apply(factory).await,
    ));
    results.push(CaseResult::from_result(
        "concurrent",
        "concurrent_sessions_do_not_contend",
        concurrent_sessions_do_not_contend(factory).await,
    ));

    results
}

// ── Concurrent load: exactly one lease granted ───────────────────────────────

/// N tasks race to load the same partition. Exactly one gets the lease; the
/// rest must get ItemIsLocked.
async fn concurrent_loads_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = Arc::new(LockingMap::new(
        Arc::new(factory().await),
        LockConfig::default().with_lease_duration(Duration::from_secs(5)),
    ));

    let mut handles = Vec::new();
    for _ in 0..N {
        let m = map.clone();
        handles.push(tokio::spawn(async move {
            match m.load("session#race").await {
                Ok(_) => Ok(true),
                Err(StorageError::ItemIsLocked { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent executor increments: no lost updates ──────────────────────────

async fn concurrent_executions_all_apply<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let exec = stateful_executor(factory).await;

    let mut handles = Vec::new();
    for _ in 0..N {
        let e = exec.clone();
        handles.push(tokio::spawn(async move {
            e.execute("session#counter", |v: Option<Value>| {
                let n = v.and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                Ok::<_, StorageError>((json!(n), n))
            })
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("execute: {e}"))?;
    }

    let total = exec
        .locks()
        .read("session#counter")
        .await
        .map_err(|e| format!("read: {e}"))?;
    if total != Some(json!(N)) {
        return Err(format!("expected counter {N}, got {total:?}"));
    }
    Ok(())
}

// ── Different sessions never block each other ────────────────────────────────

async fn concurrent_sessions_do_not_contend<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = Arc::new(LockingMap::new(
        Arc::new(factory().await),
        LockConfig::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..N {
        let m = map.clone();
        handles.push(tokio::spawn(async move {
            m.load(&format!("session#{i}")).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("independent session blocked: {e}"))?;
    }
    Ok(())
}
