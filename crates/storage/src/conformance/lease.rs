use std::future::Future;

use serde_json::json;

use super::{locking_map, CaseResult, SHORT_LEASE};
use crate::{LockingMap, SortedPartitionsStore, StorageError};

const PK: &str = "session#lease";

pub(super) async fn run_lease_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseResult::from_result(
        "lease",
        "expired_lease_lets_another_caller_load",
        expired_lease_lets_another_caller_load(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lease",
        "stale_save_fails_with_lock_expired",
        stale_save_fails_with_lock_expired(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lease",
        "unlock_after_expiry_is_noop",
        unlock_after_expiry_is_noop(factory).await,
    ));

    results
}

async fn wait_for_expiry() {
    tokio::time::sleep(SHORT_LEASE * 2).await;
}

// ── 1. Lease expiry needs no explicit unlock ─────────────────────────────────

async fn expired_lease_lets_another_caller_load<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, SHORT_LEASE).await;
    let (_, first) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    map.save(&first, PK, json!("before"))
        .await
        .map_err(|e| format!("save: {e}"))?;
    let (_, _abandoned) = map.load(PK).await.map_err(|e| format!("load 2: {e}"))?;
    wait_for_expiry().await;
    let (value, _) = map
        .load(PK)
        .await
        .map_err(|e| format!("load after expiry: {e}"))?;
    if value != Some(json!("before")) {
        return Err(format!("expected last saved value, got {value:?}"));
    }
    Ok(())
}

// ── 2. The original holder cannot save once its lease lapsed ─────────────────

async fn stale_save_fails_with_lock_expired<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, SHORT_LEASE).await;
    let (_, stale) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    wait_for_expiry().await;
    let (_, _fresh) = map
        .load(PK)
        .await
        .map_err(|e| format!("load after expiry: {e}"))?;
    match map.save(&stale, PK, json!("stale")).await {
        Err(StorageError::LockExpired { .. }) => Ok(()),
        other => Err(format!("expected LockExpired, got {other:?}")),
    }
}

// ── 3. Unlocking a lapsed lease does nothing ─────────────────────────────────

async fn unlock_after_expiry_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, SHORT_LEASE).await;
    let (_, stale) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    wait_for_expiry().await;
    // The second caller gets a long lease so it cannot lapse mid-test.
    let map = LockingMap::new(
        map.store().clone(),
        map.config().clone().with_lease_duration(SHORT_LEASE * 50),
    );
    let (_, fresh) = map
        .load(PK)
        .await
        .map_err(|e| format!("load after expiry: {e}"))?;
    map.unlock(&stale, PK)
        .await
        .map_err(|e| format!("stale unlock should be a no-op: {e}"))?;
    match map.load(PK).await {
        Err(StorageError::ItemIsLocked { locked_by, .. }) if locked_by == fresh.holder() => Ok(()),
        other => Err(format!("stale unlock released the fresh lease: {other:?}")),
    }
}
