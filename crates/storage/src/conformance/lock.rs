use std::future::Future;
use std::time::Duration;

use serde_json::json;

use super::{locking_map, CaseResult};
use crate::{SortedPartitionsStore, StorageError};

const PK: &str = "session#lock";

pub(super) async fn run_lock_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseResult::from_result(
        "lock",
        "first_load_returns_absent_value",
        first_load_returns_absent_value(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lock",
        "second_load_fails_while_locked",
        second_load_fails_while_locked(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lock",
        "save_releases_and_persists",
        save_releases_and_persists(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lock",
        "unlock_releases_without_writing",
        unlock_releases_without_writing(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lock",
        "save_with_foreign_token_is_rejected",
        save_with_foreign_token_is_rejected(factory).await,
    ));
    results.push(CaseResult::from_result(
        "lock",
        "save_without_lease_is_rejected",
        save_without_lease_is_rejected(factory).await,
    ));

    results
}

// ── 1. First load of a new partition sees no value ───────────────────────────

async fn first_load_returns_absent_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (value, _token) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    if value.is_some() {
        return Err(format!("expected absent value, got {value:?}"));
    }
    Ok(())
}

// ── 2. A live lease blocks other loaders ─────────────────────────────────────

async fn second_load_fails_while_locked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (_value, token) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    match map.load(PK).await {
        Err(StorageError::ItemIsLocked { locked_by, .. }) => {
            if locked_by != token.holder() {
                return Err(format!(
                    "ItemIsLocked names {locked_by}, expected {}",
                    token.holder()
                ));
            }
            Ok(())
        }
        other => Err(format!("expected ItemIsLocked, got {other:?}")),
    }
}

// ── 3. Save stores the value and frees the lease ─────────────────────────────

async fn save_releases_and_persists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (_, token) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    map.save(&token, PK, json!({"cursor": 3}))
        .await
        .map_err(|e| format!("save: {e}"))?;
    let (value, _) = map.load(PK).await.map_err(|e| format!("reload: {e}"))?;
    if value != Some(json!({"cursor": 3})) {
        return Err(format!("expected saved value, got {value:?}"));
    }
    Ok(())
}

// ── 4. Unlock frees the lease and keeps the previous value ───────────────────

async fn unlock_releases_without_writing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (_, token) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    map.save(&token, PK, json!("v1"))
        .await
        .map_err(|e| format!("save: {e}"))?;
    let (_, token) = map.load(PK).await.map_err(|e| format!("load 2: {e}"))?;
    map.unlock(&token, PK)
        .await
        .map_err(|e| format!("unlock: {e}"))?;
    let (value, _) = map.load(PK).await.map_err(|e| format!("load 3: {e}"))?;
    if value != Some(json!("v1")) {
        return Err(format!("unlock changed the value: {value:?}"));
    }
    Ok(())
}

// ── 5. A token from another partition does not unlock this one ───────────────

async fn save_with_foreign_token_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (_, _mine) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    let (_, foreign) = map
        .load("session#other")
        .await
        .map_err(|e| format!("load other: {e}"))?;
    match map.save(&foreign, PK, json!("hijack")).await {
        Err(StorageError::ItemNotLocked { .. }) => Ok(()),
        other => Err(format!("expected ItemNotLocked, got {other:?}")),
    }
}

// ── 6. Saving twice with the same token fails the second time ────────────────

async fn save_without_lease_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let map = locking_map(factory, Duration::from_secs(5)).await;
    let (_, token) = map.load(PK).await.map_err(|e| format!("load: {e}"))?;
    map.save(&token, PK, json!(1))
        .await
        .map_err(|e| format!("save: {e}"))?;
    match map.save(&token, PK, json!(2)).await {
        Err(StorageError::ItemNotLocked { .. }) => Ok(()),
        other => Err(format!("expected ItemNotLocked, got {other:?}")),
    }
}
