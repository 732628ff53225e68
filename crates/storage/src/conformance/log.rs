use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use super::CaseResult;
use crate::{ExchangeLog, SortedPartitionsStore, StorageError};

pub(super) async fn run_log_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseResult::from_result(
        "log",
        "list_returns_sort_key_order",
        list_returns_sort_key_order(factory).await,
    ));
    results.push(CaseResult::from_result(
        "log",
        "get_reads_single_entry",
        get_reads_single_entry(factory).await,
    ));
    results.push(CaseResult::from_result(
        "log",
        "prefix_query_filters_sort_keys",
        prefix_query_filters_sort_keys(factory).await,
    ));
    results.push(CaseResult::from_result(
        "log",
        "duplicate_append_is_rejected",
        duplicate_append_is_rejected(factory).await,
    ));
    results.push(CaseResult::from_result(
        "log",
        "log_and_state_rows_share_partition_space",
        log_and_state_rows_share_partition_space(factory).await,
    ));

    results
}

// ── 1. Reads come back ordered by sort key, not by write order ───────────────

async fn list_returns_sort_key_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let log = ExchangeLog::new(Arc::new(factory().await));
    for sk in ["t3", "t1", "t2"] {
        log.append("P", sk, json!(sk))
            .await
            .map_err(|e| format!("append {sk}: {e}"))?;
    }
    let values = log
        .list_by_partition("P")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if values != vec![json!("t1"), json!("t2"), json!("t3")] {
        return Err(format!("unexpected order: {values:?}"));
    }
    Ok(())
}

// ── 2. Point read ────────────────────────────────────────────────────────────

async fn get_reads_single_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let log = ExchangeLog::new(Arc::new(factory().await));
    log.append("P", "t1", json!({"id": 1}))
        .await
        .map_err(|e| format!("append: {e}"))?;
    let hit = log.get("P", "t1").await.map_err(|e| format!("get: {e}"))?;
    if hit != Some(json!({"id": 1})) {
        return Err(format!("expected stored entry, got {hit:?}"));
    }
    let miss = log.get("P", "t9").await.map_err(|e| format!("get: {e}"))?;
    if miss.is_some() {
        return Err(format!("expected no entry, got {miss:?}"));
    }
    Ok(())
}

// ── 3. Prefix queries ────────────────────────────────────────────────────────

async fn prefix_query_filters_sort_keys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let log = ExchangeLog::new(Arc::new(factory().await));
    for sk in ["2024-01-01#a", "2024-01-02#b", "2025-01-01#c"] {
        log.append("P", sk, json!(sk))
            .await
            .map_err(|e| format!("append {sk}: {e}"))?;
    }
    let values = log
        .list_by_prefix("P", "2024-")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if values.len() != 2 {
        return Err(format!("expected 2 entries for 2024, got {values:?}"));
    }
    Ok(())
}

// ── 4. The log never overwrites ──────────────────────────────────────────────

async fn duplicate_append_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let log = ExchangeLog::new(Arc::new(factory().await));
    log.append("P", "t1", json!("first"))
        .await
        .map_err(|e| format!("append: {e}"))?;
    match log.append("P", "t1", json!("second")).await {
        Err(StorageError::AlreadyExists { .. }) => {}
        other => return Err(format!("expected AlreadyExists, got {other:?}")),
    }
    let kept = log.get("P", "t1").await.map_err(|e| format!("get: {e}"))?;
    if kept != Some(json!("first")) {
        return Err(format!("original entry changed: {kept:?}"));
    }
    Ok(())
}

// ── 5. Lockable rows and log rows coexist in one store ───────────────────────

async fn log_and_state_rows_share_partition_space<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let map = crate::LockingMap::new(store.clone(), crate::LockConfig::default());
    let log = ExchangeLog::new(store);

    let (_, token) = map
        .load("session#1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    log.append("session#1#traffic", "t1", json!("exchange"))
        .await
        .map_err(|e| format!("append: {e}"))?;
    map.save(&token, "session#1", json!("state"))
        .await
        .map_err(|e| format!("save: {e}"))?;

    let traffic = log
        .list_by_partition("session#1#traffic")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if traffic != vec![json!("exchange")] {
        return Err(format!("traffic partition polluted: {traffic:?}"));
    }
    let state = map
        .read("session#1")
        .await
        .map_err(|e| format!("read: {e}"))?;
    if state != Some(json!("state")) {
        return Err(format!("state row lost: {state:?}"));
    }
    Ok(())
}
