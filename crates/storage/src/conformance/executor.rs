use std::future::Future;

use serde_json::{json, Value};

use super::{stateful_executor, CaseResult};
use crate::{SortedPartitionsStore, StorageError};

const PK: &str = "session#executor";

pub(super) async fn run_executor_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseResult::from_result(
        "executor",
        "execute_sees_previous_value",
        execute_sees_previous_value(factory).await,
    ));
    results.push(CaseResult::from_result(
        "executor",
        "execute_waits_out_contention",
        execute_waits_out_contention(factory).await,
    ));
    results.push(CaseResult::from_result(
        "executor",
        "mutation_error_releases_lease",
        mutation_error_releases_lease(factory).await,
    ));

    results
}

fn push(value: Option<Value>, item: &str) -> Result<(Value, usize), StorageError> {
    let mut items = match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    items.push(json!(item));
    let len = items.len();
    Ok((Value::Array(items), len))
}

// ── 1. Sequential executions build on each other ─────────────────────────────

async fn execute_sees_previous_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let exec = stateful_executor(factory).await;
    exec.execute(PK, |v| push(v, "a"))
        .await
        .map_err(|e| format!("first: {e}"))?;
    let len = exec
        .execute(PK, |v| push(v, "b"))
        .await
        .map_err(|e| format!("second: {e}"))?;
    if len != 2 {
        return Err(format!("expected 2 items, got {len}"));
    }
    Ok(())
}

// ── 2. A lease held briefly elsewhere only delays the executor ───────────────

async fn execute_waits_out_contention<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let exec = stateful_executor(factory).await;
    let (_, token) = exec
        .locks()
        .load(PK)
        .await
        .map_err(|e| format!("load: {e}"))?;

    let holder = exec.clone();
    let release = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        holder.locks().save(&token, PK, json!(["held"])).await
    });

    let len = exec
        .execute(PK, |v| push(v, "after"))
        .await
        .map_err(|e| format!("execute: {e}"))?;
    release
        .await
        .map_err(|e| format!("task panic: {e}"))?
        .map_err(|e| format!("holder save: {e}"))?;
    if len != 2 {
        return Err(format!("expected executor to see the holder's write, got {len} items"));
    }
    Ok(())
}

// ── 3. A rejected mutation is not retried and frees the lease ────────────────

async fn mutation_error_releases_lease<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SortedPartitionsStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let exec = stateful_executor(factory).await;
    let mut calls = 0u32;
    let result = exec
        .execute(PK, |_| -> Result<(Value, ()), StorageError> {
            calls += 1;
            Err(StorageError::Backend("rejected".into()))
        })
        .await;
    if !matches!(result, Err(StorageError::Backend(_))) {
        return Err(format!("expected the mutation error back, got {result:?}"));
    }
    if calls != 1 {
        return Err(format!("mutation retried {calls} times"));
    }
    exec.locks()
        .load(PK)
        .await
        .map_err(|e| format!("lease not released: {e}"))?;
    Ok(())
}
