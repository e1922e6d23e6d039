//! The run ledger: one row per ingestion invocation.
//!
//! [`begin`] creates an `in_progress` row and returns its id; [`complete`]
//! transitions exactly that row to a terminal state. The id is threaded
//! explicitly from start to finish, so concurrent runs of the same kind
//! never complete each other's rows.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};

use crate::models::{RunKind, RunStatus};
use crate::store::Store;

/// Message written to runs reaped by [`fail_stale`].
pub const ABANDONED_MESSAGE: &str = "abandoned: no completion recorded";

pub async fn begin(store: &dyn Store, kind: RunKind, params: &str) -> Result<i64> {
    let run_id = store
        .begin_run(kind, params, Utc::now())
        .await
        .context("failed to record run start")?;
    tracing::info!(run_id, kind = %kind, params, "Ingestion run started");
    Ok(run_id)
}

/// Marks run `run_id` as succeeded or failed.
///
/// Returns `false` when the row was already terminal, for example because
/// [`fail_stale`] reaped it mid-run; the row is left unchanged.
pub async fn complete(store: &dyn Store, run_id: i64, success: bool, message: &str) -> Result<bool> {
    let status = if success {
        RunStatus::Success
    } else {
        RunStatus::Failed
    };
    let changed = store
        .complete_run(run_id, status, message, Utc::now())
        .await
        .context("failed to record run completion")?;
    if changed {
        tracing::info!(run_id, status = %status, message, "Ingestion run finished");
    } else {
        tracing::warn!(run_id, "Run was not in progress; completion ignored");
    }
    Ok(changed)
}

/// Fails `in_progress` runs started more than `max_age` ago.
pub async fn fail_stale(store: &dyn Store, max_age: Duration) -> Result<u64> {
    let now = Utc::now();
    let cutoff = now
        .checked_sub_signed(max_age)
        .ok_or_else(|| anyhow!("stale run age out of range: {}", max_age))?;
    let reaped = store
        .fail_stale_runs(cutoff, ABANDONED_MESSAGE, now)
        .await
        .context("failed to reap stale runs")?;
    if reaped > 0 {
        tracing::warn!(reaped, "Marked abandoned in-progress runs as failed");
    }
    Ok(reaped)
}
