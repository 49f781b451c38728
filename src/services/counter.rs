use crate::{
    error::{AppError, AppResult},
    models::CounterColumn,
    store::{ReactionStore, StoreError},
};
use tracing::warn;
use uuid::Uuid;

/// How cached counters are adjusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterMode {
    /// Single store-side `GREATEST(col + delta, 0)`; falls back to
    /// read-modify-write only if the store reports it unsupported.
    #[default]
    Atomic,
    /// Always read, compute, write. Loses updates under concurrent callers.
    ReadModifyWrite,
}

impl CounterMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "atomic" => Some(Self::Atomic),
            "read_modify_write" | "read-modify-write" | "fallback" => Some(Self::ReadModifyWrite),
            _ => None,
        }
    }
}

/// Adjust a cached counter by `delta`, never going below zero. Returns the new value.
pub async fn adjust_counter<S>(
    store: &S,
    counter: &CounterColumn,
    target_id: Uuid,
    delta: i64,
    mode: CounterMode,
) -> AppResult<i64>
where
    S: ReactionStore + ?Sized,
{
    if mode == CounterMode::Atomic {
        match store.increment_counter(counter, target_id, delta).await {
            Ok(value) => return Ok(value),
            Err(StoreError::Unsupported(what)) => {
                warn!(
                    table = counter.table,
                    column = counter.column,
                    "{} unavailable, falling back to read-modify-write",
                    what
                );
            }
            Err(e) => return Err(AppError::from_store(e)),
        }
    }

    read_modify_write(store, counter, target_id, delta).await
}

async fn read_modify_write<S>(
    store: &S,
    counter: &CounterColumn,
    target_id: Uuid,
    delta: i64,
) -> AppResult<i64>
where
    S: ReactionStore + ?Sized,
{
    let current = store
        .read_counter(counter, target_id)
        .await
        .map_err(AppError::from_store)?;
    let next = current.saturating_add(delta).max(0);
    store
        .write_counter(counter, target_id, next)
        .await
        .map_err(AppError::from_store)?;
    Ok(next)
}
