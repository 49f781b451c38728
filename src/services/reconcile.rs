//! Counter reconciliation
//!
//! Cached counters on events and comments can drift from the reaction records
//! when a toggle fails halfway. This job recounts live records and writes the
//! true values back.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{ReactionTable, COMMENT_VOTES, EVENT_RSVPS, EVENT_VOTES},
    store::{ReactionStore, SharedStore},
};

pub static ALL_TABLES: [&ReactionTable; 3] = [&EVENT_VOTES, &COMMENT_VOTES, &EVENT_RSVPS];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub column: &'static str,
    pub cached: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub target_id: Uuid,
    pub corrected: Vec<Correction>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty()
    }
}

/// Recount every counter `table` maintains on one target and repair drifted ones.
///
/// Each counter is recounted and written in a single store call, so a toggle
/// can't bump it between the count and the write.
pub async fn reconcile_target<S>(
    store: &S,
    table: &ReactionTable,
    target_id: Uuid,
) -> AppResult<ReconcileReport>
where
    S: ReactionStore + ?Sized,
{
    let mut corrected = Vec::new();

    for (kind, counter) in table.counter_columns() {
        let (cached, actual) = store
            .recount_counter(table, &counter, target_id, kind)
            .await
            .map_err(AppError::from_store)?;

        if cached != actual {
            warn!(
                target_id = %target_id,
                table = counter.table,
                column = counter.column,
                cached,
                actual,
                "Counter drift repaired"
            );
            corrected.push(Correction {
                column: counter.column,
                cached,
                actual,
            });
        }
    }

    Ok(ReconcileReport {
        target_id,
        corrected,
    })
}

/// Run [`reconcile_target`] over every target of every reaction table.
/// Returns only the reports that repaired something.
pub async fn reconcile_all<S>(store: &S) -> AppResult<Vec<ReconcileReport>>
where
    S: ReactionStore + ?Sized,
{
    let mut reports = Vec::new();
    for table in ALL_TABLES {
        let targets = store
            .target_ids(table)
            .await
            .map_err(AppError::from_store)?;
        debug!(table = table.label, targets = targets.len(), "Reconciling counters");

        for target_id in targets {
            let report = reconcile_target(store, table, target_id).await?;
            if !report.is_clean() {
                reports.push(report);
            }
        }
    }
    Ok(reports)
}

/// Spawn a background task running [`reconcile_all`] every `every`.
pub fn spawn_reconciler(store: SharedStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; skip it so startup is not delayed.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match reconcile_all(&*store).await {
                Ok(reports) if reports.is_empty() => debug!("Counters consistent"),
                Ok(reports) => info!(repaired = reports.len(), "Counter reconciliation done"),
                Err(e) => warn!("Counter reconciliation failed: {}", e),
            }
        }
    })
}
