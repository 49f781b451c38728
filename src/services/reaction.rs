//! Reaction toggle engine
//!
//! Applies a voter's click on a reaction to a target. The same state machine
//! serves event votes, comment votes and RSVPs:
//!
//! - no record: insert it, increment the kind's counter (`added`)
//! - same kind: delete it, decrement the kind's counter (`removed`)
//! - other kind: update it in place, decrement old, increment new (`switched`)
//!
//! Steps run one after another against the store with no transaction. If a
//! later step fails the earlier ones stay applied and the error is returned
//! as is; counters are repaired by the reconciliation job, not here.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        NewReaction, ReactionKind, ReactionRecord, ReactionTable, RsvpStatus, ToggleOutcome,
        Transition, VoteKind, COMMENT_VOTES, EVENT_RSVPS, EVENT_VOTES,
    },
    services::counter::{adjust_counter, CounterMode},
    store::{ReactionStore, SharedStore, StoreError},
};

pub struct ReactionEngine {
    store: SharedStore,
    mode: CounterMode,
}

impl ReactionEngine {
    pub fn new(store: SharedStore, mode: CounterMode) -> Self {
        Self { store, mode }
    }

    pub async fn toggle_event_vote(
        &self,
        event_id: Uuid,
        voter_id: Option<Uuid>,
        kind: VoteKind,
    ) -> AppResult<ToggleOutcome<VoteKind>> {
        self.toggle(&EVENT_VOTES, event_id, voter_id, kind).await
    }

    pub async fn toggle_comment_vote(
        &self,
        comment_id: Uuid,
        voter_id: Option<Uuid>,
        kind: VoteKind,
    ) -> AppResult<ToggleOutcome<VoteKind>> {
        self.toggle(&COMMENT_VOTES, comment_id, voter_id, kind).await
    }

    pub async fn toggle_rsvp(
        &self,
        event_id: Uuid,
        voter_id: Option<Uuid>,
        status: RsvpStatus,
    ) -> AppResult<ToggleOutcome<RsvpStatus>> {
        self.toggle(&EVENT_RSVPS, event_id, voter_id, status).await
    }

    /// Toggle `kind` for `voter_id` on one target of `table`.
    ///
    /// A missing voter or nil target id is rejected before the store is contacted.
    #[instrument(skip(self, table), fields(table = table.label))]
    pub async fn toggle<K: ReactionKind>(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
        voter_id: Option<Uuid>,
        kind: K,
    ) -> AppResult<ToggleOutcome<K>> {
        let voter_id = match voter_id {
            Some(id) if !id.is_nil() => id,
            _ => return Err(AppError::Unauthorized),
        };
        if target_id.is_nil() {
            return Err(AppError::Precondition("target id is required".to_string()));
        }

        if !self
            .store
            .target_exists(table, target_id)
            .await
            .map_err(AppError::from_store)?
        {
            return Err(AppError::NotFound);
        }

        // Some stores report "no rows" as an error; either way there is no vote yet.
        let existing = match self.store.find_reaction(table, target_id, voter_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(AppError::from_store(e)),
        };

        let outcome = match existing {
            Some(record) => self.apply_existing(table, record, kind).await?,
            None => self.add(table, target_id, voter_id, kind).await?,
        };

        info!(
            target_id = %target_id,
            voter_id = %voter_id,
            kind = kind.as_str(),
            transition = %outcome.transition,
            "Reaction toggled"
        );

        Ok(outcome)
    }

    async fn add<K: ReactionKind>(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
        voter_id: Uuid,
        kind: K,
    ) -> AppResult<ToggleOutcome<K>> {
        let new = NewReaction {
            target_id,
            voter_id,
            kind: kind.as_str().to_string(),
        };

        match self.store.insert_reaction(table, &new).await {
            Ok(_) => {}
            Err(StoreError::Conflict(detail)) => {
                // Another request created the record between our read and insert.
                warn!(
                    target_id = %target_id,
                    voter_id = %voter_id,
                    "Reaction insert conflicted ({}), retrying as existing record",
                    detail
                );
                let record = self
                    .store
                    .find_reaction(table, target_id, voter_id)
                    .await
                    .map_err(AppError::from_store)?
                    .ok_or(AppError::NotFound)?;
                return self.apply_existing(table, record, kind).await;
            }
            Err(e) => return Err(AppError::from_store(e)),
        }

        self.bump(table, kind, target_id, 1).await?;

        Ok(ToggleOutcome {
            transition: Transition::Added,
            previous: None,
            current: Some(kind),
        })
    }

    async fn apply_existing<K: ReactionKind>(
        &self,
        table: &ReactionTable,
        record: ReactionRecord,
        kind: K,
    ) -> AppResult<ToggleOutcome<K>> {
        let previous = K::parse(&record.kind).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "unknown {} kind '{}' on record {}",
                table.label,
                record.kind,
                record.id
            ))
        })?;

        if previous == kind {
            self.store
                .delete_reaction(table, record.id)
                .await
                .map_err(AppError::from_store)?;
            self.bump(table, kind, record.target_id, -1).await?;

            return Ok(ToggleOutcome {
                transition: Transition::Removed,
                previous: Some(previous),
                current: None,
            });
        }

        self.store
            .update_reaction_kind(table, record.id, kind.as_str())
            .await
            .map_err(AppError::from_store)?;
        self.bump(table, previous, record.target_id, -1).await?;
        self.bump(table, kind, record.target_id, 1).await?;

        Ok(ToggleOutcome {
            transition: Transition::Switched,
            previous: Some(previous),
            current: Some(kind),
        })
    }

    async fn bump<K: ReactionKind>(
        &self,
        table: &ReactionTable,
        kind: K,
        target_id: Uuid,
        delta: i64,
    ) -> AppResult<()> {
        if let Some(counter) = table.counter_for(kind.as_str()) {
            adjust_counter(&*self.store, &counter, target_id, delta, self.mode).await?;
        }
        Ok(())
    }
}
