//! Store traits (ports) for the hosted backend.
//!
//! All durable state lives behind these traits. Services never hold a lock
//! or a transaction across calls: every method is one independent request
//! against the store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CommentModel, CounterColumn, EventModel, NewReaction, ReactionRecord, ReactionTable};

pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
            _ => match err {
                sea_orm::DbErr::RecordNotFound(_) | sea_orm::DbErr::RecordNotUpdated => {
                    StoreError::NotFound
                }
                other => StoreError::Backend(other.to_string()),
            },
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Reaction Store
// ============================================================================

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Check that the row a reaction points at exists
    async fn target_exists(&self, table: &ReactionTable, target_id: Uuid) -> StoreResult<bool>;

    /// Find the voter's reaction record on a target, if any
    async fn find_reaction(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
        voter_id: Uuid,
    ) -> StoreResult<Option<ReactionRecord>>;

    /// Insert a record. Fails with `Conflict` if the voter already has one.
    async fn insert_reaction(
        &self,
        table: &ReactionTable,
        reaction: &NewReaction,
    ) -> StoreResult<ReactionRecord>;

    /// Change the kind of an existing record in place
    async fn update_reaction_kind(
        &self,
        table: &ReactionTable,
        record_id: Uuid,
        kind: &str,
    ) -> StoreResult<ReactionRecord>;

    async fn delete_reaction(&self, table: &ReactionTable, record_id: Uuid) -> StoreResult<()>;

    /// Delete every record pointing at a target, returning how many went
    async fn delete_reactions_for_target(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<u64>;

    /// Set `counter` to the number of live `kind` records on the target in one
    /// atomic step, returning `(cached, actual)`: the value it held and the value written.
    async fn recount_counter(
        &self,
        table: &ReactionTable,
        counter: &CounterColumn,
        target_id: Uuid,
        kind: &str,
    ) -> StoreResult<(i64, i64)>;

    /// Records on one target, oldest first
    async fn list_reactions(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>>;

    /// Records one voter holds across every target of a table, newest first
    async fn list_reactions_by_voter(
        &self,
        table: &ReactionTable,
        voter_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>>;

    /// All target ids a descriptor's target table holds
    async fn target_ids(&self, table: &ReactionTable) -> StoreResult<Vec<Uuid>>;

    /// Store-side `col = GREATEST(col + delta, 0)`, returning the new value.
    /// Returns `Unsupported` when the store cannot evaluate the expression.
    async fn increment_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        delta: i64,
    ) -> StoreResult<i64>;

    async fn read_counter(&self, counter: &CounterColumn, target_id: Uuid) -> StoreResult<i64>;

    async fn write_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        value: i64,
    ) -> StoreResult<()>;
}

// ============================================================================
// Event Store
// ============================================================================

/// Narrows the event feed. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Exact category match
    pub category: Option<String>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    pub host_id: Option<Uuid>,
    /// Only events starting at or after this instant, soonest first
    pub starts_after: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &EventModel) -> bool {
        if let Some(category) = &self.category {
            if event.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(host_id) = self.host_id {
            if event.host_id != host_id {
                return false;
            }
        }
        if let Some(after) = self.starts_after {
            if !event.start_time.is_some_and(|start| start >= after) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !event.title.to_lowercase().contains(&term)
                && !event.description.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Filtered feed. Newest first, or soonest first when `starts_after` is set.
    /// Pages are 1-based. Returns the page and the total count.
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: u64,
        per_page: u64,
    ) -> StoreResult<(Vec<EventModel>, u64)>;

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<EventModel>>;

    async fn insert_event(&self, event: EventModel) -> StoreResult<EventModel>;

    /// Write the host-editable fields and `updated_at`. Counters are left as stored.
    async fn update_event(&self, event: &EventModel) -> StoreResult<EventModel>;

    /// Delete an event with its comments, votes and RSVPs.
    async fn delete_event(&self, id: Uuid) -> StoreResult<()>;
}

// ============================================================================
// Comment Store
// ============================================================================

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments of one event, oldest first
    async fn list_comments(&self, event_id: Uuid) -> StoreResult<Vec<CommentModel>>;

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<CommentModel>>;

    async fn insert_comment(&self, comment: CommentModel) -> StoreResult<CommentModel>;

    /// Delete one comment. Direct replies keep existing with their parent cleared.
    async fn delete_comment(&self, id: Uuid) -> StoreResult<()>;
}

/// Everything the board needs from its backend.
pub trait BoardStore: ReactionStore + EventStore + CommentStore {}

impl<T> BoardStore for T where T: ReactionStore + EventStore + CommentStore {}

pub type SharedStore = Arc<dyn BoardStore>;
