//! In-process store used for offline/demo mode and tests.
//!
//! Mirrors the Postgres schema closely enough for the services: a unique
//! (target, voter) index on reaction records, counters floored at zero, and
//! replies detached when their parent comment is deleted. It also carries a
//! few knobs for exercising failure paths.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::instrument;
use uuid::Uuid;

use super::{CommentStore, EventFilter, EventStore, ReactionStore, StoreError, StoreResult};
use crate::models::{
    CommentModel, CounterColumn, EventModel, NewReaction, ReactionRecord, ReactionTable,
    COMMENT_VOTES, EVENT_RSVPS, EVENT_VOTES,
};

/// Store operations that can be made to fail once via [`MemoryStore::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindReaction,
    InsertReaction,
    UpdateReaction,
    DeleteReaction,
    IncrementCounter,
    ReadCounter,
    WriteCounter,
    RecountCounter,
    InsertComment,
    DeleteComment,
    UpdateEvent,
    DeleteEvent,
}

type ReactionKey = (&'static str, Uuid, Uuid);

pub struct MemoryStore {
    events: DashMap<Uuid, EventModel>,
    comments: DashMap<Uuid, (u64, CommentModel)>,
    reactions: DashMap<Uuid, (&'static str, ReactionRecord)>,
    reaction_index: DashMap<ReactionKey, Uuid>,
    comment_seq: AtomicU64,
    atomic_counters: AtomicBool,
    stale_lookups: AtomicUsize,
    faults: DashSet<StoreOp>,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            comments: DashMap::new(),
            reactions: DashMap::new(),
            reaction_index: DashMap::new(),
            comment_seq: AtomicU64::new(0),
            atomic_counters: AtomicBool::new(true),
            stale_lookups: AtomicUsize::new(0),
            faults: DashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed the two demo events shown when the board runs offline.
    pub fn seed_demo_events(&self) {
        let host_id = Uuid::new_v4();
        let now = Utc::now();
        let demos = [
            (
                "Welcome to SlugBoard!",
                "This is a demo event showing how SlugBoard works.",
                "UCSC Campus",
                Duration::days(1),
            ),
            (
                "Demo Event - Tech Meetup",
                "A sample tech meetup event for demonstration purposes.",
                "Engineering Building",
                Duration::days(2),
            ),
        ];

        for (title, description, location, starts_in) in demos {
            let id = Uuid::new_v4();
            self.events.insert(
                id,
                EventModel {
                    id,
                    host_id,
                    title: title.to_string(),
                    description: description.to_string(),
                    location: Some(location.to_string()),
                    category: Some("General".to_string()),
                    start_time: Some(now + starts_in),
                    upvotes_count: 0,
                    downvotes_count: 0,
                    rsvp_count: 0,
                    comments_count: 0,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
    }

    /// When disabled, `increment_counter` reports `Unsupported`.
    pub fn set_atomic_counters(&self, enabled: bool) {
        self.atomic_counters.store(enabled, Ordering::SeqCst);
    }

    /// The next `n` reaction lookups report no record even if one exists.
    pub fn hide_next_lookups(&self, n: usize) {
        self.stale_lookups.store(n, Ordering::SeqCst);
    }

    /// Make the next call of `op` fail with a backend error.
    pub fn fail_on(&self, op: StoreOp) {
        self.faults.insert(op);
    }

    /// Number of store calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records currently held in a reaction table.
    pub fn reactions_in(&self, table: &ReactionTable) -> Vec<ReactionRecord> {
        self.records_where(table, |_| true)
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.remove(&op).is_some() {
            return Err(StoreError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn with_counter<R>(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        f: impl FnOnce(&mut i32) -> R,
    ) -> StoreResult<R> {
        match counter.table {
            "events" => {
                let mut event = self.events.get_mut(&target_id).ok_or(StoreError::NotFound)?;
                let slot = match counter.column {
                    "upvotes_count" => &mut event.upvotes_count,
                    "downvotes_count" => &mut event.downvotes_count,
                    "rsvp_count" => &mut event.rsvp_count,
                    "comments_count" => &mut event.comments_count,
                    other => return Err(unknown_column(counter.table, other)),
                };
                Ok(f(slot))
            }
            "comments" => {
                let mut entry = self.comments.get_mut(&target_id).ok_or(StoreError::NotFound)?;
                let comment = &mut entry.value_mut().1;
                let slot = match counter.column {
                    "upvotes_count" => &mut comment.upvotes_count,
                    "downvotes_count" => &mut comment.downvotes_count,
                    other => return Err(unknown_column(counter.table, other)),
                };
                Ok(f(slot))
            }
            other => Err(StoreError::Backend(format!("unknown table {other}"))),
        }
    }

    fn index_key(table: &ReactionTable, target_id: Uuid, voter_id: Uuid) -> ReactionKey {
        (table.record_table, target_id, voter_id)
    }

    fn records_where(
        &self,
        table: &ReactionTable,
        keep: impl Fn(&ReactionRecord) -> bool,
    ) -> Vec<ReactionRecord> {
        self.reactions
            .iter()
            .filter(|entry| entry.value().0 == table.record_table && keep(&entry.value().1))
            .map(|entry| entry.value().1.clone())
            .collect()
    }

    fn remove_records_for(&self, table: &ReactionTable, target_id: Uuid) -> u64 {
        let ids: Vec<Uuid> = self
            .records_where(table, |record| record.target_id == target_id)
            .into_iter()
            .map(|record| record.id)
            .collect();
        ids.into_iter()
            .filter(|id| self.remove_record(*id).is_some())
            .count() as u64
    }

    fn remove_record(&self, record_id: Uuid) -> Option<ReactionRecord> {
        let (_, (record_table, record)) = self.reactions.remove(&record_id)?;
        self.reaction_index
            .remove(&(record_table, record.target_id, record.voter_id));
        Some(record)
    }
}

fn unknown_column(table: &str, column: &str) -> StoreError {
    StoreError::Backend(format!("unknown counter column {table}.{column}"))
}

fn clamp_counter(value: i64) -> i32 {
    value.clamp(0, i64::from(i32::MAX)) as i32
}

#[async_trait]
impl ReactionStore for MemoryStore {
    async fn target_exists(&self, table: &ReactionTable, target_id: Uuid) -> StoreResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match table.target_table {
            "events" => self.events.contains_key(&target_id),
            "comments" => self.comments.contains_key(&target_id),
            _ => false,
        })
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn find_reaction(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
        voter_id: Uuid,
    ) -> StoreResult<Option<ReactionRecord>> {
        self.check(StoreOp::FindReaction)?;
        let hidden = self
            .stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }

        let key = Self::index_key(table, target_id, voter_id);
        let Some(record_id) = self.reaction_index.get(&key).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .reactions
            .get(&record_id)
            .map(|entry| entry.value().1.clone()))
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn insert_reaction(
        &self,
        table: &ReactionTable,
        reaction: &NewReaction,
    ) -> StoreResult<ReactionRecord> {
        self.check(StoreOp::InsertReaction)?;
        let key = Self::index_key(table, reaction.target_id, reaction.voter_id);
        match self.reaction_index.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "{} ({}, user_id)",
                table.record_table, table.record_target_column
            ))),
            Entry::Vacant(slot) => {
                let record = ReactionRecord {
                    id: Uuid::new_v4(),
                    target_id: reaction.target_id,
                    voter_id: reaction.voter_id,
                    kind: reaction.kind.clone(),
                    created_at: Utc::now(),
                    updated_at: None,
                };
                slot.insert(record.id);
                self.reactions
                    .insert(record.id, (table.record_table, record.clone()));
                Ok(record)
            }
        }
    }

    async fn update_reaction_kind(
        &self,
        _table: &ReactionTable,
        record_id: Uuid,
        kind: &str,
    ) -> StoreResult<ReactionRecord> {
        self.check(StoreOp::UpdateReaction)?;
        let mut entry = self
            .reactions
            .get_mut(&record_id)
            .ok_or(StoreError::NotFound)?;
        let record = &mut entry.value_mut().1;
        record.kind = kind.to_string();
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn delete_reaction(&self, _table: &ReactionTable, record_id: Uuid) -> StoreResult<()> {
        self.check(StoreOp::DeleteReaction)?;
        self.remove_record(record_id);
        Ok(())
    }

    async fn delete_reactions_for_target(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<u64> {
        self.check(StoreOp::DeleteReaction)?;
        Ok(self.remove_records_for(table, target_id))
    }

    async fn list_reactions(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records_where(table, |record| record.target_id == target_id);
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn list_reactions_by_voter(
        &self,
        table: &ReactionTable,
        voter_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records_where(table, |record| record.voter_id == voter_id);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn recount_counter(
        &self,
        table: &ReactionTable,
        counter: &CounterColumn,
        target_id: Uuid,
        kind: &str,
    ) -> StoreResult<(i64, i64)> {
        self.check(StoreOp::RecountCounter)?;
        // Counted while the target row's guard is held, so increments wait for the write.
        self.with_counter(counter, target_id, |slot| {
            let actual = self
                .reactions
                .iter()
                .filter(|entry| {
                    let (record_table, record) = entry.value();
                    *record_table == table.record_table
                        && record.target_id == target_id
                        && record.kind == kind
                })
                .count() as i64;
            let cached = i64::from(*slot);
            *slot = clamp_counter(actual);
            (cached, actual)
        })
    }

    async fn target_ids(&self, table: &ReactionTable) -> StoreResult<Vec<Uuid>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match table.target_table {
            "events" => self.events.iter().map(|e| *e.key()).collect(),
            "comments" => self.comments.iter().map(|c| *c.key()).collect(),
            _ => Vec::new(),
        })
    }

    #[instrument(skip(self))]
    async fn increment_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        delta: i64,
    ) -> StoreResult<i64> {
        self.check(StoreOp::IncrementCounter)?;
        if !self.atomic_counters.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported("atomic counter increment"));
        }
        self.with_counter(counter, target_id, |slot| {
            *slot = clamp_counter(i64::from(*slot) + delta);
            i64::from(*slot)
        })
    }

    async fn read_counter(&self, counter: &CounterColumn, target_id: Uuid) -> StoreResult<i64> {
        self.check(StoreOp::ReadCounter)?;
        self.with_counter(counter, target_id, |slot| i64::from(*slot))
    }

    async fn write_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        value: i64,
    ) -> StoreResult<()> {
        self.check(StoreOp::WriteCounter)?;
        self.with_counter(counter, target_id, |slot| *slot = clamp_counter(value))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: u64,
        per_page: u64,
    ) -> StoreResult<(Vec<EventModel>, u64)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut events: Vec<EventModel> = self
            .events
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        if filter.starts_after.is_some() {
            events.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        } else {
            events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        let total = events.len() as u64;
        let skip = page.saturating_sub(1).saturating_mul(per_page) as usize;
        let items = events
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();
        Ok((items, total))
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<EventModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.events.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_event(&self, event: EventModel) -> StoreResult<EventModel> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.events.entry(event.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("events.id {}", event.id))),
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(event)
            }
        }
    }

    async fn update_event(&self, event: &EventModel) -> StoreResult<EventModel> {
        self.check(StoreOp::UpdateEvent)?;
        let mut stored = self.events.get_mut(&event.id).ok_or(StoreError::NotFound)?;
        stored.title = event.title.clone();
        stored.description = event.description.clone();
        stored.location = event.location.clone();
        stored.category = event.category.clone();
        stored.start_time = event.start_time;
        stored.updated_at = event.updated_at;
        Ok(stored.clone())
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<()> {
        self.check(StoreOp::DeleteEvent)?;
        if self.events.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }

        let comment_ids: Vec<Uuid> = self
            .comments
            .iter()
            .filter(|entry| entry.value().1.event_id == id)
            .map(|entry| *entry.key())
            .collect();
        for comment_id in comment_ids {
            self.comments.remove(&comment_id);
            self.remove_records_for(&COMMENT_VOTES, comment_id);
        }
        self.remove_records_for(&EVENT_VOTES, id);
        self.remove_records_for(&EVENT_RSVPS, id);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn list_comments(&self, event_id: Uuid) -> StoreResult<Vec<CommentModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<(u64, CommentModel)> = self
            .comments
            .iter()
            .filter(|entry| entry.value().1.event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            a.created_at.cmp(&b.created_at).then(seq_a.cmp(seq_b))
        });
        Ok(rows.into_iter().map(|(_, comment)| comment).collect())
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<CommentModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.comments.get(&id).map(|entry| entry.value().1.clone()))
    }

    async fn insert_comment(&self, comment: CommentModel) -> StoreResult<CommentModel> {
        self.check(StoreOp::InsertComment)?;
        let seq = self.comment_seq.fetch_add(1, Ordering::SeqCst);
        match self.comments.entry(comment.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("comments.id {}", comment.id))),
            Entry::Vacant(slot) => {
                slot.insert((seq, comment.clone()));
                Ok(comment)
            }
        }
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        self.check(StoreOp::DeleteComment)?;
        if self.comments.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        for mut entry in self.comments.iter_mut() {
            let comment = &mut entry.value_mut().1;
            if comment.parent_id == Some(id) {
                comment.parent_id = None;
            }
        }
        Ok(())
    }
}
