//! Reaction records and the descriptors that bind them to their target tables.
//!
//! Event votes, comment votes and RSVPs share one add/remove/switch state
//! machine. What differs between them is captured by a [`ReactionTable`]:
//! where records live, which row they point at, and which cached counter
//! (if any) each reaction kind feeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// A closed set of reactions a voter can hold on one target.
pub trait ReactionKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Upvote,
    Downvote,
}

impl ReactionKind for VoteKind {
    const ALL: &'static [Self] = &[Self::Upvote, Self::Downvote];

    fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Going,
    Interested,
    NotGoing,
}

impl ReactionKind for RsvpStatus {
    const ALL: &'static [Self] = &[Self::Going, Self::Interested, Self::NotGoing];

    fn as_str(self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::Interested => "interested",
            Self::NotGoing => "not_going",
        }
    }
}

/// A cached integer column on a target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterColumn {
    pub table: &'static str,
    pub key: &'static str,
    pub column: &'static str,
}

/// Binds one kind of reaction record to the table it targets.
#[derive(Debug)]
pub struct ReactionTable {
    /// Short label used in logs.
    pub label: &'static str,
    pub record_table: &'static str,
    pub record_target_column: &'static str,
    pub record_kind_column: &'static str,
    pub target_table: &'static str,
    pub target_key: &'static str,
    /// `(kind, counter column)` pairs. Kinds not listed have no counter.
    pub counters: &'static [(&'static str, &'static str)],
}

impl ReactionTable {
    pub fn counter_for(&self, kind: &str) -> Option<CounterColumn> {
        self.counters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, column)| CounterColumn {
                table: self.target_table,
                key: self.target_key,
                column: *column,
            })
    }

    /// Every counter column together with the kind that feeds it.
    pub fn counter_columns(&self) -> impl Iterator<Item = (&'static str, CounterColumn)> + '_ {
        self.counters.iter().map(|(kind, column)| {
            (
                *kind,
                CounterColumn {
                    table: self.target_table,
                    key: self.target_key,
                    column: *column,
                },
            )
        })
    }
}

pub static EVENT_VOTES: ReactionTable = ReactionTable {
    label: "event_vote",
    record_table: "event_votes",
    record_target_column: "event_id",
    record_kind_column: "vote_type",
    target_table: "events",
    target_key: "id",
    counters: &[("upvote", "upvotes_count"), ("downvote", "downvotes_count")],
};

pub static COMMENT_VOTES: ReactionTable = ReactionTable {
    label: "comment_vote",
    record_table: "comment_votes",
    record_target_column: "comment_id",
    record_kind_column: "vote_type",
    target_table: "comments",
    target_key: "id",
    counters: &[("upvote", "upvotes_count"), ("downvote", "downvotes_count")],
};

pub static EVENT_RSVPS: ReactionTable = ReactionTable {
    label: "rsvp",
    record_table: "rsvps",
    record_target_column: "event_id",
    record_kind_column: "status",
    target_table: "events",
    target_key: "id",
    counters: &[("going", "rsvp_count")],
};

pub const EVENT_COMMENTS_COUNT: CounterColumn = CounterColumn {
    table: "events",
    key: "id",
    column: "comments_count",
};

/// One voter's current reaction to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub id: Uuid,
    pub target_id: Uuid,
    pub voter_id: Uuid,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReaction {
    pub target_id: Uuid,
    pub voter_id: Uuid,
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Added,
    Removed,
    Switched,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Switched => "switched",
        })
    }
}

/// Result of a toggle: the transition class plus the voter's reaction before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome<K> {
    pub transition: Transition,
    pub previous: Option<K>,
    pub current: Option<K>,
}

/// Change a toggle made to a target's vote counters: -1 for the kind the
/// voter left, +1 for the kind they picked.
///
/// Clients apply it to their displayed counts instead of re-reading the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteDelta {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteDelta {
    pub fn of(outcome: &ToggleOutcome<VoteKind>) -> Self {
        let mut delta = Self::default();
        if let Some(previous) = outcome.previous {
            *delta.slot(previous) -= 1;
        }
        if let Some(current) = outcome.current {
            *delta.slot(current) += 1;
        }
        delta
    }

    fn slot(&mut self, kind: VoteKind) -> &mut i64 {
        match kind {
            VoteKind::Upvote => &mut self.upvotes,
            VoteKind::Downvote => &mut self.downvotes,
        }
    }
}
