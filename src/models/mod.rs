pub mod comment;
pub mod event;
pub mod reaction;

pub use comment::{Entity as Comment, Model as CommentModel};
pub use event::{Entity as Event, Model as EventModel};
pub use reaction::{
    CounterColumn, NewReaction, ReactionKind, ReactionRecord, ReactionTable, RsvpStatus,
    ToggleOutcome, Transition, VoteKind, VoteDelta, COMMENT_VOTES, EVENT_COMMENTS_COUNT,
    EVENT_RSVPS, EVENT_VOTES,
};
