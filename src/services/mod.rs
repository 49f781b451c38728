pub mod comment;
pub mod comment_tree;
pub mod counter;
pub mod event;
pub mod reaction;
pub mod reconcile;

pub use comment::CommentService;
pub use comment_tree::{assemble_tree, walk, CommentNode, DisplayRow};
pub use counter::{adjust_counter, CounterMode};
pub use event::EventService;
pub use reaction::ReactionEngine;
pub use reconcile::{reconcile_all, reconcile_target, ReconcileReport};
