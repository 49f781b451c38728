use crate::{
    error::{AppError, AppResult},
    models::{CommentModel, COMMENT_VOTES, EVENT_COMMENTS_COUNT},
    services::{
        comment_tree::{assemble_tree_with_depth, CommentNode},
        counter::{adjust_counter, CounterMode},
    },
    store::{CommentStore, EventStore, ReactionStore, SharedStore},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Comments longer than this many words are rejected.
pub const MAX_COMMENT_WORDS: usize = 100;

/// Deepest reply level accepted on write and shown nested on read. Top-level comments are level 0.
pub const DEFAULT_MAX_REPLY_DEPTH: usize = 8;

pub struct CommentService {
    store: SharedStore,
    mode: CounterMode,
    max_reply_depth: usize,
    max_tree_depth: usize,
}

impl CommentService {
    pub fn new(store: SharedStore, mode: CounterMode) -> Self {
        Self {
            store,
            mode,
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            max_tree_depth: DEFAULT_MAX_REPLY_DEPTH,
        }
    }

    /// `reply` bounds new replies; `tree` bounds nesting in assembled trees.
    pub fn with_depth_limits(mut self, reply: usize, tree: usize) -> Self {
        self.max_reply_depth = reply;
        self.max_tree_depth = tree;
        self
    }

    /// Reply forest for one event, oldest comments first at every level.
    pub async fn list_tree(&self, event_id: Uuid) -> AppResult<Vec<CommentNode>> {
        self.require_event(event_id).await?;
        let comments = self
            .store
            .list_comments(event_id)
            .await
            .map_err(AppError::from_store)?;
        Ok(assemble_tree_with_depth(
            comments,
            Utc::now(),
            self.max_tree_depth,
        ))
    }

    pub async fn create(
        &self,
        event_id: Uuid,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
    ) -> AppResult<CommentModel> {
        let content = validate_content(content)?;
        self.require_event(event_id).await?;
        if let Some(pid) = parent_id {
            self.validate_parent(pid, event_id).await?;
        }

        let now = Utc::now();
        let comment = self
            .store
            .insert_comment(CommentModel {
                id: Uuid::new_v4(),
                event_id,
                author_id,
                parent_id,
                content: content.to_string(),
                upvotes_count: 0,
                downvotes_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(AppError::from_store)?;

        adjust_counter(&*self.store, &EVENT_COMMENTS_COUNT, event_id, 1, self.mode).await?;

        info!(comment_id = %comment.id, event_id = %event_id, "Comment created");
        Ok(comment)
    }

    /// Delete a comment written by `author_id`, together with its votes.
    ///
    /// Replies are kept and surface as top-level comments.
    pub async fn delete(&self, comment_id: Uuid, author_id: Uuid) -> AppResult<()> {
        let existing = self.get_by_id(comment_id).await?;
        if existing.author_id != author_id {
            return Err(AppError::Forbidden);
        }

        let removed_votes = self
            .store
            .delete_reactions_for_target(&COMMENT_VOTES, comment_id)
            .await
            .map_err(AppError::from_store)?;
        self.store
            .delete_comment(comment_id)
            .await
            .map_err(AppError::from_store)?;
        adjust_counter(
            &*self.store,
            &EVENT_COMMENTS_COUNT,
            existing.event_id,
            -1,
            self.mode,
        )
        .await?;

        info!(
            comment_id = %comment_id,
            event_id = %existing.event_id,
            removed_votes,
            "Comment deleted"
        );
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<CommentModel> {
        self.store
            .find_comment(id)
            .await
            .map_err(AppError::from_store)?
            .ok_or(AppError::NotFound)
    }

    async fn require_event(&self, event_id: Uuid) -> AppResult<()> {
        self.store
            .find_event(event_id)
            .await
            .map_err(AppError::from_store)?
            .map(|_| ())
            .ok_or(AppError::NotFound)
    }

    async fn validate_parent(&self, parent_id: Uuid, event_id: Uuid) -> AppResult<()> {
        let parent = self
            .store
            .find_comment(parent_id)
            .await
            .map_err(AppError::from_store)?
            .ok_or(AppError::Validation("Parent comment not found".to_string()))?;

        if parent.event_id != event_id {
            return Err(AppError::Validation(
                "Parent comment belongs to a different event".to_string(),
            ));
        }

        if self.depth_of(&parent).await? >= self.max_reply_depth {
            return Err(AppError::Validation(
                "Maximum comment nesting depth reached".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of ancestors above `comment`, counted up to one past the reply limit.
    async fn depth_of(&self, comment: &CommentModel) -> AppResult<usize> {
        let mut depth = 0;
        let mut current = comment.parent_id;
        while let Some(id) = current {
            depth += 1;
            if depth > self.max_reply_depth {
                break;
            }
            current = self
                .store
                .find_comment(id)
                .await
                .map_err(AppError::from_store)?
                .and_then(|c| c.parent_id);
        }
        Ok(depth)
    }
}

fn validate_content(content: &str) -> AppResult<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }
    let words = trimmed.split_whitespace().count();
    if words > MAX_COMMENT_WORDS {
        return Err(AppError::Validation(format!(
            "Comment is {} words, the limit is {}",
            words, MAX_COMMENT_WORDS
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventModel, VoteKind};
    use crate::services::reaction::ReactionEngine;
    use crate::store::{CommentStore, EventStore, MemoryStore};
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryStore>, CommentService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let event_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert_event(EventModel {
                id: event_id,
                host_id: Uuid::new_v4(),
                title: "Open mic".to_string(),
                description: String::new(),
                location: None,
                category: None,
                start_time: None,
                upvotes_count: 0,
                downvotes_count: 0,
                rsvp_count: 0,
                comments_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let service = CommentService::new(store.clone(), CounterMode::Atomic);
        (store, service, event_id)
    }

    async fn comments_count(store: &MemoryStore, event_id: Uuid) -> i32 {
        store.find_event(event_id).await.unwrap().unwrap().comments_count
    }

    #[test]
    fn content_limits() {
        assert!(validate_content("   ").is_err());
        assert_eq!(validate_content("  hello there ").unwrap(), "hello there");
        let exactly = vec!["word"; MAX_COMMENT_WORDS].join(" ");
        assert!(validate_content(&exactly).is_ok());
        let over = vec!["word"; MAX_COMMENT_WORDS + 1].join(" ");
        assert!(matches!(validate_content(&over), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn create_and_list_tree() {
        let (store, service, event_id) = setup().await;
        let author = Uuid::new_v4();

        let root = service.create(event_id, author, None, "first!").await.unwrap();
        service
            .create(event_id, author, Some(root.id), "reply")
            .await
            .unwrap();

        let tree = service.list_tree(event_id).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].content, "reply");
        assert_eq!(comments_count(&store, event_id).await, 2);
    }

    #[tokio::test]
    async fn parent_must_belong_to_same_event() {
        let (_store, service, event_id) = setup().await;
        let missing = service
            .create(event_id, Uuid::new_v4(), Some(Uuid::new_v4()), "hi")
            .await;
        assert!(matches!(missing, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let (_store, service, _event_id) = setup().await;
        let result = service.create(Uuid::new_v4(), Uuid::new_v4(), None, "hi").await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(matches!(
            service.list_tree(Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn replies_stop_at_depth_limit() {
        let (_store, service, event_id) = setup().await;
        let service = service.with_depth_limits(3, 3);
        let author = Uuid::new_v4();

        let mut parent = service.create(event_id, author, None, "level 0").await.unwrap();
        for level in 1..=3 {
            parent = service
                .create(event_id, author, Some(parent.id), &format!("level {level}"))
                .await
                .unwrap();
        }

        let too_deep = service
            .create(event_id, author, Some(parent.id), "level 4")
            .await;
        assert!(matches!(too_deep, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn stored_chain_deeper_than_limit_is_flattened() {
        let (store, service, event_id) = setup().await;
        let service = service.with_depth_limits(3, 3);

        let now = Utc::now();
        let mut parent_id = None;
        for n in 0..50 {
            let id = Uuid::new_v4();
            store
                .insert_comment(CommentModel {
                    id,
                    event_id,
                    author_id: Uuid::new_v4(),
                    parent_id,
                    content: format!("level {n}"),
                    upvotes_count: 0,
                    downvotes_count: 0,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
            parent_id = Some(id);
        }

        let tree = service.list_tree(event_id).await.unwrap();
        let rows = crate::services::comment_tree::walk(&tree, usize::MAX);
        assert_eq!(rows.len(), 50);
        assert_eq!(rows.iter().map(|r| r.depth).max(), Some(3));
    }

    #[tokio::test]
    async fn only_author_may_delete() {
        let (_store, service, event_id) = setup().await;
        let comment = service
            .create(event_id, Uuid::new_v4(), None, "mine")
            .await
            .unwrap();
        let result = service.delete(comment.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn delete_removes_votes_and_promotes_replies() {
        let (store, service, event_id) = setup().await;
        let author = Uuid::new_v4();
        let parent = service.create(event_id, author, None, "parent").await.unwrap();
        let reply = service
            .create(event_id, Uuid::new_v4(), Some(parent.id), "reply")
            .await
            .unwrap();

        let engine = ReactionEngine::new(store.clone(), CounterMode::Atomic);
        engine
            .toggle_comment_vote(parent.id, Some(Uuid::new_v4()), VoteKind::Upvote)
            .await
            .unwrap();
        assert_eq!(store.reactions_in(&COMMENT_VOTES).len(), 1);

        service.delete(parent.id, author).await.unwrap();

        assert!(store.reactions_in(&COMMENT_VOTES).is_empty());
        assert!(store.find_comment(parent.id).await.unwrap().is_none());
        assert_eq!(comments_count(&store, event_id).await, 1);

        let tree = service.list_tree(event_id).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, reply.id);
    }
}
