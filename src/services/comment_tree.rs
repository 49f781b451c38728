//! Comment tree assembly
//!
//! Turns the flat, chronologically ordered comment rows of one event into a
//! forest of reply trees. Sibling and root order always follow input order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::{models::CommentModel, utils::time_ago::format_relative};

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: Uuid,
    pub event_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i64,
    pub age: String,
    pub created_at: String,
    pub updated_at: String,
    pub replies: Vec<CommentNode>,
}

impl utoipa::ToSchema for CommentNode {
    fn name() -> std::borrow::Cow<'static, str> {
        "CommentNode".into()
    }
}

impl utoipa::PartialSchema for CommentNode {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ArrayBuilder, ObjectBuilder, Schema, Type};
        use utoipa::PartialSchema;
        utoipa::openapi::RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .property("id", utoipa::schema!(Uuid))
                .property("event_id", utoipa::schema!(Uuid))
                .property("parent_id", utoipa::schema!(Option<Uuid>))
                .property("author_id", utoipa::schema!(Uuid))
                .property("content", String::schema())
                .property("upvotes", i32::schema())
                .property("downvotes", i32::schema())
                .property("score", i64::schema())
                .property("age", String::schema())
                .property("created_at", String::schema())
                .property("updated_at", String::schema())
                .property(
                    "replies",
                    ArrayBuilder::new()
                        .items(utoipa::openapi::Ref::from_schema_name("CommentNode"))
                        .build(),
                )
                .required("id")
                .required("event_id")
                .required("author_id")
                .required("content")
                .required("upvotes")
                .required("downvotes")
                .required("score")
                .required("age")
                .required("created_at")
                .required("updated_at")
                .required("replies")
                .build(),
        ))
    }
}

impl CommentNode {
    fn from_model(c: CommentModel, now: DateTime<Utc>) -> Self {
        Self {
            id: c.id,
            event_id: c.event_id,
            parent_id: c.parent_id,
            author_id: c.author_id,
            age: format_relative(c.created_at, now),
            score: i64::from(c.upvotes_count) - i64::from(c.downvotes_count),
            upvotes: c.upvotes_count,
            downvotes: c.downvotes_count,
            content: c.content,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
            replies: Vec::new(),
        }
    }

}

/// Nesting limit used by [`assemble_tree`].
pub const DEFAULT_MAX_NESTING: usize = 32;

/// Build the reply forest for a batch of comments.
///
/// A comment whose parent is not in the batch becomes a root. Parent chains
/// that loop back on themselves are cut at the earliest member of the loop,
/// which becomes a root. Repeated ids keep their first occurrence.
pub fn assemble_tree(comments: Vec<CommentModel>, now: DateTime<Utc>) -> Vec<CommentNode> {
    assemble_tree_with_depth(comments, now, DEFAULT_MAX_NESTING)
}

/// [`assemble_tree`] with nodes never nested deeper than `max_depth` (roots are depth 0).
///
/// A reply that would sit deeper is attached to its ancestor at depth
/// `max_depth - 1`, next to that ancestor's other replies in input order, and
/// keeps its real `parent_id`. Serializing and dropping the forest recurse
/// per level, so the cap bounds stack use no matter what the store holds.
pub fn assemble_tree_with_depth(
    comments: Vec<CommentModel>,
    now: DateTime<Utc>,
    max_depth: usize,
) -> Vec<CommentNode> {
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(comments.len());
    let mut slots: Vec<Option<CommentNode>> = Vec::with_capacity(comments.len());

    for comment in comments {
        if index.contains_key(&comment.id) {
            tracing::debug!(comment_id = %comment.id, "Dropping duplicate comment row");
            continue;
        }
        index.insert(comment.id, slots.len());
        slots.push(Some(CommentNode::from_model(comment, now)));
    }

    let mut parents: Vec<Option<usize>> = slots
        .iter()
        .map(|slot| {
            let node = slot.as_ref()?;
            let parent_id = node.parent_id?;
            match index.get(&parent_id) {
                Some(&p) => Some(p),
                None => {
                    tracing::debug!(
                        comment_id = %node.id,
                        parent_id = %parent_id,
                        "Parent not in batch, promoting comment to root"
                    );
                    None
                }
            }
        })
        .collect();

    break_cycles(&mut parents);

    let parents = cap_depth(&parents, max_depth);

    let (roots, children) = group_children(&parents);

    // Attach children before their parents so every subtree is complete when moved.
    for i in post_order(&roots, &children) {
        let replies: Vec<CommentNode> = children[i]
            .iter()
            .filter_map(|&child| slots[child].take())
            .collect();
        if let Some(node) = slots[i].as_mut() {
            node.replies = replies;
        }
    }

    roots.iter().filter_map(|&r| slots[r].take()).collect()
}

fn group_children(parents: &[Option<usize>]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); parents.len()];
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }
    (roots, children)
}

/// Re-parent every node deeper than `max_depth` onto its ancestor at `max_depth - 1`.
/// Expects an acyclic parent list.
fn cap_depth(parents: &[Option<usize>], max_depth: usize) -> Vec<Option<usize>> {
    let (roots, children) = group_children(parents);
    let mut capped = parents.to_vec();
    let mut depth = vec![0usize; parents.len()];

    let mut queue: VecDeque<usize> = roots.into_iter().collect();
    while let Some(p) = queue.pop_front() {
        for &c in &children[p] {
            depth[c] = depth[p] + 1;
            if depth[c] > max_depth {
                // The parent is at max_depth or deeper, so its capped parent is the anchor.
                capped[c] = capped[p];
            }
            queue.push_back(c);
        }
    }
    capped
}

fn break_cycles(parents: &mut [Option<usize>]) {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parents.len()];
    for start in 0..parents.len() {
        let mut path = Vec::new();
        let mut current = Some(start);

        while let Some(i) = current {
            match state[i] {
                DONE => break,
                ON_PATH => {
                    let loop_start = path.iter().position(|&p| p == i).unwrap_or(0);
                    if let Some(&earliest) = path[loop_start..].iter().min() {
                        tracing::warn!(index = earliest, "Breaking comment parent cycle");
                        parents[earliest] = None;
                    }
                    break;
                }
                _ => {
                    state[i] = ON_PATH;
                    path.push(i);
                    current = parents[i];
                }
            }
        }

        for i in path {
            state[i] = DONE;
        }
    }
}

fn post_order(roots: &[usize], children: &[Vec<usize>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(children.len());
    let mut stack: Vec<(usize, bool)> = roots.iter().map(|&r| (r, false)).collect();
    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            order.push(i);
        } else {
            stack.push((i, true));
            stack.extend(children[i].iter().map(|&c| (c, false)));
        }
    }
    order
}

/// One comment as a renderer lays it out.
#[derive(Debug, Clone, Copy)]
pub struct DisplayRow<'a> {
    pub depth: usize,
    pub node: &'a CommentNode,
}

/// Pre-order walk of a forest without recursion. Indentation stops growing at `max_depth`.
pub fn walk(nodes: &[CommentNode], max_depth: usize) -> Vec<DisplayRow<'_>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(usize, &CommentNode)> = nodes.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        rows.push(DisplayRow {
            depth: depth.min(max_depth),
            node,
        });
        stack.extend(node.replies.iter().rev().map(|child| (depth + 1, child)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn comment(n: u128, parent: Option<u128>) -> CommentModel {
        let created = Utc::now() - Duration::minutes(10);
        CommentModel {
            id: id(n),
            event_id: id(1000),
            author_id: id(2000),
            parent_id: parent.map(id),
            content: format!("comment {n}"),
            upvotes_count: 3,
            downvotes_count: 1,
            created_at: created,
            updated_at: created,
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<Uuid> {
        nodes.iter().map(|n| n.id).collect()
    }

    fn all_ids(nodes: &[CommentNode]) -> Vec<Uuid> {
        walk(nodes, usize::MAX).iter().map(|r| r.node.id).collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(assemble_tree(Vec::new(), Utc::now()).is_empty());
    }

    #[test]
    fn orphan_is_promoted_to_root() {
        let tree = assemble_tree(
            vec![comment(1, None), comment(2, Some(1)), comment(3, Some(99))],
            Utc::now(),
        );
        assert_eq!(ids(&tree), vec![id(1), id(3)]);
        assert_eq!(ids(&tree[0].replies), vec![id(2)]);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn derived_fields_are_filled() {
        let tree = assemble_tree(vec![comment(1, None)], Utc::now());
        assert_eq!(tree[0].score, 2);
        assert_eq!(tree[0].age, "10 minutes ago");
    }

    #[test]
    fn sibling_and_root_order_follow_input() {
        let tree = assemble_tree(
            vec![
                comment(5, None),
                comment(1, None),
                comment(7, Some(5)),
                comment(3, Some(5)),
                comment(9, Some(1)),
                comment(4, Some(5)),
            ],
            Utc::now(),
        );
        assert_eq!(ids(&tree), vec![id(5), id(1)]);
        assert_eq!(ids(&tree[0].replies), vec![id(7), id(3), id(4)]);
        assert_eq!(ids(&tree[1].replies), vec![id(9)]);
    }

    #[test]
    fn reply_listed_before_parent_still_attaches() {
        let tree = assemble_tree(vec![comment(2, Some(1)), comment(1, None)], Utc::now());
        assert_eq!(ids(&tree), vec![id(1)]);
        assert_eq!(ids(&tree[0].replies), vec![id(2)]);
    }

    #[test]
    fn self_parent_becomes_root() {
        let tree = assemble_tree(vec![comment(1, Some(1)), comment(2, Some(1))], Utc::now());
        assert_eq!(ids(&tree), vec![id(1)]);
        assert_eq!(ids(&tree[0].replies), vec![id(2)]);
    }

    #[test]
    fn cycle_is_cut_at_earliest_member() {
        // 1 -> 3 -> 2 -> 1, plus 4 hanging off the loop
        let tree = assemble_tree(
            vec![
                comment(1, Some(3)),
                comment(2, Some(1)),
                comment(3, Some(2)),
                comment(4, Some(2)),
            ],
            Utc::now(),
        );
        assert_eq!(ids(&tree), vec![id(1)]);
        assert_eq!(ids(&tree[0].replies), vec![id(2)]);
        assert_eq!(ids(&tree[0].replies[0].replies), vec![id(3), id(4)]);
    }

    #[test]
    fn every_comment_appears_once() {
        let input = vec![
            comment(1, Some(4)),
            comment(2, None),
            comment(3, Some(3)),
            comment(4, Some(1)),
            comment(5, Some(2)),
            comment(6, Some(42)),
            comment(7, Some(5)),
            comment(2, Some(7)),
        ];
        let tree = assemble_tree(input, Utc::now());

        let seen = all_ids(&tree);
        let unique: HashSet<Uuid> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 7);
        assert_eq!(unique.len(), 7);
    }

    #[test]
    fn duplicate_id_keeps_first_row() {
        let mut second = comment(1, None);
        second.content = "second".to_string();
        let tree = assemble_tree(vec![comment(1, None), second], Utc::now());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].content, "comment 1");
    }

    #[test]
    fn assembly_is_repeatable() {
        let input = vec![comment(1, None), comment(2, Some(1)), comment(3, Some(2))];
        let now = Utc::now();
        let a = assemble_tree(input.clone(), now);
        let b = assemble_tree(input, now);
        assert_eq!(all_ids(&a), all_ids(&b));
    }

    #[test]
    fn deep_chain_walk_clamps_depth() {
        let mut input = vec![comment(0, None)];
        for n in 1..2_000u128 {
            input.push(comment(n, Some(n - 1)));
        }
        let tree = assemble_tree(input, Utc::now());
        assert_eq!(tree.len(), 1);

        let rows = walk(&tree, 8);
        assert_eq!(rows.len(), 2_000);
        assert_eq!(rows[3].depth, 3);
        assert_eq!(rows.last().map(|r| r.depth), Some(8));
    }

    #[test]
    fn replies_past_the_cap_attach_to_anchor() {
        let input: Vec<CommentModel> = (0..6u128)
            .map(|n| comment(n, n.checked_sub(1)))
            .collect();
        let tree = assemble_tree_with_depth(input, Utc::now(), 2);

        assert_eq!(ids(&tree), vec![id(0)]);
        assert_eq!(ids(&tree[0].replies), vec![id(1)]);
        let anchored = &tree[0].replies[0].replies;
        assert_eq!(ids(anchored), vec![id(2), id(3), id(4), id(5)]);
        assert!(anchored.iter().all(|n| n.replies.is_empty()));
        assert_eq!(anchored[2].parent_id, Some(id(3)));
    }

    #[test]
    fn zero_depth_flattens_to_roots() {
        let input = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(2)),
        ];
        let tree = assemble_tree_with_depth(input, Utc::now(), 0);
        assert_eq!(ids(&tree), vec![id(1), id(2), id(3), id(4)]);
    }

    #[test]
    fn very_deep_chain_serializes_and_drops() {
        let input: Vec<CommentModel> = (0..100_000u128)
            .map(|n| comment(n, n.checked_sub(1)))
            .collect();
        let tree = assemble_tree(input, Utc::now());

        let rows = walk(&tree, usize::MAX);
        assert_eq!(rows.len(), 100_000);
        assert_eq!(
            rows.iter().map(|r| r.depth).max(),
            Some(DEFAULT_MAX_NESTING)
        );

        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains(&id(99_999).to_string()));
        drop(tree);
    }

    #[test]
    fn walk_is_pre_order() {
        let tree = assemble_tree(
            vec![
                comment(1, None),
                comment(2, Some(1)),
                comment(3, Some(2)),
                comment(4, None),
                comment(5, Some(1)),
            ],
            Utc::now(),
        );
        let rows = walk(&tree, 8);
        let order: Vec<(Uuid, usize)> = rows.iter().map(|r| (r.node.id, r.depth)).collect();
        assert_eq!(
            order,
            vec![(id(1), 0), (id(2), 1), (id(3), 2), (id(5), 1), (id(4), 0)]
        );
    }
}
