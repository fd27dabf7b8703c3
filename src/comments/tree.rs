//! Flat comment rows to nested reply threads.
//!
//! [`build_comment_tree`] is a two-pass indexed build: the first pass indexes
//! every comment by id, the second links each comment under its parent. Roots
//! and replies keep the order they had in the input. A comment whose parent is
//! not in the input is an orphan and is left out of the forest.
//!
//! The resulting [`CommentNode`] tree owns its children, so a cycle cannot be
//! represented. Parent cycles in the input are never anchored at a root and
//! drop out like orphans. A reply chain can be as long as the input, so every
//! walk here (build, count, view and drop) uses an explicit stack.

use serde::Serialize;
use std::collections::HashMap;

use crate::db::models::Comment;

/// Nesting depth at which replies collapse behind a "view more" affordance.
pub const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    fn leaf(comment: Comment) -> Self {
        Self {
            comment,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            total += 1;
            pending.extend(node.children.iter());
        }
        total
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Total number of nodes reachable from the given roots.
pub fn count_nodes(forest: &[CommentNode]) -> usize {
    forest.iter().map(CommentNode::size).sum()
}

pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    // Pass 1: index ids. With duplicate ids the last row wins the lookup.
    let index: HashMap<&str, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    // Pass 2: link children to parents, or record roots.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id.as_deref() {
            None => roots.push(i),
            Some(parent_id) => {
                if let Some(&parent) = index.get(parent_id) {
                    children[parent].push(i);
                }
            }
        }
    }

    let mut slots: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|i| assemble(i, &children, &mut slots))
        .collect()
}

/// A node under construction and the position of its next child row.
struct BuildFrame {
    node: CommentNode,
    row: usize,
    next: usize,
}

/// Moves row `root` and its descendants out of `slots`. A row already taken
/// is skipped, so every row appears at most once in the output.
fn assemble(
    root: usize,
    children: &[Vec<usize>],
    slots: &mut [Option<Comment>],
) -> Option<CommentNode> {
    let comment = slots[root].take()?;
    let mut stack = vec![BuildFrame {
        node: CommentNode::leaf(comment),
        row: root,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if let Some(&child) = children[frame.row].get(frame.next) {
            frame.next += 1;
            if let Some(comment) = slots[child].take() {
                stack.push(BuildFrame {
                    node: CommentNode::leaf(comment),
                    row: child,
                    next: 0,
                });
            }
            continue;
        }

        let finished = stack.pop()?.node;
        match stack.last_mut() {
            Some(parent) => parent.node.children.push(finished),
            None => return Some(finished),
        }
    }
    None
}

/// Presentation shape of a thread with nesting capped at a fixed depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
    /// Direct replies not expanded because the depth cap was reached.
    pub hidden_replies: usize,
}

/// Render a forest for display. Nodes at depth `max_depth` or deeper (roots
/// are depth 0) keep their replies collapsed and report how many there are.
pub fn thread_view(forest: &[CommentNode], max_depth: usize) -> Vec<CommentThread> {
    forest
        .iter()
        .filter_map(|root| view_tree(root, max_depth))
        .collect()
}

struct ViewFrame<'a> {
    node: &'a CommentNode,
    view: CommentThread,
    expand: bool,
    next: usize,
}

impl<'a> ViewFrame<'a> {
    fn open(node: &'a CommentNode, depth: usize, max_depth: usize) -> Self {
        let expand = depth < max_depth;
        Self {
            node,
            view: CommentThread {
                comment: node.comment.clone(),
                replies: Vec::new(),
                hidden_replies: if expand { 0 } else { node.children.len() },
            },
            expand,
            next: 0,
        }
    }
}

fn view_tree(root: &CommentNode, max_depth: usize) -> Option<CommentThread> {
    let mut stack = vec![ViewFrame::open(root, 0, max_depth)];

    while let Some(frame) = stack.last_mut() {
        let node = frame.node;
        if frame.expand {
            if let Some(child) = node.children.get(frame.next) {
                frame.next += 1;
                let depth = stack.len();
                stack.push(ViewFrame::open(child, depth, max_depth));
                continue;
            }
        }

        let finished = stack.pop()?.view;
        match stack.last_mut() {
            Some(parent) => parent.view.replies.push(finished),
            None => return Some(finished),
        }
    }
    None
}
