//! Tree view over flat task records
//!
//! Builds nested `TaskNode`s from a flat, ordered batch of `Task`s using the
//! `parent_id` links. Construction never follows parent pointers recursively:
//! records are indexed by id, attached to their parent's child list, and the
//! owned tree is assembled bottom-up with an explicit stack. This terminates
//! for any input, including dangling parents, self-parenting and cycles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::task::Task;

/// A task together with its nested subtasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,

    /// Direct children in input order; empty (never absent) for leaves
    #[serde(default)]
    pub subtasks: Vec<TaskNode>,
}

impl TaskNode {
    pub fn leaf(task: Task) -> Self {
        Self {
            task,
            subtasks: Vec::new(),
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Number of records in this subtree, including this node
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.subtasks.iter());
        }
        total
    }

    /// Find a node in this subtree by id
    pub fn find(&self, id: &str) -> Option<&TaskNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.task.id == id {
                return Some(node);
            }
            stack.extend(node.subtasks.iter().rev());
        }
        None
    }

    /// Pre-order walk yielding `(depth, node)` pairs
    pub fn walk(&self) -> Vec<(usize, &TaskNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.subtasks.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    /// Pre-order ids of this subtree
    pub fn flatten(&self) -> Vec<&str> {
        self.walk().into_iter().map(|(_, node)| node.task.id.as_str()).collect()
    }

    /// Completed direct children over total direct children
    pub fn progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|c| c.task.is_done()).count();
        (done, self.subtasks.len())
    }
}

/// Find a node anywhere in a forest
pub fn find_in_forest<'a>(roots: &'a [TaskNode], id: &str) -> Option<&'a TaskNode> {
    roots.iter().find_map(|root| root.find(id))
}

/// Convert a flat, ordered batch of tasks into a forest of roots
///
/// - Siblings keep their relative input order.
/// - A task whose parent id is absent, unknown, or its own id becomes a root.
/// - Tasks caught in a parent cycle are unreachable from any root; the first
///   such task (in input order) is detached from its parent and promoted to a
///   root, which breaks the cycle. Every input task appears exactly once.
/// - When ids repeat, children attach to the first record carrying the id.
pub fn build_hierarchy(flat: Vec<Task>) -> Vec<TaskNode> {
    debug!(count = flat.len(), "build_hierarchy: called");
    let n = flat.len();

    // Pass 1: index by id
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, task) in flat.iter().enumerate() {
        index.entry(task.id.as_str()).or_insert(i);
    }

    // Pass 2: attach to parent or root set
    let mut parent_of: Vec<Option<usize>> = vec![None; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, task) in flat.iter().enumerate() {
        let parent = task
            .parent_id
            .as_deref()
            .and_then(|pid| index.get(pid).copied())
            .filter(|&p| p != i);
        match parent {
            Some(p) => {
                parent_of[i] = Some(p);
                children[p].push(i);
            }
            None => {
                if task.parent_id.is_some() {
                    debug!(id = %task.id, parent_id = ?task.parent_id, "build_hierarchy: orphan promoted to root");
                }
            }
        }
    }

    // Reachability from the natural roots; anything left over sits on a cycle
    let mut visited = vec![false; n];
    let mut is_root: Vec<bool> = parent_of.iter().map(Option::is_none).collect();
    for i in 0..n {
        if is_root[i] {
            mark_reachable(i, &children, &mut visited);
        }
    }
    for i in 0..n {
        if visited[i] {
            continue;
        }
        if let Some(p) = parent_of[i].take() {
            warn!(id = %flat[i].id, "build_hierarchy: parent cycle detected, promoting to root");
            children[p].retain(|&c| c != i);
        }
        is_root[i] = true;
        mark_reachable(i, &children, &mut visited);
    }

    // Assemble owned nodes bottom-up (post-order with an explicit stack)
    let mut slots: Vec<Option<Task>> = flat.into_iter().map(Some).collect();
    let mut built: Vec<Option<TaskNode>> = (0..n).map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = Vec::new();
    for i in (0..n).filter(|&i| is_root[i]) {
        stack.push((i, false));
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                let subtasks = children[node]
                    .iter()
                    .filter_map(|&c| built[c].take())
                    .collect();
                if let Some(task) = slots[node].take() {
                    built[node] = Some(TaskNode { task, subtasks });
                }
            } else {
                stack.push((node, true));
                for &c in children[node].iter().rev() {
                    stack.push((c, false));
                }
            }
        }
    }

    let roots: Vec<TaskNode> = (0..n)
        .filter(|&i| is_root[i])
        .filter_map(|i| built[i].take())
        .collect();
    debug!(root_count = roots.len(), "build_hierarchy: done");
    roots
}

fn mark_reachable(start: usize, children: &[Vec<usize>], visited: &mut [bool]) {
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        stack.extend(children[i].iter().copied());
    }
}
