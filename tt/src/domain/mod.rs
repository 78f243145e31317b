//! Domain types for tasktree
//!
//! `Task` is the flat record persisted by the store; `TaskNode` is the
//! derived tree view rebuilt on every read.

mod hierarchy;
mod id;
mod task;

pub use hierarchy::{TaskNode, build_hierarchy, find_in_forest};
pub use id::{IdResolver, generate_id};
pub use task::{ChatMessage, ChatRole, Task, TaskCreationForm, TaskPatch, TaskStatus};

// Re-export taskstore types for convenience
pub use taskstore::{Filter, FilterOp, IndexValue, Record, Store};
