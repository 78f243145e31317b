//! TaskStore trait: the contract the pipeline writes through

use async_trait::async_trait;

use super::messages::StoreResponse;
use crate::domain::{Task, TaskCreationForm, TaskPatch};

/// Reads and writes flat task records
///
/// Implementations are the sole writers of durable task state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks, in insertion order
    async fn get_tasks(&self) -> StoreResponse<Vec<Task>>;

    async fn get_task(&self, id: &str) -> StoreResponse<Option<Task>>;

    async fn create_task(&self, form: TaskCreationForm) -> StoreResponse<Task>;

    /// Create a batch of tasks in one call; all or nothing
    async fn add_many_tasks(&self, forms: Vec<TaskCreationForm>) -> StoreResponse<Vec<Task>>;

    /// Apply a partial update and return the stored result
    async fn update_task(&self, patch: TaskPatch) -> StoreResponse<Task>;
}
