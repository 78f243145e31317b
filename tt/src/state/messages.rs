//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Task, TaskCreationForm, TaskPatch, TaskStatus};

/// Errors from task store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Backend(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<taskstore::StoreError> for StoreError {
    fn from(err: taskstore::StoreError) -> Self {
        match err {
            taskstore::StoreError::NotFound { id, .. } => StoreError::NotFound(id),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    CreateTask {
        form: TaskCreationForm,
        reply: oneshot::Sender<StoreResponse<Task>>,
    },
    CreateTasks {
        forms: Vec<TaskCreationForm>,
        reply: oneshot::Sender<StoreResponse<Vec<Task>>>,
    },
    GetTask {
        id: String,
        reply: oneshot::Sender<StoreResponse<Option<Task>>>,
    },
    UpdateTask {
        patch: TaskPatch,
        reply: oneshot::Sender<StoreResponse<Task>>,
    },
    ListTasks {
        parent_filter: Option<String>,
        status_filter: Option<TaskStatus>,
        reply: oneshot::Sender<StoreResponse<Vec<Task>>>,
    },

    /// Shutdown the actor
    Shutdown,
}
