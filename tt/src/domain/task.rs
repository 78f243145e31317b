//! Flat task records
//!
//! `Task` is the persisted form: a row that points at its parent by id.
//! The nested view lives in [`super::hierarchy`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use taskstore::{IndexValue, Record, now_ms};
use tracing::debug;

use super::id::generate_id;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "DONE" => Ok(Self::Done),
            other => Err(format!("Unknown status '{}'. Expected TODO, IN_PROGRESS or DONE", other)),
        }
    }
}

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    System,
}

/// One turn of a task's conversation with the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// A persisted task in flat form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Parent task id; `None` for top-level tasks
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Absent or null reads as TODO
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Model output once the task has been executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<String>,

    /// Conversation with the model, oldest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_history: Vec<ChatMessage>,

    /// Creation timestamp (Unix milliseconds)
    #[serde(default)]
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Task {
    /// Create a new top-level task with a generated id
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_id(generate_id(&name), name)
    }

    /// Create a task with a specific id (for tests and imports)
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            description: None,
            status: TaskStatus::Todo,
            assignee: None,
            execution_result: None,
            chat_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a fresh task from a creation form
    pub fn from_form(form: TaskCreationForm) -> Self {
        debug!(name = %form.name, parent_id = ?form.parent_id, "Task::from_form: called");
        let mut task = Self::new(form.name);
        task.parent_id = form.parent_id;
        task.description = form.description;
        task.chat_history = form.chat_history;
        task
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        if let Some(parent) = &self.parent_id {
            fields.insert("parent".to_string(), IndexValue::String(parent.clone()));
        }
        if let Some(assignee) = &self.assignee {
            fields.insert("assignee".to_string(), IndexValue::String(assignee.clone()));
        }
        fields
    }
}

/// Input for creating a task; never stored as-is
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskCreationForm {
    pub name: String,

    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

impl TaskCreationForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Partial update of a stored task; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub execution_result: Option<String>,
    pub chat_history: Option<Vec<ChatMessage>>,

    /// Turns added after the stored history (after any replacement)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append_history: Vec<ChatMessage>,
}

impl TaskPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn execution_result(mut self, result: impl Into<String>) -> Self {
        self.execution_result = Some(result.into());
        self
    }

    pub fn chat_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = Some(history);
        self
    }

    pub fn append_history(mut self, turns: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.append_history.extend(turns);
        self
    }

    /// Apply the set fields onto a task and bump its update time
    pub fn apply(self, task: &mut Task) {
        debug!(id = %self.id, "TaskPatch::apply: called");
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(assignee) = self.assignee {
            task.assignee = Some(assignee);
        }
        if let Some(result) = self.execution_result {
            task.execution_result = Some(result);
        }
        if let Some(history) = self.chat_history {
            task.chat_history = history;
        }
        task.chat_history.extend(self.append_history);
        task.updated_at = now_ms();
    }
}
