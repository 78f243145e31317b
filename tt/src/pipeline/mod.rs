//! Task pipeline: execution and decomposition through a completion client
//!
//! The pipeline never writes to the store before the completion it depends
//! on has succeeded, so a failed model call leaves stored state untouched.
//!
//! Neither operation is idempotent. Running `execute_task` twice appends a
//! second pair of chat turns; running `generate_subtasks` twice creates a
//! second set of children. Callers that retry a whole operation get
//! duplicates.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{ChatMessage, Task, TaskCreationForm, TaskNode, TaskPatch, TaskStatus, build_hierarchy};
use crate::extract::{extract_list_items, split_list_item};
use crate::llm::{ByteStream, CompletionClient, CompletionError};
use crate::state::{StoreError, TaskStore};

/// Errors from pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Prompt used to execute a task
pub fn execute_prompt(task: &Task) -> String {
    format!("Task: {}", task.name)
}

/// Prompt used to break a task into steps
pub fn decompose_prompt(task: &Task) -> String {
    format!(
        "Task: {}\nDescription: {}\n\nWhat are the steps that needs to be taken?\n",
        task.name,
        task.description.as_deref().unwrap_or_default()
    )
}

/// Existing history plus the new user prompt and model reply
pub fn derive_history(existing: &[ChatMessage], prompt: &str, response: &str) -> Vec<ChatMessage> {
    let mut history = Vec::with_capacity(existing.len() + 2);
    history.extend_from_slice(existing);
    history.push(ChatMessage::user(prompt));
    history.push(ChatMessage::system(response));
    history
}

/// Creation forms for each numbered item of a model response
pub fn subtask_forms(parent: &Task, response: &str, history: &[ChatMessage]) -> Vec<TaskCreationForm> {
    extract_list_items(response)
        .iter()
        .map(|item| {
            let (name, description) = split_list_item(item);
            TaskCreationForm {
                name,
                parent_id: Some(parent.id.clone()),
                description: Some(description),
                chat_history: history.to_vec(),
            }
        })
        .collect()
}

/// Orchestrates completion calls and store writes for tasks
#[derive(Clone)]
pub struct TaskPipeline {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn TaskStore>,
}

impl TaskPipeline {
    pub fn new(client: Arc<dyn CompletionClient>, store: Arc<dyn TaskStore>) -> Self {
        Self { client, store }
    }

    /// All stored tasks as a forest
    pub async fn get_tasks(&self) -> Result<Vec<TaskNode>, PipelineError> {
        debug!("get_tasks: called");
        let flat = self.store.get_tasks().await?;
        Ok(build_hierarchy(flat))
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, PipelineError> {
        debug!(%id, "get_task: called");
        Ok(self.store.get_task(id).await?)
    }

    pub async fn create_task(&self, form: TaskCreationForm) -> Result<Task, PipelineError> {
        debug!(name = %form.name, parent_id = ?form.parent_id, "create_task: called");
        let task = self.store.create_task(form).await?;
        info!(id = %task.id, "create_task: created");
        Ok(task)
    }

    /// Run a task through the model and record the result
    ///
    /// Stores the response as `execution_result`, marks the task done and
    /// appends the prompt/response pair to the stored chat history, so a
    /// stale `task` never drops turns already recorded.
    pub async fn execute_task(&self, task: &Task) -> Result<Task, PipelineError> {
        debug!(id = %task.id, name = %task.name, "execute_task: called");
        let prompt = execute_prompt(task);
        let response = self.client.complete(&prompt).await?;

        let turns = [ChatMessage::user(&prompt), ChatMessage::system(&response)];
        let patch = TaskPatch::new(&task.id)
            .execution_result(response)
            .status(TaskStatus::Done)
            .append_history(turns);
        let updated = self.store.update_task(patch).await?;
        info!(id = %updated.id, "execute_task: done");
        Ok(updated)
    }

    /// Ask the model for steps and create one subtask per numbered item
    ///
    /// The parent's stored history is left as is; the derived history only
    /// seeds the children. A response without a numbered list creates
    /// nothing and is not an error.
    pub async fn generate_subtasks(&self, task: &Task) -> Result<Vec<Task>, PipelineError> {
        debug!(id = %task.id, name = %task.name, "generate_subtasks: called");
        let prompt = decompose_prompt(task);
        let response = self.client.complete(&prompt).await?;

        let history = derive_history(&task.chat_history, &prompt, &response);
        let forms = subtask_forms(task, &response, &history);
        if forms.is_empty() {
            debug!("generate_subtasks: no items, nothing to create");
            return Ok(Vec::new());
        }

        let created = self.store.add_many_tasks(forms).await?;
        info!(id = %task.id, count = created.len(), "generate_subtasks: created subtasks");
        Ok(created)
    }

    /// Open a streamed completion for a free-form prompt
    pub async fn chat(&self, prompt: &str) -> Result<ByteStream, PipelineError> {
        debug!(prompt_len = prompt.len(), "chat: called");
        Ok(self.client.stream_complete(prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatRole;
    use crate::llm::client::mock::MockCompletionClient;
    use crate::relay::relay_to_end;
    use crate::sse::encode_text_event;
    use crate::state::mock::MemoryTaskStore;

    fn setup(client: MockCompletionClient, tasks: Vec<Task>) -> (TaskPipeline, Arc<MockCompletionClient>, Arc<MemoryTaskStore>) {
        let client = Arc::new(client);
        let store = Arc::new(MemoryTaskStore::with_tasks(tasks));
        (TaskPipeline::new(client.clone(), store.clone()), client, store)
    }

    fn root() -> Task {
        Task::with_id("root", "Ship release").with_description("cut and publish")
    }

    #[test]
    fn test_prompts() {
        let task = root();
        assert_eq!(execute_prompt(&task), "Task: Ship release");
        let prompt = decompose_prompt(&task);
        assert!(prompt.starts_with("Task: Ship release\nDescription: cut and publish\n"));
        assert!(prompt.contains("What are the steps"));
    }

    #[tokio::test]
    async fn test_generate_subtasks_creates_named_children() {
        let (pipeline, client, store) = setup(
            MockCompletionClient::replying("1. Design: draft the plan\n2. Build: implement it"),
            vec![root()],
        );

        let created = pipeline.generate_subtasks(&root()).await.unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].name, "Design");
        assert_eq!(created[0].description.as_deref(), Some(" draft the plan"));
        assert_eq!(created[1].name, "Build");
        assert_eq!(created[1].description.as_deref(), Some(" implement it"));
        assert!(created.iter().all(|t| t.parent_id.as_deref() == Some("root")));
        assert_eq!(created[0].chat_history.len(), 2);
        assert_eq!(created[0].chat_history[1].role, ChatRole::System);

        assert_eq!(client.prompts(), vec![decompose_prompt(&root())]);
        assert_eq!(store.create_calls(), 1);
        // parent untouched
        assert_eq!(store.update_calls(), 0);
        assert!(store.snapshot()[0].chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_generate_subtasks_without_list_creates_nothing() {
        let (pipeline, _client, store) = setup(MockCompletionClient::replying("I cannot help with that."), vec![root()]);

        let created = pipeline.generate_subtasks(&root()).await.unwrap();
        assert!(created.is_empty());
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_task_records_result() {
        let mut task = root();
        task.chat_history.push(ChatMessage::user("earlier"));
        let (pipeline, _client, store) = setup(MockCompletionClient::replying("All shipped."), vec![task.clone()]);

        let updated = pipeline.execute_task(&task).await.unwrap();

        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.execution_result.as_deref(), Some("All shipped."));
        let contents: Vec<&str> = updated.chat_history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["earlier", "Task: Ship release", "All shipped."]);
        assert_eq!(store.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_execute_twice_with_same_task_keeps_every_turn() {
        let task = root();
        let (pipeline, _client, store) = setup(
            MockCompletionClient::new(vec![Ok("first".to_string()), Ok("second".to_string())]),
            vec![task.clone()],
        );

        pipeline.execute_task(&task).await.unwrap();
        let updated = pipeline.execute_task(&task).await.unwrap();

        let contents: Vec<&str> = updated.chat_history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Task: Ship release", "first", "Task: Ship release", "second"]);
        assert_eq!(store.snapshot()[0].chat_history.len(), 4);
        assert_eq!(updated.execution_result.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_execute_task_failure_writes_nothing() {
        let (pipeline, _client, store) = setup(MockCompletionClient::failing(503, "Service Unavailable"), vec![root()]);

        let err = pipeline.execute_task(&root()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Completion(CompletionError::ApiError { status: 503, .. })));
        assert_eq!(store.update_calls(), 0);
        assert_eq!(store.snapshot()[0].status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_generate_failure_writes_nothing() {
        let (pipeline, _client, store) = setup(MockCompletionClient::failing(500, "Internal Server Error"), vec![root()]);

        assert!(pipeline.generate_subtasks(&root()).await.is_err());
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_missing_task_is_store_error() {
        let (pipeline, _client, _store) = setup(MockCompletionClient::replying("ok"), vec![]);

        let err = pipeline.execute_task(&root()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_tasks_builds_forest() {
        let child = Task::with_id("child", "Child").with_parent("root");
        let (pipeline, _client, _store) = setup(MockCompletionClient::new(vec![]), vec![root(), child]);

        let forest = pipeline.get_tasks().await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].flatten(), vec!["root", "child"]);
    }

    #[tokio::test]
    async fn test_chat_streams_through_relay() {
        let client = MockCompletionClient::new(vec![])
            .with_chunks(vec![encode_text_event("Hi ").to_vec(), encode_text_event("there").to_vec()]);
        let (pipeline, _client, _store) = setup(client, vec![]);

        let stream = pipeline.chat("hello").await.unwrap();
        assert_eq!(relay_to_end(stream).await.unwrap(), "Hi there");
    }
}
