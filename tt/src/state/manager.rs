//! StateManager - actor that owns the task Store
//!
//! Processes commands via channels for thread-safe access to persistent
//! state. Each command runs to completion before the next one starts, so a
//! read-modify-write such as `UpdateTask` is atomic per call.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{Filter, IndexValue, Store, Task, TaskCreationForm, TaskPatch, TaskStatus};

use super::messages::{StateCommand, StoreError, StoreResponse};
use super::traits::TaskStore;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        Self::spawn_with(store)
    }

    /// Spawn over a throwaway in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Self::spawn_with(Store::open_in_memory()?)
    }

    fn spawn_with(mut store: Store) -> eyre::Result<Self> {
        let task_count = store.rebuild_indexes::<Task>()?;
        info!(task_count, "Rebuilt indexes for Task records");

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));

        info!("StateManager spawned");
        Ok(Self { tx })
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StoreResponse<T>>) -> StateCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// List tasks with optional filters, in insertion order
    pub async fn list_tasks(
        &self,
        parent_filter: Option<String>,
        status_filter: Option<TaskStatus>,
    ) -> StoreResponse<Vec<Task>> {
        debug!(?parent_filter, ?status_filter, "list_tasks: called");
        self.request(|reply| StateCommand::ListTasks {
            parent_filter,
            status_filter,
            reply,
        })
        .await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelError)
    }
}

#[async_trait]
impl TaskStore for StateManager {
    async fn get_tasks(&self) -> StoreResponse<Vec<Task>> {
        debug!("get_tasks: called");
        self.list_tasks(None, None).await
    }

    async fn get_task(&self, id: &str) -> StoreResponse<Option<Task>> {
        debug!(%id, "get_task: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetTask { id, reply }).await
    }

    async fn create_task(&self, form: TaskCreationForm) -> StoreResponse<Task> {
        debug!(name = %form.name, "create_task: called");
        self.request(|reply| StateCommand::CreateTask { form, reply }).await
    }

    async fn add_many_tasks(&self, forms: Vec<TaskCreationForm>) -> StoreResponse<Vec<Task>> {
        debug!(count = forms.len(), "add_many_tasks: called");
        self.request(|reply| StateCommand::CreateTasks { forms, reply }).await
    }

    async fn update_task(&self, patch: TaskPatch) -> StoreResponse<Task> {
        debug!(id = %patch.id, "update_task: called");
        self.request(|reply| StateCommand::UpdateTask { patch, reply }).await
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreateTask { form, reply } => {
                debug!(name = %form.name, "actor_loop: CreateTask command");
                let task = Task::from_form(form);
                let result = store.create(task.clone()).map(|_| task).map_err(StoreError::from);
                let _ = reply.send(result);
            }

            StateCommand::CreateTasks { forms, reply } => {
                debug!(count = forms.len(), "actor_loop: CreateTasks command");
                let tasks: Vec<Task> = forms.into_iter().map(Task::from_form).collect();
                let result = store
                    .create_many(tasks.clone())
                    .map(|_| tasks)
                    .map_err(StoreError::from);
                let _ = reply.send(result);
            }

            StateCommand::GetTask { id, reply } => {
                debug!(%id, "actor_loop: GetTask command");
                let result: StoreResponse<Option<Task>> = store.get(&id).map_err(StoreError::from);
                let _ = reply.send(result);
            }

            StateCommand::UpdateTask { patch, reply } => {
                debug!(id = %patch.id, "actor_loop: UpdateTask command");
                let _ = reply.send(apply_patch(&mut store, patch));
            }

            StateCommand::ListTasks {
                parent_filter,
                status_filter,
                reply,
            } => {
                debug!(?parent_filter, ?status_filter, "actor_loop: ListTasks command");
                let mut filters = Vec::new();
                if let Some(parent) = parent_filter {
                    debug!(%parent, "actor_loop: ListTasks adding parent filter");
                    filters.push(Filter::eq("parent", IndexValue::String(parent)));
                }
                if let Some(status) = status_filter {
                    debug!(%status, "actor_loop: ListTasks adding status filter");
                    filters.push(Filter::eq("status", IndexValue::String(status.to_string())));
                }

                let result: StoreResponse<Vec<Task>> = store.list(&filters).map_err(StoreError::from);
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

fn apply_patch(store: &mut Store, patch: TaskPatch) -> StoreResponse<Task> {
    let mut task: Task = store.get(&patch.id)?.ok_or_else(|| StoreError::NotFound(patch.id.clone()))?;
    patch.apply(&mut task);
    store.update(task.clone())?;
    Ok(task)
}
