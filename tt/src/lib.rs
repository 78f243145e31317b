//! tasktree - hierarchical tasks driven by a language model
//!
//! Tasks are stored flat and viewed as a tree. A task can be executed (the
//! model's answer is recorded on it) or decomposed (the model's numbered
//! steps become subtasks). Chat completions stream back as server-sent
//! events and are relayed incrementally.
//!
//! # Modules
//!
//! - [`domain`] - Task records and the hierarchy builder
//! - [`extract`] - Numbered-list extraction from model output
//! - [`llm`] - Completion client trait and providers
//! - [`sse`] - Server-sent-event decoding and encoding
//! - [`relay`] - Incremental stream relay with cancellation
//! - [`state`] - Store adapter contract and the StateManager actor
//! - [`pipeline`] - Task execution and decomposition
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod relay;
pub mod render;
pub mod sse;
pub mod state;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use domain::{ChatMessage, ChatRole, Task, TaskCreationForm, TaskNode, TaskPatch, TaskStatus, build_hierarchy};
pub use extract::{extract_list_items, split_list_item};
pub use llm::{CompletionClient, CompletionError, create_client};
pub use pipeline::{PipelineError, TaskPipeline};
pub use relay::{CancelHandle, CancelSignal, RelayState, StreamRelay, cancellation};
pub use state::{StateManager, StoreError, TaskStore};
