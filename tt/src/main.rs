//! tt - task tree CLI
//!
//! Entry point: parses arguments, sets up logging, and dispatches commands
//! onto the task pipeline.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, bail};
use tracing::{debug, info, warn};

use tasktree::cli::{Cli, Command, OutputFormat, get_log_path};
use tasktree::config::Config;
use tasktree::domain::{IdResolver, Task, TaskCreationForm, build_hierarchy, find_in_forest};
use tasktree::llm::create_client;
use tasktree::pipeline::TaskPipeline;
use tasktree::relay::{RelayState, StreamRelay, cancellation};
use tasktree::render::{render_detail, render_forest};
use tasktree::state::{StateManager, TaskStore};

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, "tasktree loaded config");

    let store_path = config.storage.resolved_path();
    let store = StateManager::spawn(&store_path)
        .context(format!("Failed to open task store at {}", store_path.display()))?;

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        None => cmd_list(&store, OutputFormat::Text).await,
        Some(Command::List { format }) => cmd_list(&store, format).await,
        Some(Command::Add {
            name,
            parent,
            description,
        }) => cmd_add(&store, name, parent, description).await,
        Some(Command::Show { id }) => cmd_show(&store, &id).await,
        Some(Command::Exec { id }) => cmd_exec(&config, &store, &id).await,
        Some(Command::Decompose { id }) => cmd_decompose(&config, &store, &id).await,
        Some(Command::Chat { prompt }) => cmd_chat(&config, &store, &prompt).await,
    };

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "main: store shutdown failed");
    }
    result
}

fn build_pipeline(config: &Config, store: &StateManager) -> Result<TaskPipeline> {
    config.validate()?;
    let client = create_client(&config.llm).context("Failed to create completion client")?;
    Ok(TaskPipeline::new(client, Arc::new(store.clone())))
}

/// Resolve a full or partial id against the stored tasks
async fn resolve_task(store: &StateManager, reference: &str) -> Result<Task> {
    debug!(%reference, "resolve_task: called");
    let tasks = store.get_tasks().await?;
    let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

    match IdResolver::new(&ids).resolve(reference) {
        Ok(Some(id)) => tasks
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| eyre::eyre!("Task {} disappeared", id)),
        Ok(None) => bail!("No task matches '{}'", reference),
        Err(candidates) => bail!("'{}' is ambiguous: {}", reference, candidates.join(", ")),
    }
}

async fn cmd_list(store: &StateManager, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_list: called");
    let forest = build_hierarchy(store.get_tasks().await?);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&forest)?),
        OutputFormat::Text if forest.is_empty() => println!("No tasks yet. Add one with `tt add <name>`."),
        OutputFormat::Text => print!("{}", render_forest(&forest)),
    }
    Ok(())
}

async fn cmd_add(
    store: &StateManager,
    name: String,
    parent: Option<String>,
    description: Option<String>,
) -> Result<()> {
    debug!(%name, ?parent, "cmd_add: called");
    let parent_id = match parent {
        Some(reference) => Some(resolve_task(store, &reference).await?.id),
        None => None,
    };

    let task = store
        .create_task(TaskCreationForm {
            name,
            parent_id,
            description,
            chat_history: Vec::new(),
        })
        .await?;
    println!("{} {}", "Created".green(), task.id);
    Ok(())
}

async fn cmd_show(store: &StateManager, reference: &str) -> Result<()> {
    debug!(%reference, "cmd_show: called");
    let task = resolve_task(store, reference).await?;
    let forest = build_hierarchy(store.get_tasks().await?);
    let node = find_in_forest(&forest, &task.id).ok_or_else(|| eyre::eyre!("Task {} not in tree", task.id))?;
    print!("{}", render_detail(node));
    Ok(())
}

async fn cmd_exec(config: &Config, store: &StateManager, reference: &str) -> Result<()> {
    debug!(%reference, "cmd_exec: called");
    let task = resolve_task(store, reference).await?;
    let pipeline = build_pipeline(config, store)?;

    println!("{} {}", "Executing".cyan(), task.name);
    let updated = pipeline.execute_task(&task).await?;
    println!("{}", updated.execution_result.unwrap_or_default());
    Ok(())
}

async fn cmd_decompose(config: &Config, store: &StateManager, reference: &str) -> Result<()> {
    debug!(%reference, "cmd_decompose: called");
    let task = resolve_task(store, reference).await?;
    let pipeline = build_pipeline(config, store)?;

    println!("{} {}", "Decomposing".cyan(), task.name);
    let created = pipeline.generate_subtasks(&task).await?;
    if created.is_empty() {
        println!("{}", "The model suggested no steps.".yellow());
        return Ok(());
    }
    for subtask in &created {
        println!("  {} {} {}", "+".green(), subtask.name, subtask.id.dimmed());
    }
    Ok(())
}

async fn cmd_chat(config: &Config, store: &StateManager, prompt: &str) -> Result<()> {
    debug!(prompt_len = prompt.len(), "cmd_chat: called");
    let pipeline = build_pipeline(config, store)?;
    let stream = pipeline.chat(prompt).await?;

    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let mut relay = StreamRelay::new();
    let mut rx = relay.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while rx.changed().await.is_ok() {
            let text = rx.borrow_and_update().clone();
            print!("{}", &text[printed..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        }
    });

    let outcome = relay.run(stream, signal).await;
    drop(relay);
    let _ = printer.await;
    println!();

    match outcome? {
        RelayState::Aborted => eprintln!("{}", "[stopped]".yellow()),
        state => debug!(?state, "cmd_chat: finished"),
    }
    Ok(())
}
