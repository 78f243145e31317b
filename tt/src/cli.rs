//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// tasktree - hierarchical tasks executed and decomposed by a language model
#[derive(Parser)]
#[command(
    name = "tt",
    about = "Manage a task tree and delegate tasks to a language model",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the task tree
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a task
    Add {
        /// Task name
        name: String,

        /// Parent task ID (or partial match)
        #[arg(short, long)]
        parent: Option<String>,

        /// Task description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show one task with its subtasks and chat history
    Show {
        /// Task ID (or partial match)
        id: String,
    },

    /// Execute a task with the model and record the result
    Exec {
        /// Task ID (or partial match)
        id: String,
    },

    /// Break a task into subtasks suggested by the model
    Decompose {
        /// Task ID (or partial match)
        id: String,
    },

    /// Stream a completion for a free-form prompt (Ctrl-C stops generating)
    Chat {
        /// Prompt text
        prompt: String,
    },
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasktree")
        .join("logs")
        .join("tasktree.log")
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_parent() {
        let cli = Cli::try_parse_from(["tt", "add", "Write docs", "--parent", "abc", "-d", "user guide"]).unwrap();
        match cli.command {
            Some(Command::Add {
                name,
                parent,
                description,
            }) => {
                assert_eq!(name, "Write docs");
                assert_eq!(parent.as_deref(), Some("abc"));
                assert_eq!(description.as_deref(), Some("user guide"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tt", "list", "--format", "json", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Some(Command::List {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
