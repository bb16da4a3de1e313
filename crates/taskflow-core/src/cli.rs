use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use taskflow_shared::{Category, Priority, TaskId, View};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::{CategoryFilter, PriorityFilter};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: terminal client for the TaskFlow task service and assistant",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks for a view or a category, optionally narrowed by priority.
    List(ListArgs),
    /// Create a task.
    Add(AddArgs),
    /// Change fields of an existing task.
    Edit(EditArgs),
    /// Show every field of one task.
    Show { id: TaskId },
    /// Toggle completion of a task.
    Done { id: TaskId },
    Delete { id: TaskId },
    /// Completion progress and per-category counts.
    Stats,
    /// Ask the assistant; without a message, start a conversation.
    Chat { message: Vec<String> },
    /// Interactive session that keeps the selected filters between commands.
    Shell,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub view: Option<View>,

    #[arg(long, conflicts_with = "view")]
    pub category: Option<CategoryFilter>,

    #[arg(long)]
    pub priority: Option<PriorityFilter>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true)]
    pub title: Vec<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'c')]
    pub category: Option<Category>,

    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    /// `YYYY-MM-DDTHH:MM`
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: TaskId,

    #[arg(long, short = 't')]
    pub title: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'c')]
    pub category: Option<Category>,

    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long, conflicts_with = "due")]
    pub clear_due: bool,
}

/// One line typed at the `shell` prompt.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    no_binary_name = true,
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShellCommand {
    /// Select a view and clear the category.
    View { view: View },
    /// Select a category (or `all`) and clear the view.
    Category { category: CategoryFilter },
    /// Narrow by priority, or `all`.
    Priority { priority: PriorityFilter },
    /// Refetch and print the current list.
    #[command(alias = "ls")]
    List,
    Add(AddArgs),
    Edit(EditArgs),
    Show { id: TaskId },
    Done { id: TaskId },
    #[command(alias = "rm")]
    Delete { id: TaskId },
    Stats,
    Chat { message: Vec<String> },
    Help,
    #[command(alias = "exit")]
    Quit,
}

impl ShellLine {
    pub fn parse_line(line: &str) -> anyhow::Result<Option<Self>> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(None);
        }
        let parsed = Self::try_parse_from(words).map_err(|err| anyhow!(err.render().to_string()))?;
        Ok(Some(parsed))
    }
}

/// Splits a shell line on whitespace, honoring single and double quotes.
pub fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        bail!("unterminated quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "off"
    } else if quiet == 1 {
        "error"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
