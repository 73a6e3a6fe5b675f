use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::FilterMode;

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
    name = "fb",
    version,
    about = "focusboard: keyboard-driven tasks with a Pomodoro timer",
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
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// Config file to read instead of ~/.focusboardrc.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Task service base URL.
    #[arg(long = "api", global = true)]
    pub api: Option<String>,

    /// Use demo data without contacting the service.
    #[arg(long = "offline", global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks in the current view.
    #[command(visible_alias = "ls")]
    List {
        #[arg(long, default_value = "all")]
        filter: FilterMode,
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Task to mark as selected.
        #[arg(long)]
        select: Option<String>,
    },
    /// Show one task with its steps.
    Show { id: String },
    /// Create a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        #[arg(short = 's', long = "step")]
        steps: Vec<String>,
        #[arg(short = 'p', long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Change fields of a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// Replaces the tag list.
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        #[arg(short = 'p', long)]
        priority: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Toggle completion.
    Done { id: String },
    /// Toggle one sub-step by position.
    Step { id: String, index: usize },
    /// Delete a task.
    #[command(visible_alias = "delete")]
    Rm { id: String },
    /// Server-side text search.
    Search { query: String },
    /// Tasks carrying a tag.
    Tag { tag: String },
    /// Tasks with a priority.
    Priority { priority: String },
    /// Completed tasks.
    Completed,
    /// Pending tasks.
    Pending,
    /// Run a Pomodoro session on a task. Ctrl-C stops it.
    Focus {
        id: String,
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Replay key chords (`j`, `ctrl+k`, `esc`, `input:esc`) and print the
    /// resulting state.
    Keys {
        #[arg(required = true, allow_hyphen_values = true)]
        chords: Vec<String>,
        #[arg(long)]
        select: Option<String>,
    },
    /// List command palette entries, or run one.
    Palette {
        query: Option<String>,
        #[arg(long)]
        run: Option<String>,
    },
    /// Completion and focus statistics.
    Stats,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
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
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
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
