use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::filter::StatusFilter;
use crate::task::Priority;

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

/// How a command names a task: the 1-based number printed by `list`, a
/// full id, or a unique prefix of the id (the `Id` column shows eight hex
/// digits). All-digit input is always a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    Position(usize),
    Id(Uuid),
    IdPrefix(String),
}

const MIN_ID_PREFIX: usize = 4;

impl std::str::FromStr for TaskRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(number) = s.parse::<usize>() {
            if number == 0 {
                return Err(anyhow!("task numbers start at 1"));
            }
            return Ok(Self::Position(number - 1));
        }
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(Self::Id(id));
        }
        let prefix: String = s.chars().filter(|c| *c != '-').collect();
        if prefix.len() >= MIN_ID_PREFIX && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Self::IdPrefix(prefix.to_ascii_lowercase()));
        }
        Err(anyhow!("expected a task number or id, got: {s}"))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: a small persistent to-do list",
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

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long)]
        due: Option<String>,

        #[arg(long, short = 'p', value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>()))]
        priority: Option<Priority>,
    },
    /// Show tasks
    List(ListArgs),
    /// Flip a task between active and completed
    #[command(visible_alias = "done")]
    Toggle {
        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskRef>()))]
        task: TaskRef,
    },
    /// Delete a task
    Delete {
        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskRef>()))]
        task: TaskRef,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show or toggle the display theme
    Theme {
        #[arg(value_enum, default_value_t = ThemeAction::Show)]
        action: ThemeAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long, short = 's', value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<StatusFilter>()))]
    pub status: Option<StatusFilter>,

    #[arg(long, short = 'f')]
    pub search: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Show,
    Toggle,
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Global options whose value is the following argument.
const VALUE_FLAGS: &[&str] = &["--rc", "--config", "--data"];

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it. Only arguments before the subcommand
/// are considered, and `--` ends the search, so task text is never eaten.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    while let Some(arg) = iter.next() {
        let s = arg.to_string_lossy().into_owned();

        if let Some((k, v)) = split_rc_override(&s) {
            debug!(key = %k, value = %v, "captured positional rc override");
            overrides.push((k, v));
            continue;
        }

        let takes_value = VALUE_FLAGS.contains(&s.as_str());
        let is_flag = s.starts_with('-') && s != "--";
        cleaned.push(arg);

        if takes_value {
            if let Some(value) = iter.next() {
                cleaned.push(value);
            }
        } else if !is_flag {
            // subcommand or `--`: everything after it belongs to clap
            break;
        }
    }
    cleaned.extend(iter);

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

fn split_rc_override(arg: &str) -> Option<(String, String)> {
    let rest = arg.strip_prefix("rc.")?;
    let (k, v) = rest.split_once('=').or_else(|| rest.split_once(':'))?;
    Some((format!("rc.{k}"), v.to_string()))
}
