use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::booking::BookingStatus;

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
    name = "futsal",
    version,
    about = "Futsal court booking desk: availability, calendar and approvals",
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

    #[arg(long = "futsalrc", global = true)]
    pub futsalrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Hourly availability for one day.
    Slots {
        /// `today`, `tomorrow`, `yesterday`, a weekday name or `YYYY-MM-DD`.
        #[arg(default_value = "today")]
        date: String,
    },
    /// Month grid with booking markers.
    Month {
        /// `this`, `next`, `prev`, `YYYY-MM` or a month name.
        #[arg(default_value = "this")]
        month: String,
        /// Day to highlight as the selection.
        #[arg(long)]
        select: Option<String>,
        /// Months to move from the chosen month.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i64,
    },
    /// Slot-by-day table for one week.
    Week {
        #[arg(default_value = "today")]
        date: String,
        /// Weeks to move from the chosen week.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i64,
    },
    /// Every booking of one day, slot by slot.
    Day {
        #[arg(default_value = "today")]
        date: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i64,
    },
    /// Approval queue.
    Pending {
        /// Matches name, email or phone.
        #[arg(long)]
        search: Option<String>,
        /// `pending`, `approved`, `rejected` or `all`.
        #[arg(long, default_value = "pending")]
        status: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Request a slot.
    Book {
        date: String,
        /// `HH:00`, `H:00 AM` or a full slot label.
        slot: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        notes: Option<String>,
        /// Counter booking; email and phone become optional.
        #[arg(long)]
        walk_in: bool,
        #[arg(long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<BookingStatus>()))]
        status: Option<BookingStatus>,
    },
    Approve {
        id: String,
    },
    Reject {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Status counts, optionally for one day.
    Summary {
        #[arg(long)]
        date: Option<String>,
    },
    /// Merge a booking API response (JSON) into the local feed.
    Import {
        /// File to read; `-` reads stdin.
        path: PathBuf,
    },
    /// Show the effective configuration.
    Config,
    /// Facility settings.
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    Show,
    SetHours { opening: String, closing: String },
    SetName { name: String },
    SetAddress { address: String },
    AddFacility { name: String },
    RemoveFacility { position: usize },
    AddRule { rule: String },
    RemoveRule { position: usize },
}

impl Default for Command {
    fn default() -> Self {
        Command::Month {
            month: "this".to_string(),
            select: None,
            shift: 0,
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Slots { .. } => "slots",
            Command::Month { .. } => "month",
            Command::Week { .. } => "week",
            Command::Day { .. } => "day",
            Command::Pending { .. } => "pending",
            Command::Book { .. } => "book",
            Command::Approve { .. } => "approve",
            Command::Reject { .. } => "reject",
            Command::Delete { .. } => "delete",
            Command::Summary { .. } => "summary",
            Command::Import { .. } => "import",
            Command::Config => "config",
            Command::Settings { .. } => "settings",
        }
    }
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

/// Pulls `rc.KEY=VALUE` and `rc.KEY:VALUE` tokens out of the argument list
/// so they can sit anywhere on the command line.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
