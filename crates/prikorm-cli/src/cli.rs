use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use prikorm_core::Reaction;

#[derive(Parser)]
#[command(name = "prikorm")]
#[command(about = "Offline-first feeding log with family sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record and review feedings
    #[command(subcommand)]
    Log(LogCommands),
    /// Override the scheduled plan text of a slot
    #[command(subcommand)]
    Plan(PlanCommands),
    /// Override the focus text of a day
    #[command(subcommand)]
    Focus(FocusCommands),
    /// Plan start and selected dates
    #[command(subcommand)]
    Dates(DateCommands),
    /// Manage the shared family code
    #[command(subcommand)]
    Family(FamilyCommands),
    /// Manage remote configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Synchronize with the family slot
    #[command(subcommand)]
    Sync(SyncCommands),
    /// Export a snapshot of every table as JSON
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Merge a previously exported snapshot into the local tables
    Import {
        /// Snapshot JSON file
        path: PathBuf,
    },
}

/// Slot of one feeding: plan day, calendar date, time of day.
#[derive(Args, Debug, Clone)]
pub struct SlotArgs {
    /// Plan day (starting at 1)
    pub day: u32,
    /// Time of day label, e.g. 07:00
    pub time: String,
    /// Calendar date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Toggle the done flag of a slot
    Done {
        #[command(flatten)]
        slot: SlotArgs,
        /// Plan text to remember with a new entry
        #[arg(long)]
        plan: Option<String>,
    },
    /// Set details of a slot
    Set {
        #[command(flatten)]
        slot: SlotArgs,
        /// Mark done (true) or not done (false)
        #[arg(long)]
        done: Option<bool>,
        /// Amount eaten, e.g. "40 g" (empty clears)
        #[arg(long)]
        amount: Option<String>,
        /// Observed reaction
        #[arg(long, value_enum)]
        reaction: Option<ReactionArg>,
        /// Free-text note (empty clears)
        #[arg(long)]
        note: Option<String>,
    },
    /// List entries
    List {
        /// Only this plan day
        #[arg(long)]
        day: Option<u32>,
        /// Only this calendar date
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry on this device
    Delete {
        #[command(flatten)]
        slot: SlotArgs,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Replace the plan text of a slot
    Set {
        day: u32,
        time: String,
        /// New plan text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Restore the default plan text of a slot
    Reset { day: u32, time: String },
    /// List plan overrides
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum FocusCommands {
    /// Replace the focus text of a day
    Set {
        day: u32,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Restore the default focus of a day
    Reset { day: u32 },
    /// List focus overrides
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum DateCommands {
    /// Set the first day of the plan
    SetStart {
        #[arg(required_unless_present = "clear")]
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },
    /// Set the date currently shown
    SetSelected {
        #[arg(required_unless_present = "clear")]
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },
    /// Show both dates
    Show,
}

#[derive(Subcommand)]
pub enum FamilyCommands {
    /// Generate a new family code and use it
    Create,
    /// Use an existing family code
    Join { code: String },
    /// Stop syncing (local data is kept)
    Leave,
    /// Show the current family code
    Show,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the remote configuration
    Init {
        /// Supabase project URL
        #[arg(long)]
        supabase_url: Option<String>,
        /// Supabase anon key
        #[arg(long)]
        supabase_anon_key: Option<String>,
        /// Table holding family snapshots
        #[arg(long)]
        table: Option<String>,
    },
    /// Show the effective remote configuration
    Show,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Send the local snapshot to the family slot
    Push,
    /// Merge the family slot into the local tables
    Pull,
    /// Show sync status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Keep pulling in the background until interrupted
    Watch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReactionArg {
    Ok,
    Rash,
    Tummy,
    Stool,
    Other,
    /// Clear the reaction
    None,
}

impl ReactionArg {
    pub const fn into_reaction(self) -> Option<Reaction> {
        match self {
            Self::Ok => Some(Reaction::Ok),
            Self::Rash => Some(Reaction::Rash),
            Self::Tummy => Some(Reaction::Tummy),
            Self::Stool => Some(Reaction::Stool),
            Self::Other => Some(Reaction::Other),
            Self::None => None,
        }
    }
}
