//! CLI argument structures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Log food with confirmation before anything is written
#[derive(Parser)]
#[command(name = "fitpal")]
#[command(about = "fitpal - conversational food logging with human confirmation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// How confirmations are answered once a turn is running
#[derive(Args, Debug, Clone, Default)]
pub struct DecisionMode {
    /// Approve every confirmation without asking
    #[arg(short = 'y', long = "yes", conflicts_with = "detach")]
    pub auto_approve: bool,

    /// Print the pending confirmation and exit; answer later with `resume`
    #[arg(long)]
    pub detach: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a turn for one utterance's food items
    Log {
        /// Conversation the turn belongs to
        #[arg(long, default_value = "default")]
        conversation: String,

        /// Item as name:quantity[:unit], e.g. "chicken breast:200:g"
        #[arg(short = 'i', long = "item", value_name = "SPEC")]
        items: Vec<String>,

        /// JSON file with {"items": [...], "consumed_at": "..."}
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// When the food was eaten (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        consumed_at: Option<String>,

        /// Meal the items belong to, e.g. breakfast or lunch
        #[arg(long = "meal", value_name = "MEAL")]
        meal_type: Option<String>,

        #[command(flatten)]
        mode: DecisionMode,
    },

    /// Answer the pending confirmation of a suspended turn
    Resume {
        #[arg(long, default_value = "default")]
        conversation: String,

        /// Approve the pending record
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        /// Decline the pending record
        #[arg(long)]
        reject: bool,

        #[command(flatten)]
        mode: DecisionMode,
    },

    /// Re-enter an unfinished turn, e.g. after an oracle outage
    Continue {
        #[arg(long, default_value = "default")]
        conversation: String,

        #[command(flatten)]
        mode: DecisionMode,
    },

    /// List unfinished turns, or show the question one of them is waiting on
    Pending {
        /// Print the pending confirmation request of this conversation
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Drop an unfinished turn without recording a decision
    Discard {
        #[arg(long, default_value = "default")]
        conversation: String,
    },

    /// Show logged totals for a day or an inclusive date range
    Stats {
        /// Single day (YYYY-MM-DD); defaults to today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        date: Option<String>,

        /// Range start (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Range end (YYYY-MM-DD), inclusive
        #[arg(long, requires = "from")]
        to: Option<String>,
    },

    /// Search the reference table by name
    Search {
        query: String,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Load reference foods from a nutrient CSV export
    Ingest {
        csv: PathBuf,
    },
}
