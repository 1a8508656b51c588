//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use waypoint_prebuilt::GraphKind;

#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(about = "Waypoint - checkpointed, interruptible LLM workflows", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Extra config file, applied over ~/.waypoint and ./.waypoint
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Graph and thread a command operates on
#[derive(Args, Debug, Clone)]
pub struct ThreadArgs {
    /// Graph: agent, essay or trip
    #[arg(short, long, default_value = "agent", value_parser = parse_graph)]
    pub graph: GraphKind,

    /// Thread id
    #[arg(short, long)]
    pub thread: String,

    /// Run straight through without approval pauses
    #[arg(long)]
    pub no_interrupts: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a thread or continue it with new input
    Run {
        #[command(flatten)]
        target: ThreadArgs,

        /// User message (agent) or task (essay, trip)
        #[arg(short, long)]
        input: Option<String>,

        /// Revision budget for essay and trip threads (at least 1)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        max_revisions: Option<i64>,
    },

    /// Approve or reject the pending node
    Resume {
        #[command(flatten)]
        target: ThreadArgs,

        /// Reject instead of approving
        #[arg(long)]
        reject: bool,

        /// Replacement tool arguments as a JSON object
        #[arg(long, conflicts_with = "reject")]
        args: Option<String>,
    },

    /// Branch from an earlier checkpoint and continue
    Rewind {
        #[command(flatten)]
        target: ThreadArgs,

        /// Checkpoint id (see `history`)
        #[arg(short, long)]
        checkpoint: String,

        /// New input applied at the checkpoint
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Edit one state field
    Update {
        #[command(flatten)]
        target: ThreadArgs,

        #[arg(long)]
        field: String,

        /// JSON value; anything that is not valid JSON is taken as a string
        #[arg(long)]
        value: String,

        /// Route as if this node had produced the edit
        #[arg(long)]
        as_node: Option<String>,
    },

    /// Show the latest state
    State {
        #[command(flatten)]
        target: ThreadArgs,
    },

    /// List checkpoints, most recent first
    History {
        #[command(flatten)]
        target: ThreadArgs,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Dump every checkpoint with its state
    Snapshots {
        #[command(flatten)]
        target: ThreadArgs,

        /// Truncate values to this many characters
        #[arg(long, default_value_t = 80)]
        truncate: usize,
    },

    /// Show schema fields with their current values
    Fields {
        #[command(flatten)]
        target: ThreadArgs,
    },

    /// Show or edit a thread's prompts
    Prompts {
        #[arg(short, long, default_value = "essay", value_parser = parse_graph)]
        graph: GraphKind,

        #[arg(short, long)]
        thread: Option<String>,

        /// Prompt key to replace (with --text)
        #[arg(long, requires = "text", conflicts_with = "reset")]
        set: Option<String>,

        #[arg(long)]
        text: Option<String>,

        /// Prompt key to restore to its default
        #[arg(long)]
        reset: Option<String>,
    },

    /// Describe the available graphs
    Graphs {
        #[arg(short, long, value_parser = parse_graph)]
        graph: Option<GraphKind>,
    },
}

fn parse_graph(raw: &str) -> Result<GraphKind, String> {
    raw.parse().map_err(|e: waypoint_prebuilt::PrebuiltError| e.to_string())
}
