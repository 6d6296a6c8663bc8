use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "qasearch",
    about = "Hybrid vector and keyword retrieval over Q&A records"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a snapshot from a Q&A corpus with precomputed embeddings
    Build(BuildArgs),
    /// Answer a question against the current snapshot
    Query(QueryArgs),
    /// Show system status and statistics
    Status(StatusArgs),
    /// Manage stored ranking settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Build --

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// JSON array of Q&A records, each carrying an `embedding`
    #[arg(long)]
    pub corpus: PathBuf,

    /// Keyword vocabulary file, one term per line (default: built-in list)
    #[arg(long)]
    pub vocabulary: Option<PathBuf>,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The question to answer
    pub query: String,

    /// JSON array holding the precomputed query embedding
    #[arg(long)]
    pub embedding: PathBuf,

    /// Number of results to return (default: stored top_k)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Minimum similarity for vector hits (default: stored threshold)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show every setting with its effective value
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting in config.redb
    Set {
        /// Setting name (e.g. top_k, threshold, keyword_bonus)
        key: String,
        /// New value
        value: String,
    },
    /// Clear a stored setting (revert to default)
    Clear {
        /// Setting name
        key: String,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "qasearch",
            &mut std::io::stdout(),
        );
    }
}
