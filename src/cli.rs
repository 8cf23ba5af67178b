use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clawguard",
    version,
    about = "Security scanner for AI agent skill packages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a skill directory and print a report
    Scan {
        /// Path to the skill directory
        path: PathBuf,

        /// Disable the LLM-backed semantic analyzer
        #[arg(long)]
        no_llm: bool,

        /// Emit machine-readable JSON instead of formatted text
        #[arg(long)]
        json: bool,

        /// Write the report to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print only the recommendation and score
        #[arg(long, short)]
        quiet: bool,

        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List every loaded rule with its category and severity
    ListRules {
        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
