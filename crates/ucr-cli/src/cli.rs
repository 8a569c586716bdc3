use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use ucr_algo::{HeuristicMode, OfflinePolicy, RoundingPolicy, SolverBackend};

#[derive(Parser, Debug)]
#[command(name = "ucr", author, version, about = "Unit-commitment rounding studies", long_about = None)]
pub struct Cli {
    /// Set the logging level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve every block of a study and print the JSON report
    Run {
        /// Study file (TOML or JSON)
        #[arg(long)]
        study: PathBuf,
        /// Heuristic mode: accurate, fast or reserve-aware
        #[arg(long)]
        mode: Option<HeuristicMode>,
        /// Floor/ceiling rule: gain, sans or perte
        #[arg(long)]
        rounding: Option<RoundingPolicy>,
        /// Offline-unit policy: quantity-greedy, cost-greedy,
        /// cost-difference-greedy, failure-cost-greedy or exact
        #[arg(long)]
        offline: Option<OfflinePolicy>,
        /// Disable the local extrema correction
        #[arg(long)]
        no_smoothing: bool,
        /// LP/MILP backend: microlp or highs
        #[arg(long)]
        solver: Option<SolverBackend>,
        /// Worker threads for per-hour evaluation ("auto" for all cores).
        /// Ignored unless built with the `parallel` feature
        #[arg(long, default_value = "auto")]
        threads: String,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check a study file without solving
    Validate {
        /// Study file (TOML or JSON)
        #[arg(long)]
        study: PathBuf,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
