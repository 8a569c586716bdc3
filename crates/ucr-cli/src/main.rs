use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use ucr_cli::{Cli, Commands};

mod commands;

use commands::run::RunOptions;

fn init_tracing(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let result = match &cli.command {
        Commands::Run {
            study,
            mode,
            rounding,
            offline,
            no_smoothing,
            solver,
            threads,
            out,
        } => commands::run::handle(RunOptions {
            study,
            mode: *mode,
            rounding: *rounding,
            offline: *offline,
            no_smoothing: *no_smoothing,
            solver: *solver,
            threads,
            out: out.as_ref(),
        }),
        Commands::Validate { study } => commands::validate::handle(study),
    };

    if let Err(err) = result {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
