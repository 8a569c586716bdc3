use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use ucr_algo::{resolve_study, HeuristicMode, OfflinePolicy, RoundingPolicy, SolverBackend};
use ucr_cli::Study;

use crate::commands::util::configure_threads;

/// Command-line overrides of the study settings.
pub struct RunOptions<'a> {
    pub study: &'a Path,
    pub mode: Option<HeuristicMode>,
    pub rounding: Option<RoundingPolicy>,
    pub offline: Option<OfflinePolicy>,
    pub no_smoothing: bool,
    pub solver: Option<SolverBackend>,
    pub threads: &'a str,
    pub out: Option<&'a PathBuf>,
}

pub fn handle(options: RunOptions<'_>) -> Result<()> {
    match configure_threads(options.threads) {
        Some(threads) => debug!(threads, "thread pool configured"),
        None if !options.threads.eq_ignore_ascii_case("auto") => {
            warn!("--threads has no effect without the `parallel` feature")
        }
        None => {}
    }

    let mut study = Study::load(options.study)?;
    if let Some(mode) = options.mode {
        study.heuristic.mode = mode;
    }
    if let Some(rounding) = options.rounding {
        study.heuristic.rounding_policy = rounding;
    }
    if let Some(offline) = options.offline {
        study.heuristic.offline_policy = offline;
    }
    if options.no_smoothing {
        study.heuristic.smoothing = false;
    }
    if let Some(backend) = options.solver {
        study.solver.backend = backend;
    }

    let diag = study.validate();
    if diag.has_errors() {
        eprint!("{diag}");
        bail!("{} is not a valid study ({})", options.study.display(), diag.summary());
    }

    info!(
        horizon = study.horizon,
        block_length = study.block_length,
        scenarios = study.scenario_count,
        mode = %study.heuristic.mode,
        "running study"
    );
    let start = Instant::now();
    let mut store = study.store();
    let report = resolve_study(
        &study.network,
        &mut store,
        study.horizon,
        study.block_length,
        study.scenario_count,
        &study.heuristic,
        &study.solver,
    )
    .context("resolving study")?;

    let infeasible = report.blocks.iter().filter(|b| !b.is_feasible()).count();
    if infeasible > 0 {
        warn!(blocks = infeasible, "some blocks have no feasible final dispatch");
    }
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        total_objective = ?report.total_objective,
        "study done"
    );

    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    match options.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
