//! # ucr-algo: Unit-Commitment Rounding Heuristics
//!
//! Turns the fractional "equivalent committed units" trajectory of a relaxed
//! dispatch into integer unit counts, writes them back as bounds and
//! re-solves.
//!
//! ## Heuristics
//!
//! | Mode | Rounding | Final solve |
//! |------|----------|-------------|
//! | [`HeuristicMode::Accurate`] | ceiling of the guide, min up/down corrected | [`CommitmentMode::Integer`] |
//! | [`HeuristicMode::Fast`] | slot maximum of the ceiling | [`CommitmentMode::MinGeneration`] |
//! | [`HeuristicMode::ReserveAware`] | hour-level floor/ceiling priced with reserves, smoothed, min up/down corrected | [`CommitmentMode::Integer`] |
//!
//! ### Reserve-aware rounding
//!
//! Each fractional hour is priced twice, once per candidate unit count:
//!
//! - [`reserve::allocation`]: per-hour LP splitting energy and reserves
//!   between committed and offline units
//! - [`reserve::offline`]: integer offline-unit counts ([`OfflinePolicy`])
//! - [`reserve::decision`]: floor/ceiling comparison ([`RoundingPolicy`])
//! - [`reserve::smoothing`]: one-hour bumps and dips revisited with the
//!   startup costs they imply
//!
//! ## Solver backends
//!
//! All programs go through [`solver::LinearProgram`] over `good_lp`. The
//! backend is chosen at build time (`solver-microlp` by default,
//! `solver-highs` optional) and at run time through [`SolverParameters`].
//!
//! ## Example
//!
//! ```ignore
//! use ucr_algo::{resolve_block, HeuristicConfig, HeuristicMode, SolverParameters};
//! use ucr_core::TimeBlock;
//!
//! let config = HeuristicConfig::default().with_mode(HeuristicMode::Fast);
//! let block = TimeBlock::new(0, 0..168);
//! let report = resolve_block(&network, &mut store, &block, 1, &config, &SolverParameters::default())?;
//! println!("{}: {:?}", report.final_status, report.final_objective);
//! ```

pub mod cluster;
pub mod dispatch;
pub mod error;
pub mod heuristic;
pub mod orchestrator;
pub mod reserve;
pub mod rounding;
pub mod solver;

pub use cluster::{ClusterHourContext, ClusterView, ReserveHourParams, ReserveView};
pub use dispatch::{build_problem, CommitmentMode, DispatchProblem, OutputValues, SolvedDispatch};
pub use error::{HeuristicError, HeuristicResult};
pub use heuristic::{correct_durations, fast_schedule};
pub use orchestrator::{
    resolve_block, resolve_study, round_cluster, update_heuristic, BlockReport, ClusterSchedule,
    HeuristicConfig, HeuristicMode, ScheduleWorkingSet, StudyReport,
};
pub use reserve::{allocate_offline, decide_block, smooth, OfflinePolicy, RoundingDecision};
pub use rounding::RoundingPolicy;
pub use solver::{LinearProgram, SolveError, SolveStatus, SolverBackend, SolverParameters};
