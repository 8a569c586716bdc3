//! Block resolution: relaxed solve, per-cluster rounding, write-back and
//! final solve.
//!
//! ```text
//! relaxed solve ──► guides + targets ──► ScheduleWorkingSet
//!                                            │ round_cluster (per cluster, scenario)
//!                                            ▼
//!                       store ◄── update_heuristic (write-back)
//!                         │
//!                         ▼
//!                    final solve (Integer or MinGeneration)
//! ```
//!
//! The store is only touched between the two solves. An infeasible final
//! solve is reported in the [`BlockReport`], not raised: per-cluster
//! rounding ignores constraints that couple clusters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use ucr_core::{
    params, pre_round, FractionalGuide, IntegerSchedule, Network, ParameterStore, TimeBlock,
    UcrError, UcrResult,
};

use crate::cluster::ClusterView;
use crate::dispatch::{build_problem, vars, CommitmentMode, OutputValues};
use crate::error::{HeuristicError, HeuristicResult};
use crate::heuristic::{correct_durations, fast_schedule};
use crate::reserve::{decide_block, smooth, ClusterTargets, OfflinePolicy, RoundingDecision};
use crate::rounding::{ceil_all, RoundingPolicy};
use crate::solver::{SolveStatus, SolverParameters};

/// Which heuristic turns the relaxed guide into an integer schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicMode {
    /// Rounded-up guide, corrected for minimum up/down times
    #[default]
    Accurate,
    /// Slot-based floor on generation
    Fast,
    /// Hour-level floor/ceiling decisions priced with reserves, smoothed,
    /// then corrected for minimum up/down times
    ReserveAware,
}

impl HeuristicMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeuristicMode::Accurate => "accurate",
            HeuristicMode::Fast => "fast",
            HeuristicMode::ReserveAware => "reserve-aware",
        }
    }

    /// Commitment representation of the final solve.
    pub fn final_commitment(&self) -> CommitmentMode {
        match self {
            HeuristicMode::Fast => CommitmentMode::MinGeneration,
            HeuristicMode::Accurate | HeuristicMode::ReserveAware => CommitmentMode::Integer,
        }
    }
}

impl std::fmt::Display for HeuristicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HeuristicMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accurate" => Ok(HeuristicMode::Accurate),
            "fast" => Ok(HeuristicMode::Fast),
            "reserve-aware" | "reserve_aware" | "reserves" => Ok(HeuristicMode::ReserveAware),
            other => Err(format!(
                "unknown heuristic mode '{other}' (expected accurate, fast or reserve-aware)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HeuristicConfig {
    pub mode: HeuristicMode,
    pub rounding_policy: RoundingPolicy,
    pub offline_policy: OfflinePolicy,
    /// Local extrema correction after hour-level decisions (reserve-aware
    /// mode only)
    pub smoothing: bool,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            mode: HeuristicMode::default(),
            rounding_policy: RoundingPolicy::default(),
            offline_policy: OfflinePolicy::default(),
            smoothing: true,
        }
    }
}

impl HeuristicConfig {
    pub fn with_mode(mut self, mode: HeuristicMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Heuristic state of one cluster and scenario.
#[derive(Debug, Clone, Default)]
pub struct WorkingEntry {
    pub guide: FractionalGuide,
    pub targets: ClusterTargets,
    pub decisions: Vec<RoundingDecision>,
    pub schedule: Option<IntegerSchedule>,
}

/// Guides, decisions and schedules of every cluster of a block, keyed by
/// `(cluster, scenario)`.
#[derive(Debug, Clone, Default)]
pub struct ScheduleWorkingSet {
    entries: BTreeMap<(String, usize), WorkingEntry>,
}

impl ScheduleWorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(
        &mut self,
        cluster: &str,
        scenario: usize,
        guide: FractionalGuide,
        targets: ClusterTargets,
    ) {
        self.entries.insert(
            (cluster.to_string(), scenario),
            WorkingEntry {
                guide,
                targets,
                ..WorkingEntry::default()
            },
        );
    }

    pub fn entry(&self, cluster: &str, scenario: usize) -> Option<&WorkingEntry> {
        self.entries.get(&(cluster.to_string(), scenario))
    }

    /// Round one seeded entry and keep the result.
    pub fn round(
        &mut self,
        view: &ClusterView,
        scenario: usize,
        config: &HeuristicConfig,
        params: &SolverParameters,
    ) -> HeuristicResult<&IntegerSchedule> {
        let entry = self
            .entries
            .get_mut(&(view.id.clone(), scenario))
            .ok_or_else(|| {
                UcrError::Validation(format!("no guide for '{}' in scenario {scenario}", view.id))
            })?;
        let (schedule, decisions) = round_cluster(view, &entry.guide, &entry.targets, config, params)?;
        entry.decisions = decisions;
        let schedule: &IntegerSchedule = entry.schedule.insert(schedule);
        Ok(schedule)
    }

    /// Write every schedule to the store.
    pub fn write_back(
        &self,
        network: &Network,
        store: &mut ParameterStore,
        block: &TimeBlock,
        mode: HeuristicMode,
    ) -> UcrResult<()> {
        for ((cluster, scenario), entry) in &self.entries {
            let Some(schedule) = &entry.schedule else {
                continue;
            };
            let view = ClusterView::load(network, store, cluster, block, *scenario)?;
            update_heuristic(store, &view, block, *scenario, schedule, mode)?;
        }
        Ok(())
    }

    pub fn schedules(&self) -> impl Iterator<Item = (&str, usize, &IntegerSchedule)> {
        self.entries.iter().filter_map(|((cluster, scenario), entry)| {
            entry
                .schedule
                .as_ref()
                .map(|schedule| (cluster.as_str(), *scenario, schedule))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turn a fractional guide into an integer schedule for one cluster.
///
/// Decisions are only produced in reserve-aware mode. The guide must cover
/// every step of the view and stay under its unit ceiling.
pub fn round_cluster(
    view: &ClusterView,
    guide: &FractionalGuide,
    targets: &ClusterTargets,
    config: &HeuristicConfig,
    params: &SolverParameters,
) -> HeuristicResult<(IntegerSchedule, Vec<RoundingDecision>)> {
    let len = view.len();
    if guide.len() != len {
        return Err(UcrError::Validation(format!(
            "guide for '{}' has {} steps, block has {len}",
            view.id,
            guide.len()
        ))
        .into());
    }
    guide.check_ceiling(view.unit_ceiling())?;
    let guide = guide.values();
    let bounded = |t: usize, n: u32| n.max(view.unit_floor(t)).min(view.unit_limit(t));

    match config.mode {
        HeuristicMode::Accurate => {
            let lower: Vec<u32> = ceil_all(guide)?
                .into_iter()
                .enumerate()
                .map(|(t, n)| bounded(t, n))
                .collect();
            let nb_on = correct_durations(view, &lower, params)?;
            Ok((IntegerSchedule::from_on(nb_on), Vec::new()))
        }
        HeuristicMode::Fast => {
            let ceil: Vec<u32> = ceil_all(guide)?
                .into_iter()
                .enumerate()
                .map(|(t, n)| bounded(t, n))
                .collect();
            let upper: Vec<u32> = (0..len).map(|t| view.unit_limit(t)).collect();
            let (nb_on, offset) = fast_schedule(&ceil, &upper, view.d_min_up.max(view.d_min_down));
            debug!(cluster = %view.id, offset, "fast schedule built");
            Ok((IntegerSchedule::from_on(nb_on), Vec::new()))
        }
        HeuristicMode::ReserveAware => {
            let mut decisions = decide_block(
                view,
                guide,
                targets,
                config.rounding_policy,
                config.offline_policy,
                params,
            )?;
            let hourly: Vec<u32> = if config.smoothing {
                smooth(&mut decisions)
            } else {
                decisions.iter().map(|d| d.chosen).collect()
            };
            let lower: Vec<u32> = hourly
                .into_iter()
                .enumerate()
                .map(|(t, n)| bounded(t, n))
                .collect();
            let nb_on = correct_durations(view, &lower, params)?;

            let mut schedule = IntegerSchedule::from_on(nb_on);
            let mut spare: Vec<u32> = (0..len)
                .map(|t| view.unit_limit(t).saturating_sub(schedule.nb_on[t]))
                .collect();
            for (k, reserve) in view.reserves.iter().enumerate() {
                if !(0..len).any(|t| reserve.offline_capable(t)) {
                    continue;
                }
                let off: Vec<u32> = (0..len)
                    .map(|t| {
                        let wanted = decisions[t].chosen_off().get(k).copied().unwrap_or(0);
                        let granted = wanted.min(spare[t]);
                        spare[t] -= granted;
                        granted
                    })
                    .collect();
                schedule.nb_off.insert(reserve.kind, off);
            }
            schedule.check_ceiling(&view.nb_units_max)?;
            Ok((schedule, decisions))
        }
    }
}

/// Write a schedule back to the store as bounds for the final solve.
///
/// - accurate: `nb_units_min = nb_units_max = nb_on`
/// - reserve-aware: `nb_units_min = nb_on`, `nb_units_max = nb_on + Σ nb_off`,
///   `<kind>_nb_off_min = <kind>_nb_off_max = nb_off`
/// - fast: `min_generating = nb_on · p_min`
///
/// Commitment modes first record the unit count bounding the min-down
/// constraint so pinned `nb_units_max` values do not tighten it. Writing the
/// same schedule twice leaves the store unchanged.
pub fn update_heuristic(
    store: &mut ParameterStore,
    view: &ClusterView,
    block: &TimeBlock,
    scenario: usize,
    schedule: &IntegerSchedule,
    mode: HeuristicMode,
) -> UcrResult<()> {
    if schedule.len() != block.len() {
        return Err(UcrError::Validation(format!(
            "schedule for '{}' has {} steps, block has {} hours",
            view.id,
            schedule.len(),
            block.len()
        )));
    }

    match mode {
        HeuristicMode::Fast => {
            let min_generating: Vec<f64> = schedule
                .nb_on
                .iter()
                .zip(&view.p_min)
                .map(|(&n, &p_min)| f64::from(n) * p_min)
                .collect();
            store.set_series(&view.id, params::MIN_GENERATING, block, scenario, &min_generating)?;
        }
        HeuristicMode::Accurate | HeuristicMode::ReserveAware => {
            for (t, &hour) in block.hours().iter().enumerate() {
                let nb_on = f64::from(schedule.nb_on[t]);
                let held_off: u32 = if mode == HeuristicMode::ReserveAware {
                    schedule.nb_off.values().filter_map(|off| off.get(t)).sum()
                } else {
                    0
                };
                store.set_value(
                    &view.id,
                    params::NB_UNITS_MAX_MIN_DOWN_TIME,
                    hour,
                    scenario,
                    view.min_down_units[t],
                );
                store.set_value(&view.id, params::NB_UNITS_MIN, hour, scenario, nb_on);
                store.set_value(
                    &view.id,
                    params::NB_UNITS_MAX,
                    hour,
                    scenario,
                    nb_on + f64::from(held_off),
                );
            }
            if mode == HeuristicMode::ReserveAware {
                for (kind, off) in &schedule.nb_off {
                    let off: Vec<f64> = off.iter().map(|&n| f64::from(n)).collect();
                    store.set_series(&view.id, &kind.param(params::NB_OFF_MIN), block, scenario, &off)?;
                    store.set_series(&view.id, &kind.param(params::NB_OFF_MAX), block, scenario, &off)?;
                }
            }
        }
    }
    debug!(cluster = %view.id, scenario, %mode, "schedule written back");
    Ok(())
}

/// Relaxed commitment of a cluster as a guide, plus its energy and reserve
/// shares.
pub fn relaxed_guide(
    view: &ClusterView,
    output: &OutputValues,
    scenario: usize,
) -> UcrResult<(FractionalGuide, ClusterTargets)> {
    let component = output
        .component(&view.id)
        .ok_or_else(|| UcrError::Solver(format!("no relaxed values for '{}'", view.id)))?;
    let nb_on = component
        .var(vars::NB_ON)
        .ok_or_else(|| UcrError::Solver(format!("no relaxed commitment for '{}'", view.id)))?;
    let read = |name: &str, t: usize| {
        component
            .var(name)
            .and_then(|v| v.at(scenario, t))
            .unwrap_or(0.0)
    };

    let len = view.len();
    // solver noise may leave values just outside [0, nb_units_max]
    let guide = FractionalGuide::new(
        (0..len)
            .map(|t| {
                let value = nb_on.at(scenario, t).unwrap_or(0.0);
                pre_round(value.max(0.0).min(view.nb_units_max[t].max(0.0)))
            })
            .collect(),
    )?;
    let targets = ClusterTargets {
        energy: (0..len).map(|t| read(vars::GENERATION, t)).collect(),
        reserves: view
            .reserves
            .iter()
            .map(|r| {
                let on = vars::reserve_on(r.kind);
                let off = vars::reserve_off(r.kind);
                (0..len).map(|t| read(&on, t) + read(&off, t)).collect()
            })
            .collect(),
    };
    Ok((guide, targets))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSchedule {
    pub cluster: String,
    pub scenario: usize,
    pub schedule: IntegerSchedule,
}

/// Outcome of one block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    pub block_id: usize,
    pub hours: usize,
    pub mode: HeuristicMode,
    pub relaxed_objective: f64,
    pub final_status: SolveStatus,
    pub final_objective: Option<f64>,
    pub schedules: Vec<ClusterSchedule>,
}

impl BlockReport {
    pub fn is_feasible(&self) -> bool {
        self.final_status.is_optimal()
    }

    pub fn schedule(&self, cluster: &str, scenario: usize) -> Option<&IntegerSchedule> {
        self.schedules
            .iter()
            .find(|s| s.cluster == cluster && s.scenario == scenario)
            .map(|s| &s.schedule)
    }
}

/// Resolve one block: relaxed solve, rounding, write-back, final solve.
pub fn resolve_block(
    network: &Network,
    store: &mut ParameterStore,
    block: &TimeBlock,
    scenario_count: usize,
    config: &HeuristicConfig,
    params: &SolverParameters,
) -> HeuristicResult<BlockReport> {
    info!(block = block.id, hours = block.len(), mode = %config.mode, "resolving block");

    let relaxed = build_problem(network, store, block, scenario_count, CommitmentMode::Relaxed)?
        .solve(params);
    let relaxed_objective = match relaxed.objective_value {
        Some(objective) if relaxed.status.is_optimal() => objective,
        _ => {
            return Err(HeuristicError::RelaxedNotOptimal(
                relaxed
                    .message
                    .unwrap_or_else(|| relaxed.status.to_string()),
            ))
        }
    };
    info!(block = block.id, objective = relaxed_objective, "relaxed solve done");

    let mut working = ScheduleWorkingSet::new();
    for cluster in &network.clusters {
        for scenario in 0..scenario_count {
            let view = ClusterView::load(network, store, &cluster.id, block, scenario)?;
            let (guide, targets) = relaxed_guide(&view, &relaxed.output, scenario)?;
            working.seed(&cluster.id, scenario, guide, targets);
            let schedule = working.round(&view, scenario, config, params)?;
            debug!(
                cluster = %cluster.id,
                scenario,
                unit_hours = schedule.nb_on.iter().sum::<u32>(),
                starts = schedule.starts(),
                "cluster rounded"
            );
        }
    }

    working.write_back(network, store, block, config.mode)?;
    info!(block = block.id, clusters = working.len(), "schedules written back");

    let solved = build_problem(
        network,
        store,
        block,
        scenario_count,
        config.mode.final_commitment(),
    )?
    .solve(params);
    match solved.objective_value {
        Some(objective) if solved.status.is_optimal() => {
            info!(block = block.id, objective, "final solve done")
        }
        _ => warn!(
            block = block.id,
            status = %solved.status,
            "final solve not optimal; rounded schedules conflict with coupling constraints"
        ),
    }

    Ok(BlockReport {
        block_id: block.id,
        hours: block.len(),
        mode: config.mode,
        relaxed_objective,
        final_status: solved.status,
        final_objective: solved.objective_value,
        schedules: working
            .schedules()
            .map(|(cluster, scenario, schedule)| ClusterSchedule {
                cluster: cluster.to_string(),
                scenario,
                schedule: schedule.clone(),
            })
            .collect(),
    })
}

/// Outcome of every block of a horizon.
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub blocks: Vec<BlockReport>,
    /// Sum of final objectives, set when every block solved to optimality
    pub total_objective: Option<f64>,
}

/// Resolve `horizon` hours block by block.
pub fn resolve_study(
    network: &Network,
    store: &mut ParameterStore,
    horizon: usize,
    block_length: usize,
    scenario_count: usize,
    config: &HeuristicConfig,
    params: &SolverParameters,
) -> HeuristicResult<StudyReport> {
    let blocks = TimeBlock::split(horizon, block_length);
    if blocks.is_empty() {
        return Err(UcrError::Config(format!(
            "no block to resolve (horizon {horizon}, block length {block_length})"
        ))
        .into());
    }

    let reports = blocks
        .iter()
        .map(|block| resolve_block(network, store, block, scenario_count, config, params))
        .collect::<HeuristicResult<Vec<_>>>()?;
    let total_objective = reports
        .iter()
        .map(|r| r.final_objective.filter(|_| r.is_feasible()))
        .sum::<Option<f64>>();
    Ok(StudyReport {
        blocks: reports,
        total_objective,
    })
}
