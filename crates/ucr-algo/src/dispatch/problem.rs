//! Block dispatch problem over a whole network.
//!
//! One LP/MILP covers every cluster, node and generation cap of the network
//! over the hours of a block and every scenario:
//!
//! - node energy balance: `Σ generation + unsupplied − spillage = demand`
//! - node reserve balance: `Σ participation + non_supplied − oversupplied = demand`
//! - cluster limits: `nb_on·p_min + Σ_down on ≤ generation`,
//!   `generation + Σ_up on ≤ nb_on·p_max`, `on_k ≤ nb_on·max_on_k`,
//!   `nb_off_k·p_min ≤ off_k ≤ nb_off_k·max_off_k`,
//!   `nb_on + nb_off_k ≤ nb_units_max`,
//!   `Σ_k off_k ≤ (nb_units_max − nb_on)·p_max`
//! - cyclic commitment dynamics with minimum up and down times
//! - generation caps: `Σ generation ≤ max_generation`
//!
//! Costs of each scenario are weighted by `1 / scenario_count`.

use good_lp::{constraint, Expression, Variable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use tracing::{debug, warn};
use ucr_core::{
    params, GenerationCap, Network, NodeSpec, ParameterStore, ReserveKind, TimeBlock, UcrError,
    UcrResult,
};

use crate::cluster::ClusterView;
use crate::dispatch::output::OutputValues;
use crate::heuristic::accurate::window;
use crate::solver::{LinearProgram, SolveStatus, SolverParameters};

/// Variable names exposed through [`OutputValues`].
pub mod vars {
    use ucr_core::ReserveKind;

    // cluster
    pub const GENERATION: &str = "generation";
    pub const NB_ON: &str = "nb_on";
    pub const NB_START: &str = "nb_start";
    pub const NB_STOP: &str = "nb_stop";
    pub const FAILURES: &str = "failures";
    // node
    pub const UNSUPPLIED_ENERGY: &str = "unsupplied_energy";
    pub const SPILLAGE: &str = "spillage";

    pub fn reserve_on(kind: ReserveKind) -> String {
        format!("{kind}_on")
    }

    pub fn reserve_off(kind: ReserveKind) -> String {
        format!("{kind}_off")
    }

    pub fn nb_off(kind: ReserveKind) -> String {
        format!("nb_off_{kind}")
    }

    pub fn non_supplied(kind: ReserveKind) -> String {
        format!("{kind}_non_supplied")
    }

    pub fn oversupplied(kind: ReserveKind) -> String {
        format!("{kind}_oversupplied")
    }
}

/// How unit commitment is represented in the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitmentMode {
    /// Continuous unit counts
    Relaxed,
    /// Integer unit counts, starts, stops and offline counts
    Integer,
    /// Generation only, bounded below by `min_generating`; no commitment
    /// variables and no reserves
    MinGeneration,
}

impl std::fmt::Display for CommitmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitmentMode::Relaxed => write!(f, "relaxed"),
            CommitmentMode::Integer => write!(f, "integer"),
            CommitmentMode::MinGeneration => write!(f, "min-generation"),
        }
    }
}

/// `[scenario][step]`
type Grid<T> = Vec<Vec<T>>;

/// A built, not yet solved, dispatch problem.
pub struct DispatchProblem {
    lp: LinearProgram,
    grids: BTreeMap<(String, String), Grid<Variable>>,
    mode: CommitmentMode,
    block_id: usize,
}

/// Outcome of [`DispatchProblem::solve`].
#[derive(Debug, Clone, Serialize)]
pub struct SolvedDispatch {
    pub status: SolveStatus,
    /// Set when `status` is optimal
    pub objective_value: Option<f64>,
    #[serde(skip)]
    pub output: OutputValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DispatchProblem {
    pub fn mode(&self) -> CommitmentMode {
        self.mode
    }

    pub fn num_variables(&self) -> usize {
        self.lp.num_variables()
    }

    pub fn num_constraints(&self) -> usize {
        self.lp.num_constraints()
    }

    /// Solve and collect every variable. A non-optimal outcome is returned
    /// as a status, never retried.
    pub fn solve(self, params: &SolverParameters) -> SolvedDispatch {
        let DispatchProblem {
            lp,
            grids,
            mode,
            block_id,
        } = self;
        match lp.solve(params) {
            Ok(solution) => {
                let mut output = OutputValues::new();
                for ((component, name), grid) in &grids {
                    let values = grid
                        .iter()
                        .map(|row| row.iter().map(|&v| solution.value(v)).collect())
                        .collect();
                    output.insert(component, name, values);
                }
                debug!(
                    block = block_id,
                    %mode,
                    objective = solution.objective,
                    elapsed_ms = solution.solve_time.as_millis() as u64,
                    "dispatch solved"
                );
                SolvedDispatch {
                    status: SolveStatus::Optimal,
                    objective_value: Some(solution.objective),
                    output,
                    message: None,
                }
            }
            Err(err) => {
                warn!(block = block_id, %mode, error = %err, "dispatch not solved");
                SolvedDispatch {
                    status: err.status(),
                    objective_value: None,
                    output: OutputValues::new(),
                    message: Some(err.to_string()),
                }
            }
        }
    }
}

/// Build the dispatch problem of `block` for `scenario_count` scenarios.
pub fn build_problem(
    network: &Network,
    store: &ParameterStore,
    block: &TimeBlock,
    scenario_count: usize,
    mode: CommitmentMode,
) -> UcrResult<DispatchProblem> {
    let diag = network.validate(store);
    if let Some(issue) = diag.errors().next() {
        return Err(UcrError::Validation(format!(
            "invalid network ({}): {issue}",
            diag.summary()
        )));
    }
    if scenario_count == 0 {
        return Err(UcrError::Config("scenario count must be positive".into()));
    }
    if block.is_empty() {
        return Err(UcrError::Validation("empty time block".into()));
    }

    let mut builder = Builder {
        lp: LinearProgram::new(),
        grids: BTreeMap::new(),
        injection: HashMap::new(),
        reserve_supply: HashMap::new(),
        shape: (scenario_count, block.len()),
        weight: 1.0 / scenario_count as f64,
        mode,
    };

    for cluster in &network.clusters {
        for s in 0..scenario_count {
            let view = ClusterView::load(network, store, &cluster.id, block, s)?;
            match mode {
                CommitmentMode::MinGeneration => {
                    builder.add_min_generation_cluster(store, &view, block, s)?
                }
                CommitmentMode::Relaxed | CommitmentMode::Integer => {
                    builder.add_cluster(store, &view, block, s)?
                }
            }
        }
    }
    for node in &network.nodes {
        builder.add_node(store, node, block)?;
    }
    for cap in &network.generation_caps {
        builder.add_cap(store, cap, block)?;
    }

    debug!(
        block = block.id,
        %mode,
        variables = builder.lp.num_variables(),
        integer = builder.lp.num_integer(),
        constraints = builder.lp.num_constraints(),
        "dispatch problem built"
    );
    Ok(DispatchProblem {
        lp: builder.lp,
        grids: builder.grids,
        mode,
        block_id: block.id,
    })
}

struct Builder {
    lp: LinearProgram,
    grids: BTreeMap<(String, String), Grid<Variable>>,
    /// Generation injected at each node
    injection: HashMap<String, Grid<Expression>>,
    /// Reserve participation offered at each node, per kind
    reserve_supply: HashMap<(String, ReserveKind), Grid<Expression>>,
    shape: (usize, usize),
    weight: f64,
    mode: CommitmentMode,
}

fn zero_grid((scenarios, len): (usize, usize)) -> Grid<Expression> {
    vec![vec![Expression::from(0.0); len]; scenarios]
}

fn accumulate<K: Eq + Hash>(
    map: &mut HashMap<K, Grid<Expression>>,
    key: K,
    shape: (usize, usize),
    s: usize,
    t: usize,
    term: Variable,
) {
    let grid = map.entry(key).or_insert_with(|| zero_grid(shape));
    grid[s][t] += term;
}

fn check_bounds(component: &str, parameter: &str, t: usize, lo: f64, hi: f64) -> UcrResult<()> {
    if lo > hi + 1e-9 {
        return Err(UcrError::Validation(format!(
            "{component}: {parameter} ({lo}) above its upper bound ({hi}) at step {t}"
        )));
    }
    Ok(())
}

impl Builder {
    fn record(&mut self, component: &str, name: &str, row: Vec<Variable>) {
        self.grids
            .entry((component.to_string(), name.to_string()))
            .or_default()
            .push(row);
    }

    fn vars(&mut self, len: usize, lo: f64, hi: f64, integer: bool) -> Vec<Variable> {
        (0..len).map(|_| self.lp.var(lo, hi, integer)).collect()
    }

    fn add_cluster(
        &mut self,
        store: &ParameterStore,
        view: &ClusterView,
        block: &TimeBlock,
        s: usize,
    ) -> UcrResult<()> {
        let integer = self.mode == CommitmentMode::Integer;
        let len = view.len();
        let w = self.weight;
        let units_cap = view.nb_units_max.iter().copied().fold(0.0, f64::max);

        let generation = self.vars(len, 0.0, f64::INFINITY, false);
        let mut nb_on = Vec::with_capacity(len);
        for t in 0..len {
            let (lo, hi) = (view.nb_units_min[t], view.nb_units_max[t]);
            check_bounds(&view.id, params::NB_UNITS_MIN, t, lo, hi)?;
            nb_on.push(self.lp.var(lo.max(0.0), hi, integer));
        }
        let start = self.vars(len, 0.0, units_cap, integer);
        let stop = self.vars(len, 0.0, units_cap, integer);
        let failures: Vec<Variable> = (0..len)
            .map(|t| self.lp.var(0.0, view.nb_failures[t].max(0.0), integer))
            .collect();

        let mut up_draw: Vec<Expression> = generation.iter().map(|&g| Expression::from(g)).collect();
        let mut down_draw = vec![Expression::from(0.0); len];
        let mut offline_power = vec![Expression::from(0.0); len];
        let mut any_offline = false;

        for r in &view.reserves {
            let kind = r.kind;
            let on = self.vars(len, 0.0, f64::INFINITY, false);
            for t in 0..len {
                self.lp
                    .add_constraint(constraint!(on[t] <= r.max_on[t] * nb_on[t]));
                self.lp.add_objective(w * r.cost_on[t] * on[t]);
                if kind.is_up() {
                    up_draw[t] += on[t];
                } else {
                    down_draw[t] += on[t];
                }
                accumulate(
                    &mut self.reserve_supply,
                    (view.node.clone(), kind),
                    self.shape,
                    s,
                    t,
                    on[t],
                );
            }
            self.record(&view.id, &vars::reserve_on(kind), on);

            if !(kind.accepts_offline() && r.max_off.iter().any(|&m| m > 0.0)) {
                continue;
            }
            any_offline = true;
            let off = self.vars(len, 0.0, f64::INFINITY, false);
            let mut nb_off = Vec::with_capacity(len);
            for (t, &hour) in block.hours().iter().enumerate() {
                let lo = store.get_or(&view.id, &kind.param(params::NB_OFF_MIN), hour, s, 0.0);
                let hi = store.get_or(
                    &view.id,
                    &kind.param(params::NB_OFF_MAX),
                    hour,
                    s,
                    view.nb_units_max[t],
                );
                check_bounds(&view.id, &kind.param(params::NB_OFF_MIN), t, lo, hi)?;
                nb_off.push(self.lp.var(lo.max(0.0), hi, integer));
            }
            for t in 0..len {
                self.lp
                    .add_constraint(constraint!(off[t] <= r.max_off[t] * nb_off[t]));
                self.lp
                    .add_constraint(constraint!(off[t] >= view.p_min[t] * nb_off[t]));
                self.lp
                    .add_constraint(constraint!(nb_on[t] + nb_off[t] <= view.nb_units_max[t]));
                self.lp.add_objective(w * r.cost_off[t] * off[t]);
                offline_power[t] += off[t];
                accumulate(
                    &mut self.reserve_supply,
                    (view.node.clone(), kind),
                    self.shape,
                    s,
                    t,
                    off[t],
                );
            }
            self.record(&view.id, &vars::reserve_off(kind), off);
            self.record(&view.id, &vars::nb_off(kind), nb_off);
        }

        for t in 0..len {
            let prev = (t + len - 1) % len;
            let (p_min, p_max) = (view.p_min[t], view.p_max[t]);

            self.lp.add_constraint(constraint!(
                p_min * nb_on[t] + down_draw[t].clone() <= generation[t]
            ));
            self.lp
                .add_constraint(constraint!(up_draw[t].clone() <= p_max * nb_on[t]));
            if any_offline {
                self.lp.add_constraint(constraint!(
                    offline_power[t].clone() + p_max * nb_on[t] <= view.nb_units_max[t] * p_max
                ));
            }

            self.lp
                .add_constraint(constraint!(nb_on[t] == nb_on[prev] + start[t] - stop[t]));
            self.lp.add_constraint(constraint!(failures[t] <= stop[t]));

            let mut started = Expression::from(0.0);
            for k in window(t, view.d_min_up, len) {
                started += start[k] - failures[k];
            }
            self.lp.add_constraint(constraint!(nb_on[t] >= started));

            let mut stopped = Expression::from(0.0);
            for k in window(t, view.d_min_down, len) {
                stopped += stop[k];
            }
            self.lp
                .add_constraint(constraint!(nb_on[t] + stopped <= view.min_down_units[t]));

            self.lp.add_objective(
                w * view.cost[t] * generation[t]
                    + w * view.fixed_cost[t] * nb_on[t]
                    + w * view.startup_cost[t] * start[t],
            );
            accumulate(
                &mut self.injection,
                view.node.clone(),
                self.shape,
                s,
                t,
                generation[t],
            );
        }

        self.record(&view.id, vars::GENERATION, generation);
        self.record(&view.id, vars::NB_ON, nb_on);
        self.record(&view.id, vars::NB_START, start);
        self.record(&view.id, vars::NB_STOP, stop);
        self.record(&view.id, vars::FAILURES, failures);
        Ok(())
    }

    fn add_min_generation_cluster(
        &mut self,
        store: &ParameterStore,
        view: &ClusterView,
        block: &TimeBlock,
        s: usize,
    ) -> UcrResult<()> {
        let min_generating = store.series_or(&view.id, params::MIN_GENERATING, block, s, 0.0);
        let mut generation = Vec::with_capacity(view.len());
        for t in 0..view.len() {
            let hi = view.nb_units_max[t] * view.p_max[t];
            let lo = min_generating[t].max(0.0);
            check_bounds(&view.id, params::MIN_GENERATING, t, lo, hi)?;
            let g = self.lp.continuous(lo, hi);
            self.lp.add_objective(self.weight * view.cost[t] * g);
            accumulate(&mut self.injection, view.node.clone(), self.shape, s, t, g);
            generation.push(g);
        }
        self.record(&view.id, vars::GENERATION, generation);
        Ok(())
    }

    fn add_node(&mut self, store: &ParameterStore, node: &NodeSpec, block: &TimeBlock) -> UcrResult<()> {
        let (scenarios, len) = self.shape;
        let w = self.weight;
        let injection = self
            .injection
            .remove(&node.id)
            .unwrap_or_else(|| zero_grid(self.shape));

        for (s, injected) in injection.into_iter().enumerate() {
            let demand = store.series(&node.id, params::DEMAND, block, s)?;
            let ue_cost = store.series(&node.id, params::UNSUPPLIED_ENERGY_COST, block, s)?;
            let spill_cost = store.series(&node.id, params::SPILLAGE_COST, block, s)?;

            let unsupplied = self.vars(len, 0.0, f64::INFINITY, false);
            let spillage = self.vars(len, 0.0, f64::INFINITY, false);
            for (t, generated) in injected.into_iter().enumerate() {
                self.lp.add_constraint(constraint!(
                    generated + unsupplied[t] - spillage[t] == demand[t]
                ));
                self.lp
                    .add_objective(w * ue_cost[t] * unsupplied[t] + w * spill_cost[t] * spillage[t]);
            }
            self.record(&node.id, vars::UNSUPPLIED_ENERGY, unsupplied);
            self.record(&node.id, vars::SPILLAGE, spillage);
        }

        if self.mode == CommitmentMode::MinGeneration {
            return Ok(());
        }
        for &kind in &node.reserve_demands {
            let supply = self
                .reserve_supply
                .remove(&(node.id.clone(), kind))
                .unwrap_or_else(|| zero_grid(self.shape));
            for (s, supplied) in supply.into_iter().enumerate().take(scenarios) {
                let demand = store.series(&node.id, &kind.param(params::RESERVE_DEMAND), block, s)?;
                let ns_cost = store.series(&node.id, &kind.param(params::NON_SUPPLY_COST), block, s)?;
                let os_cost = store.series(&node.id, &kind.param(params::OVERSUPPLY_COST), block, s)?;

                let short = self.vars(len, 0.0, f64::INFINITY, false);
                let over = self.vars(len, 0.0, f64::INFINITY, false);
                for (t, offered) in supplied.into_iter().enumerate() {
                    self.lp
                        .add_constraint(constraint!(offered + short[t] - over[t] == demand[t]));
                    self.lp
                        .add_objective(w * ns_cost[t] * short[t] + w * os_cost[t] * over[t]);
                }
                self.record(&node.id, &vars::non_supplied(kind), short);
                self.record(&node.id, &vars::oversupplied(kind), over);
            }
        }
        Ok(())
    }

    fn add_cap(&mut self, store: &ParameterStore, cap: &GenerationCap, block: &TimeBlock) -> UcrResult<()> {
        let (scenarios, len) = self.shape;
        for s in 0..scenarios {
            let limit = store.series(&cap.id, params::MAX_GENERATION, block, s)?;
            for t in 0..len {
                let mut total = Expression::from(0.0);
                for cluster in &cap.clusters {
                    if let Some(grid) = self
                        .grids
                        .get(&(cluster.clone(), vars::GENERATION.to_string()))
                    {
                        total += grid[s][t];
                    }
                }
                self.lp.add_constraint(constraint!(total <= limit[t]));
            }
        }
        Ok(())
    }
}
