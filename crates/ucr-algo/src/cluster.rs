//! Per-cluster parameter view.
//!
//! [`ClusterView`] reads every parameter a heuristic needs for one cluster,
//! one block and one scenario out of the [`ParameterStore`] in a single
//! pass. Heuristics then work on plain arrays indexed by block step and
//! never touch the store until write-back.

use serde::Serialize;
use ucr_core::{params, Network, ParameterStore, ReserveKind, TimeBlock, UcrError, UcrResult};

/// Reserve participation data of a cluster for one reserve kind.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveView {
    pub kind: ReserveKind,
    /// Max participation per committed unit
    pub max_on: Vec<f64>,
    /// Max participation per offline unit (zero for downward kinds)
    pub max_off: Vec<f64>,
    pub cost_on: Vec<f64>,
    pub cost_off: Vec<f64>,
    /// Node penalty for each MW not supplied
    pub non_supply_cost: Vec<f64>,
    /// Node penalty for each MW supplied above demand
    pub oversupply_cost: Vec<f64>,
}

impl ReserveView {
    fn load(
        store: &ParameterStore,
        cluster: &str,
        node: &str,
        node_has_demand: bool,
        kind: ReserveKind,
        block: &TimeBlock,
        scenario: usize,
    ) -> Self {
        let read = |component: &str, suffix: &str| {
            store.series_or(component, &kind.param(suffix), block, scenario, 0.0)
        };
        let (non_supply_cost, oversupply_cost) = if node_has_demand {
            (
                read(node, params::NON_SUPPLY_COST),
                read(node, params::OVERSUPPLY_COST),
            )
        } else {
            (vec![0.0; block.len()], vec![0.0; block.len()])
        };
        Self {
            kind,
            max_on: read(cluster, params::MAX_ON),
            max_off: if kind.accepts_offline() {
                read(cluster, params::MAX_OFF)
            } else {
                vec![0.0; block.len()]
            },
            cost_on: read(cluster, params::COST_ON),
            cost_off: read(cluster, params::COST_OFF),
            non_supply_cost,
            oversupply_cost,
        }
    }

    /// Whether offline units can supply this kind at step `t`.
    pub fn offline_capable(&self, t: usize) -> bool {
        self.kind.accepts_offline() && self.max_off[t] > 0.0
    }
}

/// All parameters of one cluster over one block and scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub id: String,
    pub node: String,
    pub p_max: Vec<f64>,
    pub p_min: Vec<f64>,
    pub cost: Vec<f64>,
    pub startup_cost: Vec<f64>,
    pub fixed_cost: Vec<f64>,
    pub nb_units_min: Vec<f64>,
    pub nb_units_max: Vec<f64>,
    pub nb_failures: Vec<f64>,
    /// Unit count bounding the min-down constraint
    pub min_down_units: Vec<f64>,
    pub unsupplied_energy_cost: Vec<f64>,
    pub spillage_cost: Vec<f64>,
    /// Minimum up time in hours, clamped to `[1, block length]`
    pub d_min_up: usize,
    pub d_min_down: usize,
    pub reserves: Vec<ReserveView>,
}

impl ClusterView {
    pub fn load(
        network: &Network,
        store: &ParameterStore,
        cluster_id: &str,
        block: &TimeBlock,
        scenario: usize,
    ) -> UcrResult<Self> {
        let spec = network
            .cluster(cluster_id)
            .ok_or_else(|| UcrError::Validation(format!("unknown cluster '{cluster_id}'")))?;
        let node = network.node(&spec.node).ok_or_else(|| {
            UcrError::Validation(format!(
                "cluster '{cluster_id}' references unknown node '{}'",
                spec.node
            ))
        })?;
        if block.is_empty() {
            return Err(UcrError::Validation("empty time block".into()));
        }

        let series = |name: &str| store.series(cluster_id, name, block, scenario);
        let first_hour = block.hour(0);
        let duration = |name: &str| -> UcrResult<usize> {
            let d = store.get_value(cluster_id, name, first_hour, scenario)?;
            Ok((d.round().max(1.0) as usize).min(block.len()))
        };

        let reserves = spec
            .reserves
            .iter()
            .map(|&kind| {
                ReserveView::load(
                    store,
                    cluster_id,
                    &node.id,
                    node.reserve_demands.contains(&kind),
                    kind,
                    block,
                    scenario,
                )
            })
            .collect();

        let nb_units_max = series(params::NB_UNITS_MAX)?;
        let min_down_units = block
            .hours()
            .iter()
            .zip(&nb_units_max)
            .map(|(&hour, &units)| {
                store.get_or(cluster_id, params::NB_UNITS_MAX_MIN_DOWN_TIME, hour, scenario, units)
            })
            .collect();

        Ok(Self {
            id: cluster_id.to_string(),
            node: node.id.clone(),
            p_max: series(params::P_MAX)?,
            p_min: series(params::P_MIN)?,
            cost: series(params::COST)?,
            startup_cost: series(params::STARTUP_COST)?,
            fixed_cost: series(params::FIXED_COST)?,
            nb_units_min: series(params::NB_UNITS_MIN)?,
            nb_units_max,
            nb_failures: store.series_or(cluster_id, params::NB_FAILURES, block, scenario, 0.0),
            min_down_units,
            unsupplied_energy_cost: store.series(
                &node.id,
                params::UNSUPPLIED_ENERGY_COST,
                block,
                scenario,
            )?,
            spillage_cost: store.series(&node.id, params::SPILLAGE_COST, block, scenario)?,
            d_min_up: duration(params::D_MIN_UP)?,
            d_min_down: duration(params::D_MIN_DOWN)?,
            reserves,
        })
    }

    pub fn len(&self) -> usize {
        self.p_max.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p_max.is_empty()
    }

    /// Maximum number of units available per step.
    pub fn unit_ceiling(&self) -> &[f64] {
        &self.nb_units_max
    }

    /// Integer lower bound on committed units per step.
    pub fn unit_floor(&self, t: usize) -> u32 {
        ucr_core::pre_round(self.nb_units_min[t]).ceil().max(0.0) as u32
    }

    /// Integer upper bound on committed units per step.
    pub fn unit_limit(&self, t: usize) -> u32 {
        ucr_core::pre_round(self.nb_units_max[t]).floor().max(0.0) as u32
    }

    /// No min-up/min-down constraint to correct for.
    pub fn has_trivial_durations(&self) -> bool {
        self.d_min_up <= 1 && self.d_min_down <= 1
    }

    /// Flatten step `t` into a [`ClusterHourContext`].
    ///
    /// `energy_target` and `reserve_targets` (one per entry of
    /// [`reserves`](Self::reserves)) are the cluster's share of demand taken
    /// from the relaxed solve.
    pub fn hour_context(
        &self,
        t: usize,
        energy_target: f64,
        reserve_targets: &[f64],
    ) -> ClusterHourContext {
        let reserves = self
            .reserves
            .iter()
            .enumerate()
            .map(|(k, r)| ReserveHourParams {
                kind: r.kind,
                max_on: r.max_on[t],
                max_off: r.max_off[t],
                cost_on: r.cost_on[t],
                cost_off: r.cost_off[t],
                non_supply_cost: r.non_supply_cost[t],
                oversupply_cost: r.oversupply_cost[t],
                target: reserve_targets.get(k).copied().unwrap_or(0.0).max(0.0),
            })
            .collect();
        ClusterHourContext {
            step: t,
            p_max: self.p_max[t],
            p_min: self.p_min[t],
            cost: self.cost[t],
            startup_cost: self.startup_cost[t],
            fixed_cost: self.fixed_cost[t],
            unit_ceiling: self.nb_units_max[t],
            unsupplied_energy_cost: self.unsupplied_energy_cost[t],
            spillage_cost: self.spillage_cost[t],
            energy_target: energy_target.max(0.0),
            reserves,
        }
    }
}

/// Reserve parameters of one kind at one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveHourParams {
    pub kind: ReserveKind,
    pub max_on: f64,
    pub max_off: f64,
    pub cost_on: f64,
    pub cost_off: f64,
    pub non_supply_cost: f64,
    pub oversupply_cost: f64,
    /// Reserve to supply
    pub target: f64,
}

impl ReserveHourParams {
    pub fn offline_capable(&self) -> bool {
        self.kind.accepts_offline() && self.max_off > 0.0
    }
}

/// Everything the hour-level allocation needs about one cluster at one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHourContext {
    pub step: usize,
    pub p_max: f64,
    pub p_min: f64,
    pub cost: f64,
    pub startup_cost: f64,
    pub fixed_cost: f64,
    pub unit_ceiling: f64,
    pub unsupplied_energy_cost: f64,
    pub spillage_cost: f64,
    /// Energy to produce
    pub energy_target: f64,
    pub reserves: Vec<ReserveHourParams>,
}

impl ClusterHourContext {
    /// Units still available once `nb_on` are committed.
    pub fn spare_units(&self, nb_on: u32) -> u32 {
        let ceiling = ucr_core::pre_round(self.unit_ceiling).floor().max(0.0) as u32;
        ceiling.saturating_sub(nb_on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucr_core::{ClusterSpec, NodeSpec, ReserveCategory};

    fn setup() -> (Network, ParameterStore) {
        let up = ReserveKind::up(ReserveCategory::Tertiary1);
        let down = ReserveKind::down(ReserveCategory::Primary);
        let network = Network::new()
            .with_node(NodeSpec::new("N").with_reserve(up))
            .with_cluster(ClusterSpec::new("G", "N").with_reserve(up).with_reserve(down));

        let mut store = ParameterStore::new();
        store.add_data("N", params::DEMAND, 100.0);
        store.add_data("N", params::UNSUPPLIED_ENERGY_COST, 1000.0);
        store.add_data("N", params::SPILLAGE_COST, 0.0);
        store.add_data("N", up.param(params::NON_SUPPLY_COST), 500.0);
        store.add_data("G", params::P_MAX, 100.0);
        store.add_data("G", params::P_MIN, 30.0);
        store.add_data("G", params::D_MIN_UP, 3.0);
        store.add_data("G", params::D_MIN_DOWN, 48.0);
        store.add_data("G", params::COST, vec![10.0, 11.0, 12.0, 13.0]);
        store.add_data("G", params::STARTUP_COST, 5.0);
        store.add_data("G", params::FIXED_COST, 1.0);
        store.add_data("G", params::NB_UNITS_MIN, 0.0);
        store.add_data("G", params::NB_UNITS_MAX, 4.0);
        store.add_data("G", up.param(params::MAX_ON), 20.0);
        store.add_data("G", up.param(params::MAX_OFF), 50.0);
        store.add_data("G", down.param(params::MAX_OFF), 50.0);
        (network, store)
    }

    #[test]
    fn test_load_reads_series_and_defaults() {
        let (network, store) = setup();
        let block = TimeBlock::new(0, 1..4);
        let view = ClusterView::load(&network, &store, "G", &block, 0).unwrap();

        assert_eq!(view.len(), 3);
        assert_eq!(view.cost, vec![11.0, 12.0, 13.0]);
        assert_eq!(view.nb_failures, vec![0.0; 3]);
        assert_eq!(view.min_down_units, vec![4.0; 3]);
        assert_eq!(view.d_min_up, 3);
        // clamped to the block length
        assert_eq!(view.d_min_down, 3);
        assert_eq!(view.unit_limit(0), 4);
        assert!(!view.has_trivial_durations());
    }

    #[test]
    fn test_reserve_views() {
        let (network, store) = setup();
        let block = TimeBlock::new(0, 0..2);
        let view = ClusterView::load(&network, &store, "G", &block, 0).unwrap();

        let up = &view.reserves[0];
        assert!(up.offline_capable(0));
        assert_eq!(up.non_supply_cost, vec![500.0; 2]);

        // downward kinds never take offline units and the node has no demand
        let down = &view.reserves[1];
        assert_eq!(down.max_off, vec![0.0; 2]);
        assert_eq!(down.non_supply_cost, vec![0.0; 2]);
    }

    #[test]
    fn test_hour_context() {
        let (network, store) = setup();
        let block = TimeBlock::new(0, 0..4);
        let view = ClusterView::load(&network, &store, "G", &block, 0).unwrap();
        let ctx = view.hour_context(2, 150.0, &[40.0]);

        assert_eq!(ctx.cost, 12.0);
        assert_eq!(ctx.energy_target, 150.0);
        assert_eq!(ctx.reserves[0].target, 40.0);
        assert_eq!(ctx.reserves[1].target, 0.0);
        assert_eq!(ctx.spare_units(3), 1);
        assert_eq!(ctx.spare_units(5), 0);
    }

    #[test]
    fn test_missing_parameter_is_an_error() {
        let (network, _) = setup();
        let mut store = ParameterStore::new();
        store.add_data("G", params::P_MAX, 1.0);
        let block = TimeBlock::new(0, 0..2);
        let err = ClusterView::load(&network, &store, "G", &block, 0).unwrap_err();
        assert!(matches!(err, UcrError::MissingParameter { .. }));
        assert!(ClusterView::load(&network, &store, "X", &block, 0).is_err());
    }
}
