//! Hour-level choice between the floor and the ceiling of the guide.
//!
//! Each option `n` is priced in three steps: a continuous allocation sizes
//! the offline need, the offline allocator turns it into integer counts, and
//! a second allocation with those counts fixed gives the option's cost.

use serde::Serialize;
use tracing::debug;

use crate::cluster::{ClusterHourContext, ClusterView};
use crate::error::{HeuristicError, HeuristicResult};
use crate::reserve::allocation::{allocate, OfflineCounts};
use crate::reserve::offline::{allocate_offline, OfflinePolicy};
use crate::rounding::{round_at, RoundingPolicy};
use crate::solver::SolverParameters;

/// Floor/ceiling evaluation of one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundingDecision {
    pub step: usize,
    pub floor: u32,
    pub ceiling: u32,
    pub cost_floor: f64,
    pub cost_ceiling: f64,
    pub startup_cost: f64,
    /// Offline counts per reserve entry if the floor is kept
    pub off_floor: Vec<u32>,
    pub off_ceiling: Vec<u32>,
    pub chosen: u32,
}

impl RoundingDecision {
    pub fn is_fractional(&self) -> bool {
        self.floor < self.ceiling
    }

    /// Offline counts of the chosen option.
    pub fn chosen_off(&self) -> &[u32] {
        if self.chosen == self.floor {
            &self.off_floor
        } else {
            &self.off_ceiling
        }
    }

    pub fn cost_of(&self, nb_on: u32) -> f64 {
        if nb_on == self.floor {
            self.cost_floor
        } else {
            self.cost_ceiling
        }
    }
}

/// Cost of committing `nb_on` units and the offline counts that go with it.
pub fn evaluate_option(
    ctx: &ClusterHourContext,
    nb_on: u32,
    offline_policy: OfflinePolicy,
    params: &SolverParameters,
) -> HeuristicResult<(f64, Vec<u32>)> {
    let context = |stage: &str| format!("{stage} at step {} with {nb_on} units", ctx.step);

    let relaxed = allocate(ctx, nb_on, OfflineCounts::Continuous, params)
        .map_err(|e| HeuristicError::solve(context("reserve allocation"), e))?;
    let counts = allocate_offline(offline_policy, ctx, nb_on, &relaxed.offline_needs(), params)
        .map_err(|e| HeuristicError::solve(context("offline allocation"), e))?;
    let fixed = allocate(ctx, nb_on, OfflineCounts::Fixed(&counts), params)
        .map_err(|e| HeuristicError::solve(context("fixed reserve allocation"), e))?;
    Ok((fixed.cost, counts))
}

/// Evaluate both options of one hour and apply `rounding`.
///
/// A ceiling above the unit ceiling is not an option; the floor is kept.
pub fn decide_hour(
    ctx: &ClusterHourContext,
    guide: f64,
    rounding: RoundingPolicy,
    offline_policy: OfflinePolicy,
    params: &SolverParameters,
) -> HeuristicResult<RoundingDecision> {
    let (floor, ceiling) = round_at(ctx.step, guide)?;
    let limit = ctx.spare_units(0);
    if floor > limit {
        return Err(HeuristicError::UnitCountAboveCeiling {
            step: ctx.step,
            units: floor,
            ceiling: ctx.unit_ceiling,
        });
    }
    let ceiling = ceiling.min(limit);

    let (cost_floor, off_floor) = evaluate_option(ctx, floor, offline_policy, params)?;
    if ceiling == floor {
        return Ok(RoundingDecision {
            step: ctx.step,
            floor,
            ceiling,
            cost_floor,
            cost_ceiling: cost_floor,
            startup_cost: ctx.startup_cost,
            off_ceiling: off_floor.clone(),
            off_floor,
            chosen: floor,
        });
    }

    let (cost_ceiling, off_ceiling) = evaluate_option(ctx, ceiling, offline_policy, params)?;
    let chosen = if rounding.prefers_floor(cost_floor, cost_ceiling, ctx.startup_cost) {
        floor
    } else {
        ceiling
    };
    Ok(RoundingDecision {
        step: ctx.step,
        floor,
        ceiling,
        cost_floor,
        cost_ceiling,
        startup_cost: ctx.startup_cost,
        off_floor,
        off_ceiling,
        chosen,
    })
}

/// Per-step targets taken from the relaxed solve.
#[derive(Debug, Clone, Default)]
pub struct ClusterTargets {
    pub energy: Vec<f64>,
    /// `[reserve entry][step]`, same order as the view's reserves
    pub reserves: Vec<Vec<f64>>,
}

impl ClusterTargets {
    pub fn reserves_at(&self, t: usize) -> Vec<f64> {
        self.reserves
            .iter()
            .map(|series| series.get(t).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Decide every step of a block.
pub fn decide_block(
    view: &ClusterView,
    guide: &[f64],
    targets: &ClusterTargets,
    rounding: RoundingPolicy,
    offline_policy: OfflinePolicy,
    params: &SolverParameters,
) -> HeuristicResult<Vec<RoundingDecision>> {
    let decide = |t: usize| {
        let ctx = view.hour_context(
            t,
            targets.energy.get(t).copied().unwrap_or(0.0),
            &targets.reserves_at(t),
        );
        decide_hour(&ctx, guide[t], rounding, offline_policy, params)
    };

    #[cfg(feature = "parallel")]
    let decisions: HeuristicResult<Vec<_>> = {
        use rayon::prelude::*;
        (0..guide.len()).into_par_iter().map(decide).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let decisions: HeuristicResult<Vec<_>> = (0..guide.len()).map(decide).collect();

    let decisions = decisions?;
    debug!(
        cluster = %view.id,
        fractional = decisions.iter().filter(|d| d.is_fractional()).count(),
        raised = decisions.iter().filter(|d| d.is_fractional() && d.chosen == d.ceiling).count(),
        "hour-level rounding done"
    );
    Ok(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ReserveHourParams;
    use ucr_core::{ReserveCategory, ReserveKind};

    fn context(energy_target: f64) -> ClusterHourContext {
        ClusterHourContext {
            step: 13,
            p_max: 1000.0,
            p_min: 700.0,
            cost: 50.0,
            startup_cost: 50.0,
            fixed_cost: 1.0,
            unit_ceiling: 3.0,
            unsupplied_energy_cost: 1000.0,
            spillage_cost: 0.0,
            energy_target,
            reserves: Vec::new(),
        }
    }

    #[test]
    fn test_integer_guide_has_single_option() {
        let ctx = context(2000.0);
        let d = decide_hour(
            &ctx,
            2.0,
            RoundingPolicy::Gain,
            OfflinePolicy::QuantityGreedy,
            &SolverParameters::default(),
        )
        .unwrap();
        assert!(!d.is_fractional());
        assert_eq!(d.chosen, 2);
        assert_eq!(d.cost_floor, d.cost_ceiling);
    }

    #[test]
    fn test_unsupplied_energy_favours_ceiling() {
        let ctx = context(2050.0);
        for policy in [RoundingPolicy::Gain, RoundingPolicy::Neutral, RoundingPolicy::Loss] {
            let d = decide_hour(
                &ctx,
                2.05,
                policy,
                OfflinePolicy::QuantityGreedy,
                &SolverParameters::default(),
            )
            .unwrap();
            assert_eq!((d.floor, d.ceiling), (2, 3));
            assert!((d.cost_floor - 150_002.0).abs() < 1e-3);
            assert!((d.cost_ceiling - 105_003.0).abs() < 1e-3);
            assert_eq!(d.chosen, 3, "{policy:?}");
        }
    }

    #[test]
    fn test_policy_changes_choice_near_break_even() {
        // floor leaves 10 MW unsupplied, ceiling runs 90 MW above target
        let mut ctx = context(2010.0);
        ctx.unsupplied_energy_cost = 100.0;
        ctx.startup_cost = 5000.0;
        let params = SolverParameters::default();
        let run = |p| decide_hour(&ctx, 2.01, p, OfflinePolicy::QuantityGreedy, &params).unwrap();

        let gain = run(RoundingPolicy::Gain);
        assert!(gain.cost_floor < gain.cost_ceiling);
        assert_eq!(gain.chosen, 2);
        assert_eq!(run(RoundingPolicy::Neutral).chosen, 2);
        // 101_002 + 5000 is not below 105_003
        assert_eq!(run(RoundingPolicy::Loss).chosen, 3);
    }

    #[test]
    fn test_ceiling_capped_by_unit_ceiling() {
        let mut ctx = context(2050.0);
        ctx.unit_ceiling = 2.0;
        let d = decide_hour(
            &ctx,
            2.05,
            RoundingPolicy::Gain,
            OfflinePolicy::QuantityGreedy,
            &SolverParameters::default(),
        )
        .unwrap();
        assert_eq!(d.chosen, 2);
        assert!(!d.is_fractional());

        let err = decide_hour(
            &ctx,
            3.0,
            RoundingPolicy::Gain,
            OfflinePolicy::QuantityGreedy,
            &SolverParameters::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HeuristicError::UnitCountAboveCeiling { .. }));
    }

    #[test]
    fn test_offline_counts_follow_option() {
        let mut ctx = context(1500.0);
        ctx.reserves.push(ReserveHourParams {
            kind: ReserveKind::up(ReserveCategory::Tertiary1),
            max_on: 100.0,
            max_off: 1000.0,
            cost_on: 1.0,
            cost_off: 2.0,
            non_supply_cost: 500.0,
            oversupply_cost: 0.0,
            target: 900.0,
        });
        let d = decide_hour(
            &ctx,
            1.5,
            RoundingPolicy::Gain,
            OfflinePolicy::QuantityGreedy,
            &SolverParameters::default(),
        )
        .unwrap();
        // one spare unit left when two are committed
        assert_eq!(d.floor, 1);
        assert_eq!(d.off_ceiling, vec![1]);
        for option in [d.floor, d.ceiling] {
            let off = if option == d.floor { &d.off_floor } else { &d.off_ceiling };
            assert!(option + off.iter().sum::<u32>() <= 3);
        }
    }
}
