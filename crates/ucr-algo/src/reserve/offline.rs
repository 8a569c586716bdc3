//! Offline unit counts for upward reserves.
//!
//! Starting from the continuous offline participation found by the
//! allocation LP, each reserve kind first gets the smallest unit count able
//! to carry its need (`ceil(need / max_off)`). Those counts may not fit in
//! the units left over by the committed ones:
//!
//! ```text
//! Σ_k nb_off_k · p_min ≤ (ceiling − n) · p_max
//! Σ_k nb_off_k         ≤ ceiling − n
//! ```
//!
//! The greedy policies then remove one unit at a time, always from the kind
//! ranked first by their scoring rule, until both inequalities hold. A
//! priority queue keeps the current marginal score of each kind, so the
//! number of iterations is bounded by the sum of the initial counts.
//! [`OfflinePolicy::Exact`] solves the same selection as a small integer
//! program instead.

use good_lp::{constraint, Expression};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;
use ucr_core::pre_round;

use crate::cluster::ClusterHourContext;
use crate::solver::{LinearProgram, SolveError, SolverParameters};

const CAPACITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OfflinePolicy {
    /// Remove from the kind with the smallest marginal quantity
    #[default]
    QuantityGreedy,
    /// Remove from the kind with the largest marginal offline cost
    CostGreedy,
    /// Remove from the kind with the largest marginal (offline − online) cost
    CostDifferenceGreedy,
    /// Remove from the kind with the smallest marginal (non-supply − offline) cost
    FailureCostGreedy,
    /// Integer program over the counts
    Exact,
}

impl OfflinePolicy {
    pub const ALL: [OfflinePolicy; 5] = [
        OfflinePolicy::QuantityGreedy,
        OfflinePolicy::CostGreedy,
        OfflinePolicy::CostDifferenceGreedy,
        OfflinePolicy::FailureCostGreedy,
        OfflinePolicy::Exact,
    ];
}

impl std::str::FromStr for OfflinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "quantity" | "quantity-greedy" => Ok(OfflinePolicy::QuantityGreedy),
            "cost" | "cost-greedy" => Ok(OfflinePolicy::CostGreedy),
            "cost-difference" | "cost-difference-greedy" => {
                Ok(OfflinePolicy::CostDifferenceGreedy)
            }
            "failure-cost" | "failure-cost-greedy" => Ok(OfflinePolicy::FailureCostGreedy),
            "exact" => Ok(OfflinePolicy::Exact),
            other => Err(format!("unknown offline policy '{other}'")),
        }
    }
}

/// Smallest count per reserve entry able to carry `needs`, capped by the
/// spare units. Kinds that cannot use offline units get zero.
pub fn initial_counts(ctx: &ClusterHourContext, nb_on: u32, needs: &[f64]) -> Vec<u32> {
    let spare = ctx.spare_units(nb_on);
    ctx.reserves
        .iter()
        .enumerate()
        .map(|(k, r)| {
            let need = needs.get(k).copied().unwrap_or(0.0);
            if !r.offline_capable() || pre_round(need) <= 0.0 {
                return 0;
            }
            let units = pre_round(need / r.max_off).ceil().max(0.0) as u32;
            units.min(spare)
        })
        .collect()
}

/// Whether `counts` fit in the units left by `nb_on` committed ones.
pub fn fits(ctx: &ClusterHourContext, nb_on: u32, counts: &[u32]) -> bool {
    let spare = ctx.spare_units(nb_on);
    let total: u32 = counts.iter().sum();
    let power = f64::from(total) * ctx.p_min;
    total <= spare && power <= f64::from(spare) * ctx.p_max + CAPACITY_TOLERANCE
}

/// Offline unit count per reserve entry of `ctx`.
pub fn allocate_offline(
    policy: OfflinePolicy,
    ctx: &ClusterHourContext,
    nb_on: u32,
    needs: &[f64],
    params: &SolverParameters,
) -> Result<Vec<u32>, SolveError> {
    let initial = initial_counts(ctx, nb_on, needs);
    match policy {
        OfflinePolicy::Exact => exact(ctx, nb_on, needs, &initial, params),
        greedy => Ok(reduce_greedy(greedy, ctx, nb_on, needs, initial)),
    }
}

/// Reserve quantity carried by the `count`-th unit of entry `k`.
fn marginal_quantity(ctx: &ClusterHourContext, needs: &[f64], k: usize, count: u32) -> f64 {
    let max_off = ctx.reserves[k].max_off;
    let need = needs.get(k).copied().unwrap_or(0.0).max(0.0);
    let carried = |c: u32| need.min(f64::from(c) * max_off);
    carried(count) - carried(count.saturating_sub(1))
}

/// Higher score is removed first.
fn removal_score(
    policy: OfflinePolicy,
    ctx: &ClusterHourContext,
    needs: &[f64],
    k: usize,
    count: u32,
) -> f64 {
    let r = &ctx.reserves[k];
    let m = marginal_quantity(ctx, needs, k, count);
    match policy {
        OfflinePolicy::QuantityGreedy => -m,
        OfflinePolicy::CostGreedy => r.cost_off * m,
        OfflinePolicy::CostDifferenceGreedy => (r.cost_off - r.cost_on) * m,
        OfflinePolicy::FailureCostGreedy => -(r.non_supply_cost - r.cost_off) * m,
        OfflinePolicy::Exact => 0.0,
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // max-heap on score, lowest index first on ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

fn reduce_greedy(
    policy: OfflinePolicy,
    ctx: &ClusterHourContext,
    nb_on: u32,
    needs: &[f64],
    mut counts: Vec<u32>,
) -> Vec<u32> {
    let mut heap: BinaryHeap<Candidate> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(index, &c)| Candidate {
            score: removal_score(policy, ctx, needs, index, c),
            index,
        })
        .collect();

    let budget: u32 = counts.iter().sum();
    for _ in 0..budget {
        if fits(ctx, nb_on, &counts) {
            break;
        }
        let Some(Candidate { index, score }) = heap.pop() else {
            break;
        };
        counts[index] -= 1;
        trace!(
            kind = %ctx.reserves[index].kind,
            score,
            remaining = counts[index],
            "removed offline unit"
        );
        if counts[index] > 0 {
            heap.push(Candidate {
                score: removal_score(policy, ctx, needs, index, counts[index]),
                index,
            });
        }
    }
    counts
}

fn exact(
    ctx: &ClusterHourContext,
    nb_on: u32,
    needs: &[f64],
    initial: &[u32],
    params: &SolverParameters,
) -> Result<Vec<u32>, SolveError> {
    if initial.iter().all(|&c| c == 0) {
        return Ok(initial.to_vec());
    }
    let spare = f64::from(ctx.spare_units(nb_on));
    let mut lp = LinearProgram::new();
    let mut units = Expression::from(0.0);
    let mut chosen = Vec::with_capacity(initial.len());

    for (k, r) in ctx.reserves.iter().enumerate() {
        let upper = f64::from(initial.get(k).copied().unwrap_or(0));
        let need = needs.get(k).copied().unwrap_or(0.0).max(0.0);
        let nb = lp.integer(0.0, upper);
        let served = lp.continuous(0.0, need);
        lp.add_constraint(constraint!(served <= r.max_off * nb));
        lp.add_objective((r.cost_off - r.non_supply_cost) * served);
        units += nb;
        chosen.push(nb);
    }
    lp.add_constraint(constraint!(units.clone() * ctx.p_min <= spare * ctx.p_max));
    lp.add_constraint(constraint!(units <= spare));

    let solution = lp.solve(params)?;
    Ok(chosen
        .into_iter()
        .map(|nb| solution.value(nb).round().max(0.0) as u32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ReserveHourParams;
    use ucr_core::{ReserveCategory, ReserveKind};

    fn reserve(category: ReserveCategory, cost_on: f64, cost_off: f64, ns: f64) -> ReserveHourParams {
        ReserveHourParams {
            kind: ReserveKind::up(category),
            max_on: 50.0,
            max_off: 100.0,
            cost_on,
            cost_off,
            non_supply_cost: ns,
            oversupply_cost: 0.0,
            target: 0.0,
        }
    }

    /// 5 units, p_min 80, p_max 100: with 2 committed, 3 spare units.
    fn context(reserves: Vec<ReserveHourParams>) -> ClusterHourContext {
        ClusterHourContext {
            step: 0,
            p_max: 100.0,
            p_min: 80.0,
            cost: 10.0,
            startup_cost: 100.0,
            fixed_cost: 1.0,
            unit_ceiling: 5.0,
            unsupplied_energy_cost: 1000.0,
            spillage_cost: 0.0,
            energy_target: 150.0,
            reserves,
        }
    }

    fn three_kinds() -> ClusterHourContext {
        context(vec![
            reserve(ReserveCategory::Primary, 1.0, 5.0, 100.0),
            reserve(ReserveCategory::Secondary, 1.0, 2.0, 300.0),
            reserve(ReserveCategory::Tertiary1, 4.0, 3.0, 50.0),
        ])
    }

    #[test]
    fn test_initial_counts() {
        let ctx = three_kinds();
        assert_eq!(initial_counts(&ctx, 2, &[150.0, 100.0, 1e-14]), vec![2, 1, 0]);
        // capped by spare units
        assert_eq!(initial_counts(&ctx, 4, &[150.0, 100.0, 30.0]), vec![1, 1, 1]);
    }

    #[test]
    fn test_greedy_policies_remove_expected_kind() {
        let ctx = three_kinds();
        // initial [2, 1, 1]: 4 units for 3 spare, remove one
        let needs = [130.0, 100.0, 90.0];
        let params = SolverParameters::default();
        let run = |p| allocate_offline(p, &ctx, 2, &needs, &params).unwrap();

        // marginals: primary 30 (second unit), secondary 100, tertiary1 90
        assert_eq!(run(OfflinePolicy::QuantityGreedy), vec![1, 1, 1]);
        // offline costs 5·30 = 150, 2·100 = 200, 3·90 = 270
        assert_eq!(run(OfflinePolicy::CostGreedy), vec![2, 1, 0]);
        // differences 4·30 = 120, 1·100 = 100, −1·90 = −90
        assert_eq!(run(OfflinePolicy::CostDifferenceGreedy), vec![1, 1, 1]);
        // failure margins 95·30 = 2850, 298·100 = 29800, 47·90 = 4230
        assert_eq!(run(OfflinePolicy::FailureCostGreedy), vec![1, 1, 1]);
    }

    #[test]
    fn test_all_policies_fit() {
        let ctx = three_kinds();
        let needs = [300.0, 250.0, 200.0];
        for policy in OfflinePolicy::ALL {
            for nb_on in 0..=5 {
                let counts =
                    allocate_offline(policy, &ctx, nb_on, &needs, &SolverParameters::default())
                        .unwrap();
                assert!(fits(&ctx, nb_on, &counts), "{policy:?} n={nb_on} {counts:?}");
            }
        }
    }

    #[test]
    fn test_feasible_counts_are_kept() {
        let ctx = three_kinds();
        let needs = [100.0, 100.0, 0.0];
        for policy in OfflinePolicy::ALL {
            let counts =
                allocate_offline(policy, &ctx, 2, &needs, &SolverParameters::default()).unwrap();
            assert_eq!(counts, vec![1, 1, 0], "{policy:?}");
        }
    }

    #[test]
    fn test_tie_removes_lowest_index() {
        let ctx = context(vec![
            reserve(ReserveCategory::Primary, 1.0, 2.0, 100.0),
            reserve(ReserveCategory::Secondary, 1.0, 2.0, 100.0),
        ]);
        let counts = reduce_greedy(
            OfflinePolicy::QuantityGreedy,
            &ctx,
            4,
            &[100.0, 100.0],
            vec![1, 1],
        );
        assert_eq!(counts, vec![0, 1]);
    }

    #[test]
    fn test_single_kind_policies_agree() {
        let ctx = context(vec![reserve(ReserveCategory::Tertiary1, 1.0, 2.0, 100.0)]);
        let needs = [420.0];
        let params = SolverParameters::default();
        for nb_on in 0..=5 {
            let reference =
                allocate_offline(OfflinePolicy::QuantityGreedy, &ctx, nb_on, &needs, &params)
                    .unwrap();
            for policy in OfflinePolicy::ALL {
                let counts = allocate_offline(policy, &ctx, nb_on, &needs, &params).unwrap();
                assert_eq!(counts, reference, "{policy:?} n={nb_on}");
            }
        }
    }
}
