//! Single-hour energy and reserve allocation for a fixed number of
//! committed units.
//!
//! Given `n` committed units the LP splits the cluster's energy and reserve
//! targets between online production, online reserve participation and
//! participation of units held offline, at minimum cost:
//!
//! ```text
//! min  cost·E + ue·unsupplied + spill_cost·spill + fixed·n
//!    + Σ_k (cost_on_k·on_k + cost_off_k·off_k + ns_k·short_k + os_k·over_k)
//!
//! s.t. E + unsupplied − spill            = energy_target
//!      on_k + off_k + short_k − over_k   = target_k
//!      E + Σ_up on_k                     ≤ n·p_max
//!      E − Σ_down on_k                   ≥ n·p_min
//!      on_k                              ≤ n·max_on_k
//!      nb_off_k·p_min ≤ off_k            ≤ nb_off_k·max_off_k
//!      Σ_k off_k                         ≤ (ceiling − n)·p_max
//!      Σ_k nb_off_k                      ≤ ceiling − n
//! ```
//!
//! Offline unit counts are either continuous (first pass, to size the
//! offline need) or fixed to integers chosen by the offline allocator.

use good_lp::{constraint, Expression, Variable};

use crate::cluster::ClusterHourContext;
use crate::solver::{LinearProgram, SolveError, SolverParameters};

/// How offline unit counts enter the allocation LP.
#[derive(Debug, Clone, Copy)]
pub enum OfflineCounts<'a> {
    /// Continuous in `[0, ceiling − n]`
    Continuous,
    /// Fixed, one count per reserve entry of the context
    Fixed(&'a [u32]),
}

/// Reserve split of one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReserveSplit {
    pub on: f64,
    pub off: f64,
    pub nb_off: f64,
    pub non_supplied: f64,
    pub oversupplied: f64,
}

/// Result of one allocation LP.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub nb_on: u32,
    /// Total cost, fixed cost of the committed units included
    pub cost: f64,
    pub energy: f64,
    pub unsupplied: f64,
    pub spillage: f64,
    /// One entry per reserve of the context, same order
    pub reserves: Vec<ReserveSplit>,
}

impl Allocation {
    /// Offline participation per reserve entry.
    pub fn offline_needs(&self) -> Vec<f64> {
        self.reserves.iter().map(|r| r.off).collect()
    }
}

struct ReserveVars {
    on: Variable,
    off: Option<(Variable, Variable)>,
    short: Variable,
    over: Variable,
}

/// Solve the allocation LP for `nb_on` committed units.
pub fn allocate(
    ctx: &ClusterHourContext,
    nb_on: u32,
    offline: OfflineCounts<'_>,
    params: &SolverParameters,
) -> Result<Allocation, SolveError> {
    let n = f64::from(nb_on);
    let spare = f64::from(ctx.spare_units(nb_on));
    let mut lp = LinearProgram::new();

    let energy = lp.continuous(0.0, f64::INFINITY);
    let unsupplied = lp.continuous(0.0, ctx.energy_target);
    let spill = lp.continuous(0.0, f64::INFINITY);
    lp.add_constraint(constraint!(energy + unsupplied - spill == ctx.energy_target));
    lp.add_objective(
        ctx.cost * energy + ctx.unsupplied_energy_cost * unsupplied + ctx.spillage_cost * spill,
    );
    lp.add_objective(Expression::from(ctx.fixed_cost * n));

    let mut up_draw = Expression::from(energy);
    let mut down_draw = Expression::from(energy);
    let mut offline_power = Expression::from(0.0);
    let mut offline_units = Expression::from(0.0);
    let mut any_offline = false;

    let mut reserve_vars = Vec::with_capacity(ctx.reserves.len());
    for (k, r) in ctx.reserves.iter().enumerate() {
        let on = lp.continuous(0.0, n * r.max_on.max(0.0));
        let short = lp.continuous(0.0, r.target);
        let over = lp.continuous(0.0, f64::INFINITY);

        let off = if r.offline_capable() {
            let nb_off = match offline {
                OfflineCounts::Continuous => lp.continuous(0.0, spare),
                OfflineCounts::Fixed(counts) => {
                    let c = f64::from(counts.get(k).copied().unwrap_or(0));
                    lp.continuous(c, c)
                }
            };
            let off = lp.continuous(0.0, f64::INFINITY);
            lp.add_constraint(constraint!(off <= r.max_off * nb_off));
            lp.add_constraint(constraint!(off >= ctx.p_min * nb_off));
            lp.add_objective(r.cost_off * off);
            offline_power += off;
            offline_units += nb_off;
            any_offline = true;
            Some((off, nb_off))
        } else {
            None
        };

        let supplied = match off {
            Some((off, _)) => on + off,
            None => Expression::from(on),
        };
        lp.add_constraint(constraint!(supplied + short - over == r.target));
        lp.add_objective(r.cost_on * on + r.non_supply_cost * short + r.oversupply_cost * over);

        if r.kind.is_up() {
            up_draw += on;
        } else {
            down_draw -= on;
        }
        reserve_vars.push(ReserveVars {
            on,
            off,
            short,
            over,
        });
    }

    lp.add_constraint(constraint!(up_draw <= n * ctx.p_max));
    lp.add_constraint(constraint!(down_draw >= n * ctx.p_min));
    if any_offline {
        lp.add_constraint(constraint!(offline_power <= spare * ctx.p_max));
        if matches!(offline, OfflineCounts::Continuous) {
            lp.add_constraint(constraint!(offline_units <= spare));
        }
    }

    let solution = lp.solve(params)?;
    let reserves = reserve_vars
        .iter()
        .map(|v| {
            let (off, nb_off) = v
                .off
                .map(|(off, nb)| (solution.value(off), solution.value(nb)))
                .unwrap_or((0.0, 0.0));
            ReserveSplit {
                on: solution.value(v.on),
                off,
                nb_off,
                non_supplied: solution.value(v.short),
                oversupplied: solution.value(v.over),
            }
        })
        .collect();

    Ok(Allocation {
        nb_on,
        cost: solution.objective,
        energy: solution.value(energy),
        unsupplied: solution.value(unsupplied),
        spillage: solution.value(spill),
        reserves,
    })
}
