//! Duration correction of an integer commitment trajectory.
//!
//! Solves a small integer program over the whole block for one cluster:
//!
//! ```text
//! min  Σ_t nb_on[t]
//!
//! s.t. lower[t] ≤ nb_on[t] ≤ unit_limit[t]                    (integer)
//!      nb_on[t] = nb_on[t−1] + start[t] − stop[t]              (cyclic)
//!      0 ≤ failures[t] ≤ min(stop[t], nb_failures[t])
//!      nb_on[t] ≥ Σ_{k=t−d_up+1..t} (start[k] − failures[k])
//!      min_down_units[t] − nb_on[t] ≥ Σ_{k=t−d_down+1..t} stop[k]
//! ```
//!
//! so the result is the smallest trajectory above `lower` that honours
//! minimum up and down times.

use good_lp::{constraint, Expression, Variable};
use tracing::debug;

use crate::cluster::ClusterView;
use crate::error::{HeuristicError, HeuristicResult};
use crate::solver::{LinearProgram, SolverParameters};

/// Whether [`correct_durations`] would return `lower` unchanged without
/// solving.
pub fn skips_correction(view: &ClusterView, lower: &[u32]) -> bool {
    view.has_trivial_durations() || lower.windows(2).all(|w| w[0] == w[1])
}

/// Smallest trajectory above `lower` compatible with the cluster's minimum
/// up and down times.
pub fn correct_durations(
    view: &ClusterView,
    lower: &[u32],
    params: &SolverParameters,
) -> HeuristicResult<Vec<u32>> {
    for (t, &units) in lower.iter().enumerate() {
        if units > view.unit_limit(t) {
            return Err(HeuristicError::UnitCountAboveCeiling {
                step: t,
                units,
                ceiling: view.nb_units_max[t],
            });
        }
    }
    if skips_correction(view, lower) {
        debug!(cluster = %view.id, "duration correction skipped");
        return Ok(lower.to_vec());
    }

    let len = lower.len();
    let mut lp = LinearProgram::new();
    let mut nb_on: Vec<Variable> = Vec::with_capacity(len);
    let mut start = Vec::with_capacity(len);
    let mut stop = Vec::with_capacity(len);
    let mut failures = Vec::with_capacity(len);

    for (t, &low) in lower.iter().enumerate() {
        let limit = f64::from(view.unit_limit(t));
        nb_on.push(lp.integer(f64::from(low), limit));
        start.push(lp.continuous(0.0, limit));
        stop.push(lp.continuous(0.0, limit));
        failures.push(lp.continuous(0.0, view.nb_failures[t].max(0.0)));
    }

    for t in 0..len {
        let prev = (t + len - 1) % len;
        lp.add_constraint(constraint!(nb_on[t] == nb_on[prev] + start[t] - stop[t]));
        lp.add_constraint(constraint!(failures[t] <= stop[t]));

        let mut started = Expression::from(0.0);
        for k in window(t, view.d_min_up, len) {
            started += start[k] - failures[k];
        }
        lp.add_constraint(constraint!(nb_on[t] >= started));

        let mut stopped = Expression::from(0.0);
        for k in window(t, view.d_min_down, len) {
            stopped += stop[k];
        }
        lp.add_constraint(constraint!(nb_on[t] + stopped <= view.min_down_units[t]));

        lp.add_objective(nb_on[t]);
    }

    let solution = lp
        .solve(params)
        .map_err(|e| HeuristicError::solve(format!("duration correction of {}", view.id), e))?;
    let corrected: Vec<u32> = nb_on
        .iter()
        .map(|&v| solution.value(v).round().max(0.0) as u32)
        .collect();

    debug!(
        cluster = %view.id,
        added = corrected.iter().sum::<u32>().saturating_sub(lower.iter().sum::<u32>()),
        "duration correction done"
    );
    Ok(corrected)
}

/// Cyclic window of `width` steps ending at `t`.
pub(crate) fn window(t: usize, width: usize, len: usize) -> impl Iterator<Item = usize> {
    let width = width.clamp(1, len.max(1));
    (0..width).map(move |i| (t + len - i) % len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucr_core::{params, ClusterSpec, Network, NodeSpec, ParameterStore, TimeBlock};

    fn view(len: usize, d_up: f64, d_down: f64, units: f64) -> ClusterView {
        let network = Network::new()
            .with_node(NodeSpec::new("N"))
            .with_cluster(ClusterSpec::new("G", "N"));
        let mut store = ParameterStore::new();
        store.add_data("N", params::UNSUPPLIED_ENERGY_COST, 1000.0);
        store.add_data("N", params::SPILLAGE_COST, 0.0);
        for (name, value) in [
            (params::P_MAX, 1000.0),
            (params::P_MIN, 700.0),
            (params::COST, 50.0),
            (params::STARTUP_COST, 50.0),
            (params::FIXED_COST, 1.0),
            (params::NB_UNITS_MIN, 0.0),
            (params::NB_UNITS_MAX, units),
            (params::D_MIN_UP, d_up),
            (params::D_MIN_DOWN, d_down),
        ] {
            store.add_data("G", name, value);
        }
        ClusterView::load(&network, &store, "G", &TimeBlock::new(0, 0..len), 0).unwrap()
    }

    #[test]
    fn test_window_wraps() {
        assert_eq!(window(1, 3, 5).collect::<Vec<_>>(), vec![1, 0, 4]);
        assert_eq!(window(2, 10, 4).count(), 4);
    }

    #[test]
    fn test_min_up_extends_short_run() {
        let v = view(8, 3.0, 1.0, 3.0);
        let lower = vec![1, 1, 2, 1, 1, 1, 1, 1];
        let corrected = correct_durations(&v, &lower, &SolverParameters::default()).unwrap();
        // aggregated min-up is met by the unit that stays on
        assert_eq!(corrected, lower);
    }

    #[test]
    fn test_min_down_fills_short_gap() {
        // all units must stay off for 3 hours once stopped
        let v = view(8, 1.0, 3.0, 1.0);
        let lower = vec![1, 1, 0, 1, 1, 1, 1, 1];
        let corrected = correct_durations(&v, &lower, &SolverParameters::default()).unwrap();
        assert_eq!(corrected, vec![1; 8]);
    }

    #[test]
    fn test_min_up_of_single_unit() {
        let v = view(8, 3.0, 1.0, 1.0);
        let lower = vec![0, 0, 1, 0, 0, 0, 0, 0];
        let corrected = correct_durations(&v, &lower, &SolverParameters::default()).unwrap();
        assert_eq!(corrected.iter().sum::<u32>(), 3);
        let on: Vec<usize> = (0..8).filter(|&t| corrected[t] == 1).collect();
        assert!(on.contains(&2));
        assert!(on.windows(2).all(|w| w[1] == w[0] + 1), "{corrected:?}");
    }

    #[test]
    fn test_trivial_durations_and_flat_guides_skip() {
        let v = view(4, 1.0, 1.0, 3.0);
        assert!(skips_correction(&v, &[0, 3, 0, 3]));
        let v = view(4, 3.0, 3.0, 3.0);
        assert!(skips_correction(&v, &[2, 2, 2, 2]));
        assert!(!skips_correction(&v, &[2, 3, 2, 2]));
    }

    #[test]
    fn test_lower_above_limit_rejected() {
        let v = view(4, 3.0, 3.0, 2.0);
        let err = correct_durations(&v, &[2, 3, 2, 2], &SolverParameters::default()).unwrap_err();
        assert!(matches!(err, HeuristicError::UnitCountAboveCeiling { step: 1, .. }));
    }
}
