//! Local extrema correction of an hour-by-hour rounded trajectory.
//!
//! A one-hour bump costs a start and a stop, a one-hour dip costs a restart.
//! The pass revisits every fractional hour that sits on a local extremum and
//! re-applies the floor/ceiling comparison with the startup costs such a
//! shape implies:
//!
//! | Position | Shape | Floor kept if |
//! |----------|-------|---------------|
//! | interior | bump | `cost_floor < cost_ceiling + 2·startup` |
//! | interior | dip | `cost_floor < cost_ceiling − startup` |
//! | boundary | bump | `cost_floor < cost_ceiling + startup` |
//! | boundary | dip | `cost_floor < cost_ceiling − startup` |
//!
//! Hours are visited in order and see the corrections already applied to
//! their predecessors.

use crate::reserve::decision::RoundingDecision;
use crate::rounding::prefers_floor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Bump,
    Dip,
}

fn classify(value: u32, neighbours: &[u32]) -> Option<Extremum> {
    if neighbours.is_empty() {
        None
    } else if neighbours.iter().all(|&n| value > n) {
        Some(Extremum::Bump)
    } else if neighbours.iter().all(|&n| value < n) {
        Some(Extremum::Dip)
    } else {
        None
    }
}

/// Smooth the chosen values in place and return the resulting trajectory.
pub fn smooth(decisions: &mut [RoundingDecision]) -> Vec<u32> {
    let len = decisions.len();
    for t in 0..len {
        if !decisions[t].is_fractional() {
            continue;
        }
        let mut neighbours = Vec::with_capacity(2);
        if t > 0 {
            neighbours.push(decisions[t - 1].chosen);
        }
        if t + 1 < len {
            neighbours.push(decisions[t + 1].chosen);
        }
        let interior = neighbours.len() == 2;

        let d = &mut decisions[t];
        let multiplier = match (classify(d.chosen, &neighbours), interior) {
            (Some(Extremum::Bump), true) => 2.0,
            (Some(Extremum::Bump), false) => 1.0,
            (Some(Extremum::Dip), _) => -1.0,
            (None, _) => continue,
        };
        d.chosen = if prefers_floor(d.cost_floor, d.cost_ceiling, d.startup_cost, multiplier) {
            d.floor
        } else {
            d.ceiling
        };
    }
    decisions.iter().map(|d| d.chosen).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(step: usize, floor: u32, cost_floor: f64, cost_ceiling: f64, chosen: u32) -> RoundingDecision {
        RoundingDecision {
            step,
            floor,
            ceiling: floor + 1,
            cost_floor,
            cost_ceiling,
            startup_cost: 100.0,
            off_floor: Vec::new(),
            off_ceiling: Vec::new(),
            chosen,
        }
    }

    fn fixed(step: usize, value: u32) -> RoundingDecision {
        RoundingDecision {
            step,
            floor: value,
            ceiling: value,
            cost_floor: 0.0,
            cost_ceiling: 0.0,
            startup_cost: 100.0,
            off_floor: Vec::new(),
            off_ceiling: Vec::new(),
            chosen: value,
        }
    }

    #[test]
    fn test_interior_bump_is_flattened() {
        // ceiling was 150 cheaper, but two startup costs tip it back
        let mut d = vec![fixed(0, 2), decision(1, 2, 1150.0, 1000.0, 3), fixed(2, 2)];
        assert_eq!(smooth(&mut d), vec![2, 2, 2]);
    }

    #[test]
    fn test_interior_bump_kept_when_much_cheaper() {
        let mut d = vec![fixed(0, 2), decision(1, 2, 1250.0, 1000.0, 3), fixed(2, 2)];
        assert_eq!(smooth(&mut d), vec![2, 3, 2]);
    }

    #[test]
    fn test_interior_dip_is_filled() {
        // floor was 50 cheaper, less than one restart
        let mut d = vec![fixed(0, 3), decision(1, 2, 950.0, 1000.0, 2), fixed(2, 3)];
        assert_eq!(smooth(&mut d), vec![3, 3, 3]);

        let mut d = vec![fixed(0, 3), decision(1, 2, 850.0, 1000.0, 2), fixed(2, 3)];
        assert_eq!(smooth(&mut d), vec![3, 2, 3]);
    }

    #[test]
    fn test_boundary_uses_one_startup() {
        let mut d = vec![decision(0, 2, 1050.0, 1000.0, 3), fixed(1, 2)];
        assert_eq!(smooth(&mut d), vec![2, 2]);

        let mut d = vec![fixed(0, 2), decision(1, 2, 1150.0, 1000.0, 3)];
        assert_eq!(smooth(&mut d), vec![2, 3]);
    }

    #[test]
    fn test_monotone_steps_untouched() {
        let mut d = vec![fixed(0, 1), decision(1, 1, 900.0, 1000.0, 2), fixed(2, 3)];
        assert_eq!(smooth(&mut d), vec![1, 2, 3]);
        assert_eq!(smooth(&mut []), Vec::<u32>::new());
    }
}
