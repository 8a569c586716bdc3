//! Deterministic rounding of fractional unit counts.

use serde::{Deserialize, Serialize};
use ucr_core::pre_round;

use crate::error::{HeuristicError, HeuristicResult};

/// Floor and ceiling of a guide value after pre-rounding.
///
/// An integer guide (up to solver noise) yields `floor == ceiling`.
pub fn round(guide: f64) -> HeuristicResult<(u32, u32)> {
    round_at(0, guide)
}

/// [`round`] with the step index reported on error.
pub fn round_at(step: usize, guide: f64) -> HeuristicResult<(u32, u32)> {
    let value = pre_round(guide);
    if value.is_nan() || value < 0.0 {
        return Err(HeuristicError::NegativeGuide { step, value: guide });
    }
    Ok((value.floor() as u32, value.ceil() as u32))
}

/// Ceiling of every step of a guide.
pub fn ceil_all(guide: &[f64]) -> HeuristicResult<Vec<u32>> {
    guide
        .iter()
        .enumerate()
        .map(|(t, &g)| round_at(t, g).map(|(_, c)| c))
        .collect()
}

/// Cost comparison rule between the floor and ceiling options of an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoundingPolicy {
    /// Floor wins if `cost(floor) < cost(ceiling) + startup`
    #[default]
    #[serde(rename = "gain")]
    Gain,
    /// Floor wins if `cost(floor) < cost(ceiling)`
    #[serde(rename = "sans", alias = "neutral")]
    Neutral,
    /// Floor wins if `cost(floor) + startup < cost(ceiling)`
    #[serde(rename = "perte", alias = "loss")]
    Loss,
}

impl RoundingPolicy {
    /// Number of startup costs credited to the ceiling side.
    pub fn startup_cost_multiplier(&self) -> f64 {
        match self {
            RoundingPolicy::Gain => 1.0,
            RoundingPolicy::Neutral => 0.0,
            RoundingPolicy::Loss => -1.0,
        }
    }

    pub fn prefers_floor(&self, cost_floor: f64, cost_ceiling: f64, startup_cost: f64) -> bool {
        prefers_floor(
            cost_floor,
            cost_ceiling,
            startup_cost,
            self.startup_cost_multiplier(),
        )
    }
}

impl std::str::FromStr for RoundingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gain" => Ok(RoundingPolicy::Gain),
            "sans" | "neutral" => Ok(RoundingPolicy::Neutral),
            "perte" | "loss" => Ok(RoundingPolicy::Loss),
            other => Err(format!(
                "unknown rounding policy '{other}' (expected gain, sans or perte)"
            )),
        }
    }
}

/// `cost_floor < cost_ceiling + multiplier * startup_cost`
pub fn prefers_floor(cost_floor: f64, cost_ceiling: f64, startup_cost: f64, multiplier: f64) -> bool {
    cost_floor < cost_ceiling + multiplier * startup_cost
}
