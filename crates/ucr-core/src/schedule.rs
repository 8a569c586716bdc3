//! Time blocks, fractional guides and integer schedules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use crate::{ReserveKind, UcrError, UcrResult};

/// Decimal digits kept before classifying a value as integer or fractional.
pub const ROUNDING_DIGITS: i32 = 12;

/// Round to [`ROUNDING_DIGITS`] decimal digits.
///
/// Solver output such as `2.0000000000004` becomes `2.0`, so floor and
/// ceiling agree on values that are integer up to noise.
pub fn pre_round(value: f64) -> f64 {
    let scale = 10f64.powi(ROUNDING_DIGITS);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A contiguous run of hours resolved as one optimization instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: usize,
    hours: Vec<usize>,
}

impl TimeBlock {
    pub fn new(id: usize, hours: Range<usize>) -> Self {
        Self {
            id,
            hours: hours.collect(),
        }
    }

    /// Split `horizon` hours into consecutive blocks of `block_len` hours.
    /// The last block may be shorter.
    pub fn split(horizon: usize, block_len: usize) -> Vec<TimeBlock> {
        if block_len == 0 {
            return Vec::new();
        }
        (0..horizon)
            .step_by(block_len)
            .enumerate()
            .map(|(id, start)| TimeBlock::new(id, start..(start + block_len).min(horizon)))
            .collect()
    }

    pub fn hours(&self) -> &[usize] {
        &self.hours
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// Absolute hour of the `t`-th step of the block.
    pub fn hour(&self, t: usize) -> usize {
        self.hours[t]
    }
}

/// Hourly equivalent number of committed units from a relaxed solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FractionalGuide(Vec<f64>);

impl FractionalGuide {
    /// Build a guide, pre-rounding every value. Negative or non-finite values
    /// are rejected.
    pub fn new(values: Vec<f64>) -> UcrResult<Self> {
        let mut rounded = Vec::with_capacity(values.len());
        for (t, value) in values.into_iter().enumerate() {
            if !value.is_finite() {
                return Err(UcrError::Validation(format!(
                    "guide value at step {t} is not finite"
                )));
            }
            let value = pre_round(value);
            if value < 0.0 {
                return Err(UcrError::Validation(format!(
                    "guide value at step {t} is negative ({value})"
                )));
            }
            rounded.push(value);
        }
        Ok(Self(rounded))
    }

    /// Check `0 <= guide[t] <= ceiling[t]` for every step.
    pub fn check_ceiling(&self, ceiling: &[f64]) -> UcrResult<()> {
        for (t, (&g, &c)) in self.0.iter().zip(ceiling).enumerate() {
            if g > pre_round(c) {
                return Err(UcrError::Validation(format!(
                    "guide value {g} exceeds unit ceiling {c} at step {t}"
                )));
            }
        }
        Ok(())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Integer commitment of one cluster over a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerSchedule {
    /// Committed units per step
    pub nb_on: Vec<u32>,
    /// Units held offline for a reserve kind, per step
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nb_off: BTreeMap<ReserveKind, Vec<u32>>,
}

impl IntegerSchedule {
    pub fn from_on(nb_on: Vec<u32>) -> Self {
        Self {
            nb_on,
            nb_off: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nb_on.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nb_on.is_empty()
    }

    pub fn off(&self, kind: ReserveKind, t: usize) -> u32 {
        self.nb_off.get(&kind).and_then(|v| v.get(t)).copied().unwrap_or(0)
    }

    /// Check `nb_on + nb_off[kind] <= ceiling` for every step and kind.
    pub fn check_ceiling(&self, ceiling: &[f64]) -> UcrResult<()> {
        for (t, &c) in ceiling.iter().enumerate().take(self.nb_on.len()) {
            let on = self.nb_on[t];
            let limit = pre_round(c);
            if f64::from(on) > limit {
                return Err(UcrError::Validation(format!(
                    "{on} committed units exceed ceiling {c} at step {t}"
                )));
            }
            for (kind, off) in &self.nb_off {
                let total = on + off.get(t).copied().unwrap_or(0);
                if f64::from(total) > limit {
                    return Err(UcrError::Validation(format!(
                        "{total} units ({kind}) exceed ceiling {c} at step {t}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of unit starts, counting the block as cyclic.
    pub fn starts(&self) -> u32 {
        let n = self.nb_on.len();
        (0..n)
            .map(|t| {
                let prev = self.nb_on[(t + n - 1) % n];
                self.nb_on[t].saturating_sub(prev)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReserveCategory;

    #[test]
    fn test_pre_round_removes_noise() {
        assert_eq!(pre_round(2.000_000_000_000_4), 2.0);
        assert_eq!(pre_round(1.999_999_999_999_8), 2.0);
        assert_eq!(pre_round(2.05), 2.05);
        assert_eq!(pre_round(-1e-14), 0.0);
    }

    #[test]
    fn test_split_blocks() {
        let blocks = TimeBlock::split(10, 4);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].hours(), &[0, 1, 2, 3]);
        assert_eq!(blocks[2].hours(), &[8, 9]);
        assert_eq!(blocks[2].id, 2);
        assert!(TimeBlock::split(10, 0).is_empty());
    }

    #[test]
    fn test_guide_rejects_negative() {
        assert!(FractionalGuide::new(vec![1.0, -0.5]).is_err());
        assert!(FractionalGuide::new(vec![f64::NAN]).is_err());
        let g = FractionalGuide::new(vec![1.0, -1e-15]).unwrap();
        assert_eq!(g.values(), &[1.0, 0.0]);
    }

    #[test]
    fn test_guide_ceiling() {
        let g = FractionalGuide::new(vec![2.0, 2.05, 2.0]).unwrap();
        assert!(g.check_ceiling(&[3.0, 3.0, 3.0]).is_ok());
        assert!(g.check_ceiling(&[3.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_schedule_ceiling_check() {
        let kind = ReserveKind::up(ReserveCategory::Tertiary1);
        let mut s = IntegerSchedule::from_on(vec![2, 3]);
        s.nb_off.insert(kind, vec![1, 0]);
        assert!(s.check_ceiling(&[3.0, 3.0]).is_ok());
        s.nb_off.insert(kind, vec![1, 1]);
        assert!(s.check_ceiling(&[3.0, 3.0]).is_err());
        assert_eq!(s.off(kind, 1), 1);
    }

    #[test]
    fn test_cyclic_starts() {
        let s = IntegerSchedule::from_on(vec![2, 2, 3, 2, 2]);
        assert_eq!(s.starts(), 1);
        let s = IntegerSchedule::from_on(vec![0, 1, 0, 1]);
        assert_eq!(s.starts(), 2);
    }
}
