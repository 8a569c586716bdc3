//! Errors raised by the rounding heuristics.

use thiserror::Error;
use ucr_core::UcrError;

use crate::solver::SolveError;

#[derive(Debug, Error)]
pub enum HeuristicError {
    #[error("guide value {value} at step {step} is negative")]
    NegativeGuide { step: usize, value: f64 },

    #[error("{units} units at step {step} exceed the unit ceiling {ceiling}")]
    UnitCountAboveCeiling { step: usize, units: u32, ceiling: f64 },

    #[error("{context}: {source}")]
    Solve {
        context: String,
        #[source]
        source: SolveError,
    },

    #[error("relaxed solve did not reach optimality ({0})")]
    RelaxedNotOptimal(String),

    #[error(transparent)]
    Data(#[from] UcrError),
}

impl HeuristicError {
    pub fn solve(context: impl Into<String>, source: SolveError) -> Self {
        HeuristicError::Solve {
            context: context.into(),
            source,
        }
    }

    /// Infeasible sub-problem, as opposed to a backend failure.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            HeuristicError::Solve {
                source: SolveError::Infeasible,
                ..
            }
        )
    }
}

impl From<HeuristicError> for UcrError {
    fn from(err: HeuristicError) -> Self {
        match err {
            HeuristicError::Data(inner) => inner,
            HeuristicError::Solve { .. } | HeuristicError::RelaxedNotOptimal(_) => {
                UcrError::Solver(err.to_string())
            }
            other => UcrError::Validation(other.to_string()),
        }
    }
}

pub type HeuristicResult<T> = Result<T, HeuristicError>;
