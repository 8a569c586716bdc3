//! Solver facade.
//!
//! A thin layer over `good_lp`: callers declare bounded continuous or
//! integer variables, linear constraints and a linear objective to minimise,
//! then get back either the optimal values or a [`SolveError`]. No retry
//! with relaxed parameters is attempted; a non-optimal outcome is reported
//! as is.
//!
//! The backend is chosen at run time among those compiled in:
//!
//! | Backend | Feature | Integer variables |
//! |---------|---------|-------------------|
//! | [`SolverBackend::MicroLp`] | `solver-microlp` (default) | yes |
//! | [`SolverBackend::Highs`] | `solver-highs` | yes |

use good_lp::{
    variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverBackend {
    #[default]
    #[serde(rename = "microlp")]
    MicroLp,
    Highs,
}

impl SolverBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverBackend::MicroLp => "microlp",
            SolverBackend::Highs => "highs",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SolverBackend::MicroLp => cfg!(feature = "solver-microlp"),
            SolverBackend::Highs => cfg!(feature = "solver-highs"),
        }
    }
}

impl std::str::FromStr for SolverBackend {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "microlp" | "default" => Ok(SolverBackend::MicroLp),
            "highs" => Ok(SolverBackend::Highs),
            other => Err(SolveError::Unavailable(format!(
                "unknown solver '{other}'; supported values: microlp, highs"
            ))),
        }
    }
}

/// Parameters passed to every solve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolverParameters {
    pub backend: SolverBackend,
    /// Backend log output (HiGHS only)
    pub verbose: bool,
    /// Wall-clock limit in seconds (HiGHS only)
    pub time_limit_seconds: Option<f64>,
}

/// Outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SolveError {
    #[error("problem is infeasible")]
    Infeasible,
    #[error("problem is unbounded")]
    Unbounded,
    #[error("solver backend unavailable: {0}")]
    Unavailable(String),
    #[error("solver failed: {0}")]
    Backend(String),
}

impl SolveError {
    pub fn status(&self) -> SolveStatus {
        match self {
            SolveError::Infeasible => SolveStatus::Infeasible,
            SolveError::Unbounded => SolveStatus::Unbounded,
            SolveError::Unavailable(_) | SolveError::Backend(_) => SolveStatus::Error,
        }
    }
}

impl From<ResolutionError> for SolveError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => SolveError::Infeasible,
            ResolutionError::Unbounded => SolveError::Unbounded,
            other => SolveError::Backend(other.to_string()),
        }
    }
}

/// A linear (or mixed-integer) minimisation problem under construction.
pub struct LinearProgram {
    vars: ProblemVariables,
    declared: Vec<Variable>,
    n_integer: usize,
    objective: Expression,
    constraints: Vec<Constraint>,
}

impl Default for LinearProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearProgram {
    pub fn new() -> Self {
        Self {
            vars: ProblemVariables::new(),
            declared: Vec::new(),
            n_integer: 0,
            objective: Expression::from(0.0),
            constraints: Vec::new(),
        }
    }

    /// Continuous variable in `[min, max]`. Use `f64::INFINITY` for no
    /// upper bound.
    pub fn continuous(&mut self, min: f64, max: f64) -> Variable {
        let v = self.vars.add(variable().min(min).max(max));
        self.declared.push(v);
        v
    }

    pub fn integer(&mut self, min: f64, max: f64) -> Variable {
        let v = self.vars.add(variable().integer().min(min).max(max));
        self.declared.push(v);
        self.n_integer += 1;
        v
    }

    /// Continuous or integer depending on `integer`.
    pub fn var(&mut self, min: f64, max: f64, integer: bool) -> Variable {
        if integer {
            self.integer(min, max)
        } else {
            self.continuous(min, max)
        }
    }

    pub fn add_objective(&mut self, term: impl Into<Expression>) {
        self.objective += term.into();
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn num_variables(&self) -> usize {
        self.declared.len()
    }

    pub fn num_integer(&self) -> usize {
        self.n_integer
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn solve(self, params: &SolverParameters) -> Result<LpSolution, SolveError> {
        let start = Instant::now();
        if self.declared.is_empty() {
            return Ok(LpSolution {
                objective: 0.0,
                values: HashMap::new(),
                solve_time: start.elapsed(),
            });
        }
        match params.backend {
            SolverBackend::MicroLp => self.solve_microlp(start),
            SolverBackend::Highs => self.solve_highs(params, start),
        }
    }

    #[cfg(feature = "solver-microlp")]
    fn solve_microlp(self, start: Instant) -> Result<LpSolution, SolveError> {
        let LinearProgram {
            vars,
            declared,
            objective,
            constraints,
            ..
        } = self;
        let mut model = vars
            .minimise(objective.clone())
            .using(good_lp::solvers::microlp::microlp);
        for c in constraints {
            model = model.with(c);
        }
        let solution = model.solve()?;
        Ok(LpSolution::extract(&solution, &declared, objective, start))
    }

    #[cfg(not(feature = "solver-microlp"))]
    fn solve_microlp(self, _start: Instant) -> Result<LpSolution, SolveError> {
        Err(SolveError::Unavailable(
            "microlp (build with the `solver-microlp` feature)".into(),
        ))
    }

    #[cfg(feature = "solver-highs")]
    fn solve_highs(self, params: &SolverParameters, start: Instant) -> Result<LpSolution, SolveError> {
        let LinearProgram {
            vars,
            declared,
            objective,
            constraints,
            ..
        } = self;
        let mut model = vars
            .minimise(objective.clone())
            .using(good_lp::solvers::highs::highs)
            .set_verbose(params.verbose);
        if let Some(limit) = params.time_limit_seconds {
            model = model.set_time_limit(limit);
        }
        for c in constraints {
            model = model.with(c);
        }
        let solution = model.solve()?;
        Ok(LpSolution::extract(&solution, &declared, objective, start))
    }

    #[cfg(not(feature = "solver-highs"))]
    fn solve_highs(self, _params: &SolverParameters, _start: Instant) -> Result<LpSolution, SolveError> {
        Err(SolveError::Unavailable(
            "highs (build with the `solver-highs` feature)".into(),
        ))
    }
}

/// Optimal values of a solved [`LinearProgram`].
#[derive(Debug, Clone)]
pub struct LpSolution {
    pub objective: f64,
    values: HashMap<Variable, f64>,
    pub solve_time: Duration,
}

impl LpSolution {
    #[allow(dead_code)]
    fn extract<S: Solution>(
        solution: &S,
        declared: &[Variable],
        objective: Expression,
        start: Instant,
    ) -> Self {
        let values = declared
            .iter()
            .map(|&v| (v, solution.value(v)))
            .collect();
        Self {
            objective: solution.eval(objective),
            values,
            solve_time: start.elapsed(),
        }
    }

    pub fn value(&self, v: Variable) -> f64 {
        self.values.get(&v).copied().unwrap_or(0.0)
    }
}
