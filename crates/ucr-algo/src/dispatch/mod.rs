//! Network-wide dispatch problem for one block: relaxed, integer or
//! minimum-generation commitment.

pub mod output;
pub mod problem;

pub use output::{ComponentOutput, OutputValues, VarOutput};
pub use problem::{build_problem, vars, CommitmentMode, DispatchProblem, SolvedDispatch};
