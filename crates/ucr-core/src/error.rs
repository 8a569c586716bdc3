//! Unified error types for the UCR crates
//!
//! [`UcrError`] is the common error representation at API boundaries.
//! Algorithm-level errors in `ucr-algo` convert into it.
//!
//! # Example
//!
//! ```ignore
//! use ucr_core::{UcrError, UcrResult};
//!
//! fn read_pmax(store: &ParameterStore) -> UcrResult<f64> {
//!     store.get_value("G1", "p_max", 0, 0)
//! }
//! ```

use thiserror::Error;

/// Unified error type for all UCR operations.
#[derive(Error, Debug)]
pub enum UcrError {
    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A parameter was read that was never registered in the store
    #[error("missing parameter '{parameter}' for component '{component}'")]
    MissingParameter { component: String, parameter: String },
}

/// Convenience type alias for Results using UcrError.
pub type UcrResult<T> = Result<T, UcrError>;

impl UcrError {
    pub fn missing(component: impl Into<String>, parameter: impl Into<String>) -> Self {
        UcrError::MissingParameter {
            component: component.into(),
            parameter: parameter.into(),
        }
    }
}
