//! Block-level commitment heuristics.
//!
//! - [`accurate`]: exact duration correction through a per-cluster integer
//!   program
//! - [`fast`]: slot-based floor, no integer program

pub mod accurate;
pub mod fast;

pub use accurate::{correct_durations, skips_correction};
pub use fast::{fast_schedule, slot_schedule};
