//! Reserve-aware rounding: per-hour allocation, offline unit counts,
//! floor/ceiling decisions and smoothing.

pub mod allocation;
pub mod decision;
pub mod offline;
pub mod smoothing;

pub use allocation::{allocate, Allocation, OfflineCounts, ReserveSplit};
pub use decision::{decide_block, decide_hour, evaluate_option, ClusterTargets, RoundingDecision};
pub use offline::{allocate_offline, OfflinePolicy};
pub use smoothing::smooth;
