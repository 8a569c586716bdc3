//! # ucr-core: Unit-Commitment Rounding Core Types
//!
//! Data model shared by the rounding heuristics and the dispatch problem.
//!
//! ## Design
//!
//! The network description ([`Network`]) is purely structural: nodes,
//! thermal clusters attached to nodes, and caps on the combined generation
//! of several clusters. Every numeric value lives in the
//! [`ParameterStore`], addressed by `(component, parameter, hour,
//! scenario)`. Heuristics communicate their decisions to the final solve
//! only through explicit writes to that store.
//!
//! ## Core Data Structures
//!
//! - [`TimeBlock`] - contiguous hours resolved together (typically a week)
//! - [`FractionalGuide`] - relaxed "equivalent committed units" trajectory
//! - [`IntegerSchedule`] - integer committed and offline-for-reserve counts
//! - [`ReserveKind`] - reserve category and direction
//! - [`Diagnostics`] - validation findings
//!
//! ## Quick Start
//!
//! ```rust
//! use ucr_core::*;
//!
//! let network = Network::new()
//!     .with_node(NodeSpec::new("N"))
//!     .with_cluster(ClusterSpec::new("G", "N"));
//!
//! let mut store = ParameterStore::new();
//! store.add_data("N", params::DEMAND, vec![2000.0; 168]);
//! store.add_data("G", params::P_MAX, 1000.0);
//!
//! assert_eq!(store.get_value("G", params::P_MAX, 12, 0).unwrap(), 1000.0);
//! assert!(network.cluster("G").is_some());
//! ```

pub mod diagnostics;
pub mod error;
pub mod network;
pub mod reserve;
pub mod schedule;
pub mod store;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{UcrError, UcrResult};
pub use network::{params, ClusterSpec, GenerationCap, Network, NodeSpec};
pub use reserve::{Direction, ReserveCategory, ReserveKind};
pub use schedule::{pre_round, FractionalGuide, IntegerSchedule, TimeBlock, ROUNDING_DIGITS};
pub use store::{Data, ParameterKey, ParameterStore};
