//! Network description: nodes, thermal clusters and generation caps.
//!
//! The description is structural only. Every numeric value (capacities,
//! costs, demands, bounds) lives in the [`ParameterStore`] under the
//! component id and one of the names in [`params`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::diagnostics::Diagnostics;
use crate::{ParameterStore, ReserveKind};

/// Parameter names used in the store.
pub mod params {
    // node
    pub const DEMAND: &str = "demand";
    pub const UNSUPPLIED_ENERGY_COST: &str = "unsupplied_energy_cost";
    pub const SPILLAGE_COST: &str = "spillage_cost";
    // node, reserve-scoped (prefixed with the reserve kind key)
    pub const RESERVE_DEMAND: &str = "demand";
    pub const NON_SUPPLY_COST: &str = "non_supply_cost";
    pub const OVERSUPPLY_COST: &str = "oversupply_cost";

    // cluster
    pub const P_MAX: &str = "p_max";
    pub const P_MIN: &str = "p_min";
    pub const D_MIN_UP: &str = "d_min_up";
    pub const D_MIN_DOWN: &str = "d_min_down";
    pub const COST: &str = "cost";
    pub const STARTUP_COST: &str = "startup_cost";
    pub const FIXED_COST: &str = "fixed_cost";
    pub const NB_UNITS_MIN: &str = "nb_units_min";
    pub const NB_UNITS_MAX: &str = "nb_units_max";
    pub const NB_FAILURES: &str = "nb_failures";
    /// Unit count used by the min-down constraint. Defaults to
    /// `nb_units_max` and survives write-backs that pin `nb_units_max`.
    pub const NB_UNITS_MAX_MIN_DOWN_TIME: &str = "nb_units_max_min_down_time";
    pub const MIN_GENERATING: &str = "min_generating";
    // cluster, reserve-scoped
    pub const MAX_ON: &str = "max_on";
    pub const MAX_OFF: &str = "max_off";
    pub const COST_ON: &str = "cost_on";
    pub const COST_OFF: &str = "cost_off";
    pub const NB_OFF_MIN: &str = "nb_off_min";
    pub const NB_OFF_MAX: &str = "nb_off_max";

    // generation cap
    pub const MAX_GENERATION: &str = "max_generation";

    pub const REQUIRED_NODE: &[&str] = &[DEMAND, UNSUPPLIED_ENERGY_COST, SPILLAGE_COST];
    pub const REQUIRED_CLUSTER: &[&str] = &[
        P_MAX,
        P_MIN,
        D_MIN_UP,
        D_MIN_DOWN,
        COST,
        STARTUP_COST,
        FIXED_COST,
        NB_UNITS_MIN,
        NB_UNITS_MAX,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    /// Reserve kinds with a demand at this node
    #[serde(default)]
    pub reserve_demands: Vec<ReserveKind>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reserve_demands: Vec::new(),
        }
    }

    pub fn with_reserve(mut self, kind: ReserveKind) -> Self {
        self.reserve_demands.push(kind);
        self
    }
}

/// A group of identical thermal units connected to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub id: String,
    pub node: String,
    /// Reserve kinds this cluster may participate in
    #[serde(default)]
    pub reserves: Vec<ReserveKind>,
}

impl ClusterSpec {
    pub fn new(id: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node: node.into(),
            reserves: Vec::new(),
        }
    }

    pub fn with_reserve(mut self, kind: ReserveKind) -> Self {
        self.reserves.push(kind);
        self
    }
}

/// Upper bound on the combined generation of several clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCap {
    pub id: String,
    pub clusters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
    #[serde(default)]
    pub generation_caps: Vec<GenerationCap>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterSpec) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn with_generation_cap(mut self, cap: GenerationCap) -> Self {
        self.generation_caps.push(cap);
        self
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterSpec> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Structural and parameter checks. Errors make the network unusable,
    /// warnings flag data that will be ignored.
    pub fn validate(&self, store: &ParameterStore) -> Diagnostics {
        let mut diag = Diagnostics::new();
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                diag.add_error_with_entity("structure", "duplicate component id", &node.id);
            }
            for name in params::REQUIRED_NODE {
                if !store.has(&node.id, name) {
                    diag.add_error_with_entity(
                        "parameter",
                        &format!("missing node parameter '{name}'"),
                        &node.id,
                    );
                }
            }
            for kind in &node.reserve_demands {
                for suffix in [
                    params::RESERVE_DEMAND,
                    params::NON_SUPPLY_COST,
                    params::OVERSUPPLY_COST,
                ] {
                    let name = kind.param(suffix);
                    if !store.has(&node.id, &name) {
                        diag.add_error_with_entity(
                            "parameter",
                            &format!("missing reserve parameter '{name}'"),
                            &node.id,
                        );
                    }
                }
            }
        }

        for cluster in &self.clusters {
            if !seen.insert(cluster.id.as_str()) {
                diag.add_error_with_entity("structure", "duplicate component id", &cluster.id);
            }
            let node = self.node(&cluster.node);
            if node.is_none() {
                diag.add_error_with_entity(
                    "reference",
                    &format!("cluster references unknown node '{}'", cluster.node),
                    &cluster.id,
                );
            }
            for name in params::REQUIRED_CLUSTER {
                if !store.has(&cluster.id, name) {
                    diag.add_error_with_entity(
                        "parameter",
                        &format!("missing cluster parameter '{name}'"),
                        &cluster.id,
                    );
                }
            }
            let p_min = store.get_or(&cluster.id, params::P_MIN, 0, 0, 0.0);
            let p_max = store.get_or(&cluster.id, params::P_MAX, 0, 0, 0.0);
            if p_min > p_max {
                diag.add_error_with_entity(
                    "physical",
                    &format!("p_min ({p_min}) exceeds p_max ({p_max})"),
                    &cluster.id,
                );
            }
            for name in [params::D_MIN_UP, params::D_MIN_DOWN] {
                if store.get_or(&cluster.id, name, 0, 0, 1.0) < 1.0 {
                    diag.add_error_with_entity(
                        "physical",
                        &format!("{name} must be at least one hour"),
                        &cluster.id,
                    );
                }
            }
            for kind in &cluster.reserves {
                if let Some(node) = node {
                    if !node.reserve_demands.contains(kind) {
                        diag.add_validation_warning(
                            &cluster.id,
                            &format!("node '{}' has no {kind} demand", node.id),
                        );
                    }
                }
                if !kind.accepts_offline() && store.has(&cluster.id, &kind.param(params::MAX_OFF)) {
                    diag.add_validation_warning(
                        &cluster.id,
                        &format!("offline participation is ignored for {kind}"),
                    );
                }
            }
        }

        for cap in &self.generation_caps {
            if !seen.insert(cap.id.as_str()) {
                diag.add_error_with_entity("structure", "duplicate component id", &cap.id);
            }
            for cluster in &cap.clusters {
                if self.cluster(cluster).is_none() {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("generation cap references unknown cluster '{cluster}'"),
                        &cap.id,
                    );
                }
            }
            if !store.has(&cap.id, params::MAX_GENERATION) {
                diag.add_error_with_entity(
                    "parameter",
                    &format!("missing parameter '{}'", params::MAX_GENERATION),
                    &cap.id,
                );
            }
        }

        diag
    }
}
