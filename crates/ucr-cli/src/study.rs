//! Study files: network, parameter data and run settings in one TOML or
//! JSON document.
//!
//! ```toml
//! horizon = 168
//! block-length = 168
//!
//! [heuristic]
//! mode = "accurate"
//!
//! [[network.nodes]]
//! id = "N"
//!
//! [[network.clusters]]
//! id = "G"
//! node = "N"
//!
//! [parameters.N]
//! demand = 2000.0
//! unsupplied_energy_cost = 1000.0
//! spillage_cost = 0.0
//!
//! [parameters.G]
//! p_max = 1000.0
//! # ...
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use ucr_algo::{HeuristicConfig, SolverParameters};
use ucr_core::{Data, Diagnostics, Network, ParameterStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Study {
    /// Hours to resolve
    pub horizon: usize,
    #[serde(default = "default_block_length")]
    pub block_length: usize,
    #[serde(default = "default_scenario_count")]
    pub scenario_count: usize,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    #[serde(default)]
    pub solver: SolverParameters,
    pub network: Network,
    /// `component -> parameter -> data`
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, Data>>,
}

fn default_block_length() -> usize {
    168
}

fn default_scenario_count() -> usize {
    1
}

impl Study {
    /// Load a study, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading study file {}", path.display()))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&text)
                .with_context(|| format!("parsing TOML study {}", path.display())),
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON study {}", path.display())),
            other => bail!(
                "unsupported study format {:?} for {} (expected .toml or .json)",
                other.unwrap_or(""),
                path.display()
            ),
        }
    }

    pub fn store(&self) -> ParameterStore {
        let mut store = ParameterStore::new();
        for (component, parameters) in &self.parameters {
            for (name, data) in parameters {
                store.add_data(component.as_str(), name.as_str(), data.clone());
            }
        }
        store
    }

    /// Network checks plus run-setting checks.
    pub fn validate(&self) -> Diagnostics {
        let store = self.store();
        let mut diag = self.network.validate(&store);
        if self.horizon == 0 {
            diag.add_error("config", "horizon must be positive");
        }
        if self.block_length == 0 {
            diag.add_error("config", "block-length must be positive");
        }
        if self.scenario_count == 0 {
            diag.add_error("config", "scenario-count must be positive");
        }
        if !self.solver.backend.is_available() {
            diag.add_error(
                "config",
                &format!("solver '{}' is not compiled in", self.solver.backend.as_str()),
            );
        }

        let known: Vec<&str> = self
            .network
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.network.clusters.iter().map(|c| c.id.as_str()))
            .chain(self.network.generation_caps.iter().map(|c| c.id.as_str()))
            .collect();
        for component in self.parameters.keys() {
            if !known.contains(&component.as_str()) {
                diag.add_validation_warning(component, "parameters for an unknown component are ignored");
            }
        }
        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use ucr_algo::HeuristicMode;
    use ucr_core::params;

    const STUDY: &str = r#"
horizon = 48
block-length = 24

[heuristic]
mode = "fast"

[[network.nodes]]
id = "N"

[[network.clusters]]
id = "G"
node = "N"

[parameters.N]
demand = [100.0, 120.0]
unsupplied_energy_cost = 1000
spillage_cost = 0.0

[parameters.G]
p_max = 100.0
p_min = 20.0
d_min_up = 1
d_min_down = 1
cost = 10.0
startup_cost = 5.0
fixed_cost = 1.0
nb_units_min = 0
nb_units_max = 2
"#;

    fn write(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = write(".toml", STUDY);
        let study = Study::load(file.path()).unwrap();

        assert_eq!(study.horizon, 48);
        assert_eq!(study.block_length, 24);
        assert_eq!(study.scenario_count, 1);
        assert_eq!(study.heuristic.mode, HeuristicMode::Fast);
        assert!(study.heuristic.smoothing);

        let store = study.store();
        assert_eq!(store.get_value("N", params::DEMAND, 1, 0).unwrap(), 120.0);
        assert_eq!(store.get_value("N", params::UNSUPPLIED_ENERGY_COST, 5, 0).unwrap(), 1000.0);
        assert!(!study.validate().has_errors());
    }

    #[test]
    fn test_json_round_trip() {
        let study: Study = toml::from_str(STUDY).unwrap();
        let file = write(".json", &serde_json::to_string(&study).unwrap());
        let loaded = Study::load(file.path()).unwrap();
        assert_eq!(loaded.network, study.network);
        assert_eq!(loaded.parameters, study.parameters);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = write(".yaml", STUDY);
        let err = Study::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported study format"));
    }

    #[test]
    fn test_validate_flags_missing_parameters() {
        let mut study: Study = toml::from_str(STUDY).unwrap();
        study.parameters.remove("G");
        study.parameters.insert("H".into(), BTreeMap::new());
        let diag = study.validate();

        assert!(diag.has_errors());
        assert_eq!(diag.warning_count(), 1);
    }
}
