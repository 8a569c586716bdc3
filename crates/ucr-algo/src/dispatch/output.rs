//! Solved variable values, addressed by component and variable name.

use serde::Serialize;
use std::collections::BTreeMap;

/// Values of one variable, indexed `[scenario][step]`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VarOutput {
    pub value: Vec<Vec<f64>>,
}

impl VarOutput {
    pub fn at(&self, scenario: usize, step: usize) -> Option<f64> {
        self.value.get(scenario).and_then(|row| row.get(step)).copied()
    }

    /// Values of one scenario over the block.
    pub fn scenario(&self, scenario: usize) -> &[f64] {
        self.value.get(scenario).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentOutput {
    vars: BTreeMap<String, VarOutput>,
}

impl ComponentOutput {
    pub fn var(&self, name: &str) -> Option<&VarOutput> {
        self.vars.get(name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

/// Every solved variable of a dispatch problem.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct OutputValues {
    components: BTreeMap<String, ComponentOutput>,
}

impl OutputValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, component: &str, var: &str, value: Vec<Vec<f64>>) {
        self.components
            .entry(component.to_string())
            .or_default()
            .vars
            .insert(var.to_string(), VarOutput { value });
    }

    pub fn component(&self, id: &str) -> Option<&ComponentOutput> {
        self.components.get(id)
    }

    /// Shorthand for `component(id).var(name).at(scenario, step)`.
    pub fn value(&self, id: &str, name: &str, scenario: usize, step: usize) -> Option<f64> {
        self.component(id)?.var(name)?.at(scenario, step)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut out = OutputValues::new();
        out.insert("G", "nb_on", vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        assert_eq!(out.value("G", "nb_on", 1, 0), Some(3.0));
        assert_eq!(out.component("G").unwrap().var("nb_on").unwrap().scenario(0), &[1.0, 2.0]);
        assert_eq!(out.value("G", "generation", 0, 0), None);
        assert_eq!(out.value("H", "nb_on", 0, 0), None);
        assert!(out.component("G").unwrap().var("nb_on").unwrap().scenario(5).is_empty());
    }
}
