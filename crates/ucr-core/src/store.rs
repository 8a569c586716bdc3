//! In-memory parameter store.
//!
//! The store is the system of record for every numeric parameter read by the
//! dispatch problem and the rounding heuristics. Values are addressed by
//! `(component, parameter, hour, scenario)`.
//!
//! Registered [`Data`] is the base layer. Point writes through
//! [`ParameterStore::set_value`] land in an override layer keyed by the full
//! 4-tuple, so repeated writes of the same key are idempotent and the last
//! writer wins. Registering new data for a `(component, parameter)` pair
//! discards its overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{TimeBlock, UcrError, UcrResult};

/// Parameter data as registered by the study.
///
/// Lookups past the end of a series repeat the last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    Constant(f64),
    /// Indexed by hour
    TimeSeries(Vec<f64>),
    /// Indexed `[scenario][hour]`
    ScenarioSeries(Vec<Vec<f64>>),
}

impl Data {
    pub fn value(&self, hour: usize, scenario: usize) -> Option<f64> {
        match self {
            Data::Constant(v) => Some(*v),
            Data::TimeSeries(series) => clamped(series, hour).copied(),
            Data::ScenarioSeries(table) => {
                clamped(table, scenario).and_then(|row| clamped(row, hour).copied())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Data::Constant(_) => false,
            Data::TimeSeries(series) => series.is_empty(),
            Data::ScenarioSeries(table) => table.iter().all(Vec::is_empty),
        }
    }
}

fn clamped<T>(items: &[T], index: usize) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        items.get(index.min(items.len() - 1))
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Data::Constant(value)
    }
}

impl From<Vec<f64>> for Data {
    fn from(series: Vec<f64>) -> Self {
        Data::TimeSeries(series)
    }
}

/// Key of a single point override.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterKey {
    pub component: String,
    pub parameter: String,
    pub hour: usize,
    pub scenario: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    data: HashMap<(String, String), Data>,
    overrides: HashMap<ParameterKey, f64>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the data of a parameter.
    pub fn add_data(
        &mut self,
        component: impl Into<String>,
        parameter: impl Into<String>,
        data: impl Into<Data>,
    ) {
        let component = component.into();
        let parameter = parameter.into();
        self.overrides
            .retain(|key, _| key.component != component || key.parameter != parameter);
        self.data.insert((component, parameter), data.into());
    }

    /// Whether the parameter is known, either as data or as an override.
    pub fn has(&self, component: &str, parameter: &str) -> bool {
        self.data
            .contains_key(&(component.to_string(), parameter.to_string()))
            || self
                .overrides
                .keys()
                .any(|k| k.component == component && k.parameter == parameter)
    }

    pub fn get_value(
        &self,
        component: &str,
        parameter: &str,
        hour: usize,
        scenario: usize,
    ) -> UcrResult<f64> {
        self.lookup(component, parameter, hour, scenario)
            .ok_or_else(|| UcrError::missing(component, parameter))
    }

    /// Like [`get_value`](Self::get_value) but falls back to `default` when
    /// the parameter is not registered.
    pub fn get_or(
        &self,
        component: &str,
        parameter: &str,
        hour: usize,
        scenario: usize,
        default: f64,
    ) -> f64 {
        self.lookup(component, parameter, hour, scenario)
            .unwrap_or(default)
    }

    fn lookup(&self, component: &str, parameter: &str, hour: usize, scenario: usize) -> Option<f64> {
        let key = ParameterKey {
            component: component.to_string(),
            parameter: parameter.to_string(),
            hour,
            scenario,
        };
        if let Some(value) = self.overrides.get(&key) {
            return Some(*value);
        }
        self.data
            .get(&(key.component, key.parameter))
            .and_then(|data| data.value(hour, scenario))
    }

    /// Overwrite one value. Idempotent: writing the same key twice keeps the
    /// last value only.
    pub fn set_value(
        &mut self,
        component: &str,
        parameter: &str,
        hour: usize,
        scenario: usize,
        value: f64,
    ) {
        self.overrides.insert(
            ParameterKey {
                component: component.to_string(),
                parameter: parameter.to_string(),
                hour,
                scenario,
            },
            value,
        );
    }

    /// Overwrite the values of a whole block for one scenario.
    pub fn set_series(
        &mut self,
        component: &str,
        parameter: &str,
        block: &TimeBlock,
        scenario: usize,
        values: &[f64],
    ) -> UcrResult<()> {
        if values.len() != block.len() {
            return Err(UcrError::Validation(format!(
                "series for '{component}.{parameter}' has {} values, block has {} hours",
                values.len(),
                block.len()
            )));
        }
        for (&hour, &value) in block.hours().iter().zip(values) {
            self.set_value(component, parameter, hour, scenario, value);
        }
        Ok(())
    }

    /// Read the values of a whole block for one scenario.
    pub fn series(
        &self,
        component: &str,
        parameter: &str,
        block: &TimeBlock,
        scenario: usize,
    ) -> UcrResult<Vec<f64>> {
        block
            .hours()
            .iter()
            .map(|&hour| self.get_value(component, parameter, hour, scenario))
            .collect()
    }

    /// Like [`series`](Self::series) with a default for unregistered
    /// parameters.
    pub fn series_or(
        &self,
        component: &str,
        parameter: &str,
        block: &TimeBlock,
        scenario: usize,
        default: f64,
    ) -> Vec<f64> {
        block
            .hours()
            .iter()
            .map(|&hour| self.get_or(component, parameter, hour, scenario, default))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.overrides.is_empty()
    }
}
