//! Typed strategy parameter sets.
//!
//! Parameters are enumerated explicitly and bound through a builder; there
//! is no runtime field introspection. The engine only carries these across
//! the persistence boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// A named, ordered set of typed parameters for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub name: String,
    pub values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn builder(name: impl Into<String>) -> ParameterSetBuilder {
        ParameterSetBuilder {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Text(v)) => Some(v),
            _ => None,
        }
    }
}

/// Builder for [`ParameterSet`].
pub struct ParameterSetBuilder {
    name: String,
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSetBuilder {
    pub fn int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.values.insert(key.into(), ParamValue::Int(value));
        self
    }

    pub fn float(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), ParamValue::Float(value));
        self
    }

    pub fn flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.values.insert(key.into(), ParamValue::Bool(value));
        self
    }

    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), ParamValue::Text(value.into()));
        self
    }

    pub fn build(self) -> ParameterSet {
        ParameterSet {
            name: self.name,
            values: self.values,
        }
    }
}
