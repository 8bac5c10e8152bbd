//! Catalog entries offered to a selectable instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use symcps_solver::{SolverError, Value};

use crate::error::ContractError;
use crate::interface::Interface;

/// One property value of a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl PropertyValue {
    /// Solver-level value; text has none.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            PropertyValue::Bool(b) => Some(Value::Bool(*b)),
            PropertyValue::Int(i) => Some(Value::Int(i128::from(*i))),
            PropertyValue::Real(r) => Some(Value::Real(*r)),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.to_value().and_then(|v| v.as_f64())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Real(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

/// A concrete component: an identifier plus named property values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Candidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn real(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropertyValue::as_f64)
    }

    /// The solver value of `property`, checked against its declared sort.
    pub fn value_for(&self, property: &Interface) -> Result<Value, ContractError> {
        let raw = self
            .get(&property.name)
            .ok_or_else(|| ContractError::MissingProperty {
                candidate: self.id.clone(),
                property: property.name.clone(),
            })?;
        let kind_error = || ContractError::PropertyKind {
            candidate: self.id.clone(),
            property: property.name.clone(),
            sort: property.sort,
        };
        let value = raw.to_value().ok_or_else(kind_error)?;
        match value.to_term(property.sort) {
            Ok(_) => Ok(value),
            Err(SolverError::UnsupportedValue { .. }) => Err(kind_error()),
            Err(other) => Err(other.into()),
        }
    }

    /// Check that every declared property is present and usable.
    pub fn validate(&self, properties: &[Interface]) -> Result<(), ContractError> {
        properties
            .iter()
            .try_for_each(|p| self.value_for(p).map(|_| ()))
    }

    /// Values of the given properties in declaration order.
    pub fn values(&self, properties: &[Interface]) -> Result<Vec<(Interface, Value)>, ContractError> {
        properties
            .iter()
            .map(|p| Ok((p.clone(), self.value_for(p)?)))
            .collect()
    }
}
