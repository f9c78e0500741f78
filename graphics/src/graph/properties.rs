//! Construction properties of render passes.
//!
//! Properties are the serializable configuration of a pass: the importer
//! hands them to the pass constructor and the exporter reads them back via
//! [`RenderPass::properties`](super::RenderPass::properties).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PassError;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Ordered name → value map of pass properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw access to a property.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Returns true if the property is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Remove a property, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.0.remove(name)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no property is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read a boolean, falling back to `default` when absent.
    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool, PassError> {
        match self.get(name) {
            None => Ok(default),
            Some(PropertyValue::Bool(v)) => Ok(*v),
            Some(other) => Err(wrong_type(name, "bool", other)),
        }
    }

    /// Read an unsigned integer, falling back to `default` when absent.
    pub fn get_u32(&self, name: &str, default: u32) -> Result<u32, PassError> {
        match self.get(name) {
            None => Ok(default),
            Some(PropertyValue::Int(v)) => u32::try_from(*v).map_err(|_| PassError::InvalidProperty {
                name: name.to_owned(),
                reason: format!("{v} is out of range for an unsigned 32-bit value"),
            }),
            Some(other) => Err(wrong_type(name, "integer", other)),
        }
    }

    /// Read a float, falling back to `default` when absent. Integers are accepted.
    pub fn get_f32(&self, name: &str, default: f32) -> Result<f32, PassError> {
        match self.get(name) {
            None => Ok(default),
            Some(PropertyValue::Float(v)) => Ok(*v as f32),
            Some(PropertyValue::Int(v)) => Ok(*v as f32),
            Some(other) => Err(wrong_type(name, "float", other)),
        }
    }

    /// Read a string, falling back to `default` when absent.
    pub fn get_string(&self, name: &str, default: &str) -> Result<String, PassError> {
        match self.get(name) {
            None => Ok(default.to_owned()),
            Some(PropertyValue::String(v)) => Ok(v.clone()),
            Some(other) => Err(wrong_type(name, "string", other)),
        }
    }
}

fn wrong_type(name: &str, expected: &str, found: &PropertyValue) -> PassError {
    PassError::InvalidProperty {
        name: name.to_owned(),
        reason: format!("expected {expected}, found {}", found.type_name()),
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
