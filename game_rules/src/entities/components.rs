//! Shared components carried by every entity kind.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::value::PropertyValue;

/// Tags and properties. Agents, items and rooms all embed one of these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns `true` if the tag was newly added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// Returns `true` if the tag was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Text property, if present and a string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_str)
    }

    /// Numeric property, if present and a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(PropertyValue::as_f64)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    /// Add `amount` to a numeric property, treating a missing property as zero.
    ///
    /// Returns the new value, or `None` if the existing value or the amount
    /// is not numeric (the property is left untouched).
    pub fn increment_property(&mut self, name: &str, amount: &PropertyValue) -> Option<PropertyValue> {
        let current = self
            .properties
            .get(name)
            .cloned()
            .unwrap_or(PropertyValue::Int(0));
        let next = current.checked_add(amount)?;
        self.properties.insert(name.to_string(), next.clone());
        Some(next)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value.into());
        self
    }
}
