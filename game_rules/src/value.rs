//! Property values stored on agents, items and rooms.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A loosely typed property value as authored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Compare two values numerically. Returns `None` unless both are numbers.
    pub fn numeric_cmp(&self, other: &PropertyValue) -> Option<Ordering> {
        self.as_f64()?.partial_cmp(&other.as_f64()?)
    }

    /// Loose equality: numbers compare by value, everything else by display form.
    pub fn loosely_equals(&self, other: &PropertyValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Add two numeric values. Integer plus integer stays integral.
    /// Returns `None` when either side is not numeric.
    pub fn checked_add(&self, other: &PropertyValue) -> Option<PropertyValue> {
        match (self, other) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => {
                Some(PropertyValue::Int(a.saturating_add(*b)))
            }
            _ => Some(PropertyValue::Float(self.as_f64()? + other.as_f64()?)),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cmp_requires_numbers() {
        let five = PropertyValue::Int(5);
        let half = PropertyValue::Float(0.5);
        let text = PropertyValue::from("5");

        assert_eq!(five.numeric_cmp(&half), Some(Ordering::Greater));
        assert_eq!(five.numeric_cmp(&text), None);
    }

    #[test]
    fn test_loose_equality() {
        assert!(PropertyValue::Int(3).loosely_equals(&PropertyValue::Float(3.0)));
        assert!(PropertyValue::from("open").loosely_equals(&PropertyValue::from("open")));
        assert!(!PropertyValue::Bool(true).loosely_equals(&PropertyValue::from("false")));
    }

    #[test]
    fn test_checked_add() {
        let sum = PropertyValue::Int(2).checked_add(&PropertyValue::Int(3));
        assert_eq!(sum, Some(PropertyValue::Int(5)));

        let mixed = PropertyValue::Int(2).checked_add(&PropertyValue::Float(0.5));
        assert_eq!(mixed, Some(PropertyValue::Float(2.5)));

        assert!(PropertyValue::from("x").checked_add(&PropertyValue::Int(1)).is_none());
    }

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<PropertyValue> = serde_json::from_str(r#"[true, 4, 1.5, "large"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                PropertyValue::Bool(true),
                PropertyValue::Int(4),
                PropertyValue::Float(1.5),
                PropertyValue::from("large"),
            ]
        );
    }
}
