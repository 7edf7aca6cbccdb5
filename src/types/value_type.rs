// Copyright 2025 Cowboy AI, LLC.

use super::{TypeName, TypeUniverse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declared type of a parameter, property or method result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum ValueType {
    /// Anything, including null
    Any,
    /// `true` / `false`
    Boolean,
    /// Whole numbers
    Integer,
    /// Any JSON number
    Float,
    /// Text
    String,
    /// Ordered collection of elements
    Collection(Box<ValueType>),
    /// String-keyed map of values
    Map(Box<ValueType>),
    /// A value or entity composite type, carried as a JSON object or reference string
    Composite(TypeName),
}

impl ValueType {
    /// Collection of `element`
    pub fn collection(element: ValueType) -> Self {
        ValueType::Collection(Box::new(element))
    }

    /// Map of `value`
    pub fn map(value: ValueType) -> Self {
        ValueType::Map(Box::new(value))
    }

    /// Whether a constraint implemented for `self` can check values of `other`
    pub fn accepts(&self, other: &ValueType, universe: &TypeUniverse) -> bool {
        match (self, other) {
            (ValueType::Any, _) => true,
            (ValueType::Float, ValueType::Integer) => true,
            (ValueType::Collection(a), ValueType::Collection(b))
            | (ValueType::Map(a), ValueType::Map(b)) => a.accepts(b, universe),
            (ValueType::Composite(a), ValueType::Composite(b)) => universe.is_assignable(b, a),
            (a, b) => a == b,
        }
    }

    /// Whether a runtime value has this shape; null always conforms
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ValueType::Any, _) => true,
            (ValueType::Boolean, Value::Bool(_)) => true,
            (ValueType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ValueType::Float, Value::Number(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Collection(element), Value::Array(items)) => {
                items.iter().all(|item| element.conforms(item))
            }
            (ValueType::Map(element), Value::Object(entries)) => {
                entries.values().all(|item| element.conforms(item))
            }
            (ValueType::Composite(_), Value::Object(_) | Value::String(_)) => true,
            _ => false,
        }
    }

    /// Value used for state declared with use-defaults
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Any | ValueType::Composite(_) => Value::Null,
            ValueType::Boolean => Value::Bool(false),
            ValueType::Integer => Value::from(0),
            ValueType::Float => Value::from(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Collection(_) => Value::Array(Vec::new()),
            ValueType::Map(_) => Value::Object(serde_json::Map::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("Any"),
            ValueType::Boolean => f.write_str("Boolean"),
            ValueType::Integer => f.write_str("Integer"),
            ValueType::Float => f.write_str("Float"),
            ValueType::String => f.write_str("String"),
            ValueType::Collection(e) => write!(f, "Collection<{e}>"),
            ValueType::Map(e) => write!(f, "Map<{e}>"),
            ValueType::Composite(t) => write!(f, "{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conforms() {
        assert!(ValueType::Integer.conforms(&json!(3)));
        assert!(!ValueType::Integer.conforms(&json!(3.5)));
        assert!(ValueType::Float.conforms(&json!(3)));
        assert!(ValueType::String.conforms(&Value::Null));
        assert!(ValueType::collection(ValueType::String).conforms(&json!(["a", "b"])));
        assert!(!ValueType::collection(ValueType::String).conforms(&json!(["a", 1])));
        assert!(ValueType::map(ValueType::Boolean).conforms(&json!({"x": true})));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ValueType::String.default_value(), json!(""));
        assert_eq!(ValueType::Integer.default_value(), json!(0));
        assert_eq!(ValueType::collection(ValueType::Any).default_value(), json!([]));
        assert_eq!(ValueType::Composite("Address".into()).default_value(), Value::Null);
    }

    #[test]
    fn test_accepts() {
        let universe = TypeUniverse::builder().build().unwrap();
        assert!(ValueType::Any.accepts(&ValueType::String, &universe));
        assert!(ValueType::Float.accepts(&ValueType::Integer, &universe));
        assert!(!ValueType::Integer.accepts(&ValueType::Float, &universe));
        assert!(ValueType::collection(ValueType::Any)
            .accepts(&ValueType::collection(ValueType::String), &universe));
    }
}
