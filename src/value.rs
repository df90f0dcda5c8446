//! Field values for configuration records.
//!
//! Every field of a record carries a [`FieldValue`], which keeps "not
//! mentioned", "explicitly empty" and "has a value" apart.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single scalar carried by a field or a collection member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Int(i64),
}

impl Scalar {
    /// True for the empty string, which several optional string fields
    /// treat the same as "not set".
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Scalar::String(s) if s.is_empty())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{:?}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

/// Tri-state value of one record field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    /// Not part of the plan or state at all.
    #[default]
    Absent,
    /// Explicitly empty.
    Null,
    Scalar(Scalar),
    /// Members of a set or list field, in the order they were given.
    Values(Vec<Scalar>),
}

impl FieldValue {
    pub fn string(s: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::String(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        FieldValue::Scalar(Scalar::Bool(b))
    }

    pub fn int(i: i64) -> Self {
        FieldValue::Scalar(Scalar::Int(i))
    }

    /// Collection of string members.
    pub fn strings<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Values(
            members
                .into_iter()
                .map(|s| Scalar::String(s.into()))
                .collect(),
        )
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// True when the value carries nothing: absent, null, the empty string,
    /// or a collection without members.
    ///
    /// A null collection and a zero-length one are both empty, so they
    /// compare as equivalent.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Absent | FieldValue::Null => true,
            FieldValue::Scalar(s) => s.is_empty_string(),
            FieldValue::Values(v) => v.is_empty(),
        }
    }

    /// Structural equality that treats every empty representation alike.
    pub fn equivalent(&self, other: &FieldValue) -> bool {
        (self.is_empty() && other.is_empty()) || self == other
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Collection members; empty for anything that isn't a collection.
    pub fn values(&self) -> &[Scalar] {
        match self {
            FieldValue::Values(v) => v,
            _ => &[],
        }
    }

    /// JSON form used in record documents. `None` means the key is omitted.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Null => Some(Value::Null),
            FieldValue::Scalar(s) => Some(s.to_json()),
            FieldValue::Values(v) => Some(Value::Array(v.iter().map(Scalar::to_json).collect())),
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(s: Scalar) -> Self {
        FieldValue::Scalar(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::string(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::int(i)
    }
}

/// Drops repeated members, keeping the first occurrence of each.
pub(crate) fn dedup(members: &[Scalar]) -> Vec<Scalar> {
    let mut seen = std::collections::HashSet::new();
    members
        .iter()
        .filter(|m| seen.insert(*m))
        .cloned()
        .collect()
}
