//! Typed values produced by option and argument coercion.
//!
//! Every token consumed as an option or argument value is coerced through a
//! registered datatype transform (see [`crate::types`]) into a [`Value`].
//! Values round-trip through JSON for result reporting and descriptor files.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A coerced option or argument value.
///
/// This is the currency of parse results: every entry in `argv`, `unknown`,
/// and the leftover-argument list is a `Value`.
///
/// # Examples
///
/// ```
/// use cmdtree_core::Value;
///
/// let v = Value::Int(42);
/// assert_eq!(v.as_i64(), Some(42));
/// assert!(Value::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No value (unset).
    #[default]
    Null,
    /// Boolean flag value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Number(f64),
    /// Occurrence count for `count`-type flags.
    Count(u64),
    /// Plain string.
    String(String),
    /// Parsed timestamp (`date` datatype).
    Date(DateTime<Utc>),
    /// Arbitrary JSON document (`json` datatype).
    Json(serde_json::Value),
    /// Accumulated values for `multiple` options and arguments.
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the element list if this is a [`Value::Array`].
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a float when it carries a numeric representation.
    ///
    /// Used for `min`/`max` range checks, which apply uniformly to `int`,
    /// `positiveInt`, `number`, and `count` datatypes.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Number(n) => Some(*n),
            Value::Count(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Converts a JSON value from a descriptor file into a typed value.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdtree_core::Value;
    ///
    /// let v = Value::from_json(&serde_json::json!(3));
    /// assert_eq!(v, Value::Int(3));
    /// let v = Value::from_json(&serde_json::json!("x"));
    /// assert_eq!(v, Value::String("x".into()));
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Number(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            other => Value::Json(other.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
