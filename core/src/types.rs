//! Datatype registry mapping type names to value-coercion transforms.
//!
//! Options and arguments declare a datatype by name (`"int"`, `"date"`,
//! `"yesno"`, ...). The registry resolves the name to a [`TypeDef`] whose
//! transform coerces raw command-line strings into typed [`Value`]s.
//! Resolution happens when the option or argument is *built*; referencing an
//! unregistered type name is a construction error, never a parse error.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::error::{DefinitionError, TransformError};
use crate::value::Value;

/// Coercion function from a raw token to a typed value.
pub type Transform = dyn Fn(&str) -> Result<Value, TransformError> + Send + Sync;

/// A named datatype with its coercion transform.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{TypeDef, Value, register_type};
///
/// register_type(TypeDef::new("upper", |raw| {
///     Ok(Value::String(raw.to_ascii_uppercase()))
/// }));
///
/// let def = cmdtree_core::resolve_type("upper").unwrap();
/// assert_eq!(def.apply("hi").unwrap(), Value::String("HI".into()));
/// ```
#[derive(Clone)]
pub struct TypeDef {
    name: String,
    transform: Arc<Transform>,
}

impl TypeDef {
    /// Creates a datatype from a name and transform function.
    pub fn new(
        name: impl Into<String>,
        transform: impl Fn(&str) -> Result<Value, TransformError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
        }
    }

    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the transform to a raw string.
    pub fn apply(&self, raw: &str) -> Result<Value, TransformError> {
        (self.transform)(raw)
    }
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef").field("name", &self.name).finish()
    }
}

static REGISTRY: LazyLock<RwLock<HashMap<String, TypeDef>>> =
    LazyLock::new(|| RwLock::new(builtin_types()));

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("static regex must compile"));
static UNSIGNED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("static regex must compile"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)$").expect("static regex must compile"));
static YES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^y(es)?$").expect("static regex must compile"));
static NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^no?$").expect("static regex must compile"));

/// Registers (or replaces) a datatype.
///
/// Later registrations under the same name win, so applications can override
/// the built-in transforms.
pub fn register_type(def: TypeDef) {
    REGISTRY
        .write()
        .expect("type registry poisoned")
        .insert(def.name().to_string(), def);
}

/// Resolves a type name to its definition.
///
/// Returns [`DefinitionError::UnknownType`] for unregistered names; callers
/// invoke this while constructing options and arguments so that bad type
/// names fail at definition time.
pub fn resolve_type(name: &str) -> Result<TypeDef, DefinitionError> {
    REGISTRY
        .read()
        .expect("type registry poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| DefinitionError::UnknownType(name.to_string()))
}

fn builtin_types() -> HashMap<String, TypeDef> {
    let defs = [
        TypeDef::new("string", |raw| Ok(Value::String(raw.to_string()))),
        // Any non-empty string other than "false" is truthy.
        TypeDef::new("bool", |raw| {
            Ok(Value::Bool(
                !raw.is_empty() && !raw.eq_ignore_ascii_case("false"),
            ))
        }),
        TypeDef::new("count", |_| Ok(Value::Count(1))),
        TypeDef::new("int", transform_int),
        TypeDef::new("positiveInt", transform_positive_int),
        TypeDef::new("number", transform_number),
        TypeDef::new("date", transform_date),
        TypeDef::new("json", transform_json),
        TypeDef::new("yesno", transform_yesno),
        TypeDef::new("file", transform_file),
    ];

    defs.into_iter()
        .map(|def| (def.name().to_string(), def))
        .collect()
}

fn transform_int(raw: &str) -> Result<Value, TransformError> {
    if !INT_RE.is_match(raw) {
        return Err(TransformError::Invalid {
            expected: "an integer",
            raw: raw.to_string(),
        });
    }
    raw.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| TransformError::Invalid {
            expected: "an integer",
            raw: raw.to_string(),
        })
}

fn transform_positive_int(raw: &str) -> Result<Value, TransformError> {
    if !UNSIGNED_RE.is_match(raw) {
        return Err(TransformError::Invalid {
            expected: "a positive integer",
            raw: raw.to_string(),
        });
    }
    raw.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| TransformError::Invalid {
            expected: "a positive integer",
            raw: raw.to_string(),
        })
}

fn transform_number(raw: &str) -> Result<Value, TransformError> {
    if !NUMBER_RE.is_match(raw) {
        return Err(TransformError::Invalid {
            expected: "a number",
            raw: raw.to_string(),
        });
    }
    raw.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| TransformError::Invalid {
            expected: "a number",
            raw: raw.to_string(),
        })
}

/// Accepts epoch seconds, RFC 3339 timestamps, and bare `YYYY-MM-DD` dates.
fn transform_date(raw: &str) -> Result<Value, TransformError> {
    let invalid = || TransformError::Invalid {
        expected: "a date (epoch seconds or ISO-8601)",
        raw: raw.to_string(),
    };

    if UNSIGNED_RE.is_match(raw) {
        let secs = raw.parse::<i64>().map_err(|_| invalid())?;
        return DateTime::<Utc>::from_timestamp(secs, 0)
            .map(Value::Date)
            .ok_or_else(invalid);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Value::Date(ts.with_timezone(&Utc)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(Value::Date(midnight.and_utc()));
    }

    Err(invalid())
}

fn transform_json(raw: &str) -> Result<Value, TransformError> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::Json)
        .map_err(|_| TransformError::Invalid {
            expected: "a JSON document",
            raw: raw.to_string(),
        })
}

fn transform_yesno(raw: &str) -> Result<Value, TransformError> {
    if YES_RE.is_match(raw) {
        Ok(Value::Bool(true))
    } else if NO_RE.is_match(raw) {
        Ok(Value::Bool(false))
    } else {
        Err(TransformError::Invalid {
            expected: "yes or no",
            raw: raw.to_string(),
        })
    }
}

fn transform_file(raw: &str) -> Result<Value, TransformError> {
    if raw.trim().is_empty() {
        Err(TransformError::Invalid {
            expected: "a file path",
            raw: raw.to_string(),
        })
    } else {
        Ok(Value::String(raw.to_string()))
    }
}
