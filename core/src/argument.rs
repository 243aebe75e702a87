//! Positional argument definitions.
//!
//! Arguments are declared with a bracket syntax: `<name>` is required,
//! `[name]` is optional, and a trailing `...` marks the argument as
//! consuming every remaining positional token. Arguments declared after a
//! `...` argument are unreachable; this is accepted as declared rather than
//! rejected, matching how the rest of the grammar treats positional order
//! as authoritative.

use std::sync::LazyLock;

use regex::Regex;

use crate::callback::Callback;
use crate::error::{DefinitionError, TransformError};
use crate::types::{TypeDef, resolve_type};
use crate::value::Value;

static ARGUMENT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?:<(?P<req>[A-Za-z][A-Za-z0-9_-]*)(?P<reqdots>\.\.\.)?>
        |\[(?P<opt>[A-Za-z][A-Za-z0-9_-]*)(?P<optdots>\.\.\.)?\]
        |(?P<bare>[A-Za-z][A-Za-z0-9_-]*)(?P<baredots>\.\.\.)?
        )$",
    )
    .expect("static regex must compile")
});

/// Optional settings accepted alongside an argument name.
#[derive(Debug, Default)]
pub struct ArgumentParams {
    /// Datatype name; `string` when omitted.
    pub datatype: Option<String>,
    /// One-line description for help output.
    pub desc: Option<String>,
    /// Environment variable that overrides the final value.
    pub env: Option<String>,
    /// Hide from generated help.
    pub hidden: bool,
    /// Lower bound for numeric datatypes.
    pub min: Option<f64>,
    /// Upper bound for numeric datatypes.
    pub max: Option<f64>,
    /// Override the multiplicity derived from the name syntax.
    pub multiple: Option<bool>,
    /// Override the requiredness derived from the name syntax.
    pub required: Option<bool>,
    /// Callback fired when the argument is bound.
    pub callback: Option<Callback>,
}

/// A single positional argument definition.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{ArgumentParams, ArgumentSpec};
///
/// let arg = ArgumentSpec::new("<source>", ArgumentParams::default()).unwrap();
/// assert!(arg.required);
/// assert!(!arg.multiple);
///
/// let rest = ArgumentSpec::new("[files...]", ArgumentParams::default()).unwrap();
/// assert!(!rest.required);
/// assert!(rest.multiple);
/// ```
#[derive(Debug)]
pub struct ArgumentSpec {
    pub name: String,
    pub required: bool,
    pub multiple: bool,
    pub datatype: String,
    pub desc: Option<String>,
    pub env: Option<String>,
    pub hidden: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub callback: Option<Callback>,
    ty: TypeDef,
}

impl ArgumentSpec {
    /// Parses a bracketed name into an argument definition.
    pub fn new(name: &str, params: ArgumentParams) -> Result<Self, DefinitionError> {
        let name = name.trim();
        let caps = ARGUMENT_NAME_RE
            .captures(name)
            .ok_or_else(|| DefinitionError::InvalidArgument(format!("bad argument name {name:?}")))?;

        let (parsed_name, required, dots) = if let Some(m) = caps.name("req") {
            (m.as_str(), true, caps.name("reqdots").is_some())
        } else if let Some(m) = caps.name("opt") {
            (m.as_str(), false, caps.name("optdots").is_some())
        } else if let Some(m) = caps.name("bare") {
            (m.as_str(), false, caps.name("baredots").is_some())
        } else {
            return Err(DefinitionError::InvalidArgument(format!(
                "bad argument name {name:?}"
            )));
        };

        let datatype = params.datatype.unwrap_or_else(|| "string".to_string());
        let ty = resolve_type(&datatype)?;

        Ok(Self {
            name: parsed_name.to_string(),
            required: params.required.unwrap_or(required),
            multiple: params.multiple.unwrap_or(dots),
            datatype,
            desc: params.desc,
            env: params.env,
            hidden: params.hidden,
            min: params.min,
            max: params.max,
            callback: params.callback,
            ty,
        })
    }

    /// Coerces a bound positional token, with the same numeric range rules
    /// as option values.
    pub fn transform(&self, raw: &str) -> Result<Value, TransformError> {
        let value = self.ty.apply(raw)?;

        if let Some(n) = value.as_number() {
            if let Some(min) = self.min
                && n < min
            {
                return Err(TransformError::BelowMinimum { value: n, min });
            }
            if let Some(max) = self.max
                && n > max
            {
                return Err(TransformError::AboveMaximum { value: n, max });
            }
        }

        Ok(value)
    }
}
