//! Option definitions parsed from format strings.
//!
//! An option is declared with a `getopt`-style format string:
//!
//! - `-v` — boolean short flag
//! - `-c, --count <n>` — short and long form with a required value
//! - `--output [file]` — long form with an optional value
//! - `--no-color` — negated boolean (defaults to `true`, `--no-color`
//!   switches it off)
//!
//! A hint in `<>` means the option requires a value, `[]` means the value is
//! optional, and no hint at all means the option is a flag. Flags must have
//! a `bool` or `count` datatype.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::callback::Callback;
use crate::error::{DefinitionError, TransformError};
use crate::types::{TypeDef, resolve_type};
use crate::value::Value;

static OPTION_FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?:-(?P<short>[A-Za-z0-9?*]))?
        (?:(?:^|\s*[,|]\s*|\s+)--(?P<no>no-)?(?P<long>[A-Za-z][A-Za-z0-9_-]*))?
        (?:\s+(?:<(?P<req>[^>]+)>|\[(?P<opt>[^\]]+)\]))?
        $",
    )
    .expect("static regex must compile")
});

static LONG_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--([A-Za-z][A-Za-z0-9_-]*)$").expect("static regex must compile")
});
static SHORT_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-([A-Za-z0-9?*])$").expect("static regex must compile"));

/// Long and short aliases bucketed by visibility.
///
/// The map value is `true` for visible aliases. Hidden aliases (declared
/// with a `!` prefix) still resolve during parsing but are omitted from
/// generated help.
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    pub long: HashMap<String, bool>,
    pub short: HashMap<String, bool>,
}

/// Optional settings accepted alongside an option format string.
#[derive(Debug, Default)]
pub struct OptionParams {
    /// Extra aliases (`"--alias"` / `"-a"`, `!` prefix hides from help).
    pub aliases: Vec<String>,
    /// Datatype name; inferred from the format when omitted.
    pub datatype: Option<String>,
    /// Default value seeded before parsing.
    pub default: Option<Value>,
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
    /// Accumulate repeated occurrences into an array.
    pub multiple: bool,
    /// Validation pattern applied to raw values.
    pub regex: Option<Regex>,
    /// Fail the parse when the option is never supplied.
    pub required: bool,
    /// Sort order within the help group.
    pub order: Option<usize>,
    /// Callback fired when the option is parsed.
    pub callback: Option<Callback>,
}

/// A single option definition.
///
/// Immutable after construction; re-registering the same long/short name on
/// a context supersedes the earlier definition wholesale.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{OptionParams, OptionSpec};
///
/// let opt = OptionSpec::new("-c, --count <n>", OptionParams {
///     datatype: Some("int".into()),
///     ..Default::default()
/// }).unwrap();
/// assert_eq!(opt.name, "count");
/// assert_eq!(opt.short.as_deref(), Some("c"));
/// assert!(!opt.is_flag);
///
/// let neg = OptionSpec::new("--no-color", OptionParams::default()).unwrap();
/// assert!(neg.negate);
/// assert_eq!(neg.name, "color");
/// ```
#[derive(Debug)]
pub struct OptionSpec {
    /// Short letter, stored without the leading dash.
    pub short: Option<String>,
    /// Long name, stored without the leading dashes and `no-` prefix.
    pub long: Option<String>,
    /// Canonical name (long form preferred).
    pub name: String,
    pub aliases: Aliases,
    pub datatype: String,
    /// `true` when the option takes no value.
    pub is_flag: bool,
    /// `true` for `--no-` style negated booleans.
    pub negate: bool,
    pub required: bool,
    pub multiple: bool,
    pub default: Option<Value>,
    pub desc: Option<String>,
    /// Value placeholder from the format string; absent exactly when
    /// `is_flag` is set.
    pub hint: Option<String>,
    /// `true` when the hint was declared in `<>` (value mandatory).
    pub value_required: bool,
    pub env: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub regex: Option<Regex>,
    pub hidden: bool,
    pub order: usize,
    pub callback: Option<Callback>,
    ty: TypeDef,
}

impl OptionSpec {
    /// Parses a format string into an option definition.
    ///
    /// Fails with [`DefinitionError::InvalidOptionFormat`] when the format
    /// does not match the option grammar, and with
    /// [`DefinitionError::UnknownType`] when the datatype was never
    /// registered. Both are construction-time failures by design.
    pub fn new(format: &str, params: OptionParams) -> Result<Self, DefinitionError> {
        let format = format.trim();
        let caps = OPTION_FORMAT_RE
            .captures(format)
            .ok_or_else(|| DefinitionError::InvalidOptionFormat(format.to_string()))?;

        let short = caps.name("short").map(|m| m.as_str().to_string());
        let long = caps.name("long").map(|m| m.as_str().to_string());
        if short.is_none() && long.is_none() {
            return Err(DefinitionError::InvalidOptionFormat(format.to_string()));
        }

        let negate = caps.name("no").is_some();
        let (hint, value_required) = match (caps.name("req"), caps.name("opt")) {
            (Some(m), _) => (Some(m.as_str().to_string()), true),
            (None, Some(m)) => (Some(m.as_str().to_string()), false),
            (None, None) => (None, false),
        };

        if negate && hint.is_some() {
            return Err(DefinitionError::InvalidOptionFormat(format.to_string()));
        }

        let is_flag = hint.is_none();
        let datatype = match params.datatype {
            Some(name) => name,
            None if is_flag => "bool".to_string(),
            None => "string".to_string(),
        };

        if negate && datatype != "bool" {
            return Err(DefinitionError::InvalidOptionFormat(format!(
                "{format}: a negated option must be a bool, not {datatype:?}"
            )));
        }
        if is_flag && datatype != "bool" && datatype != "count" {
            return Err(DefinitionError::InvalidOptionFormat(format!(
                "{format}: a flag must have a bool or count datatype, not {datatype:?}"
            )));
        }

        let ty = resolve_type(&datatype)?;
        let aliases = parse_aliases(&params.aliases)?;

        let name = long
            .clone()
            .or_else(|| short.clone())
            .expect("checked above");

        let default = match params.default {
            Some(value) => Some(value),
            None if negate => Some(Value::Bool(true)),
            None => None,
        };

        Ok(Self {
            short,
            long,
            name,
            aliases,
            datatype,
            is_flag,
            negate,
            required: params.required,
            multiple: params.multiple,
            default,
            desc: params.desc,
            hint,
            value_required,
            env: params.env,
            min: params.min,
            max: params.max,
            regex: params.regex,
            hidden: params.hidden,
            order: params.order.unwrap_or(0),
            callback: params.callback,
            ty,
        })
    }

    /// Coerces a raw value through the registered datatype transform.
    ///
    /// Boolean results are flipped when the option was supplied in its
    /// negated form; numeric results are range-checked against `min`/`max`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdtree_core::{OptionParams, OptionSpec, Value};
    ///
    /// let opt = OptionSpec::new("-n <num>", OptionParams {
    ///     datatype: Some("int".into()),
    ///     min: Some(1.0),
    ///     ..Default::default()
    /// }).unwrap();
    /// assert_eq!(opt.transform("5", false).unwrap(), Value::Int(5));
    /// assert!(opt.transform("0", false).is_err());
    /// assert!(opt.transform("five", false).is_err());
    /// ```
    pub fn transform(&self, raw: &str, negated: bool) -> Result<Value, TransformError> {
        if let Some(re) = &self.regex
            && !re.is_match(raw)
        {
            return Err(TransformError::PatternMismatch {
                raw: raw.to_string(),
            });
        }

        let mut value = self.ty.apply(raw)?;

        if self.datatype == "bool"
            && negated
            && let Value::Bool(b) = value
        {
            value = Value::Bool(!b);
        }

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

    /// The default seeded into `argv` when the option never appears.
    ///
    /// Explicit defaults win; otherwise booleans default to the negation
    /// state, counts to zero, and `multiple` options to an empty array.
    pub fn effective_default(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        if self.multiple {
            return Value::Array(Vec::new());
        }
        match self.datatype.as_str() {
            "bool" => Value::Bool(self.negate),
            "count" => Value::Count(0),
            _ => Value::Null,
        }
    }

    /// Renders the canonical `-s, --long <hint>` label for help output.
    pub fn format_label(&self) -> String {
        let mut label = String::new();
        if let Some(short) = &self.short {
            label.push('-');
            label.push_str(short);
        }
        if let Some(long) = &self.long {
            if !label.is_empty() {
                label.push_str(", ");
            }
            label.push_str("--");
            if self.negate {
                label.push_str("no-");
            }
            label.push_str(long);
        }
        match (&self.hint, self.value_required) {
            (Some(hint), true) => {
                label.push_str(" <");
                label.push_str(hint);
                label.push('>');
            }
            (Some(hint), false) => {
                label.push_str(" [");
                label.push_str(hint);
                label.push(']');
            }
            (None, _) => {}
        }
        label
    }
}

fn parse_aliases(raw: &[String]) -> Result<Aliases, DefinitionError> {
    let mut aliases = Aliases::default();
    for alias in raw {
        let (visible, body) = match alias.strip_prefix('!') {
            Some(rest) => (false, rest),
            None => (true, alias.as_str()),
        };
        if let Some(caps) = LONG_ALIAS_RE.captures(body) {
            aliases.long.insert(caps[1].to_string(), visible);
        } else if let Some(caps) = SHORT_ALIAS_RE.captures(body) {
            aliases.short.insert(caps[1].to_string(), visible);
        } else {
            return Err(DefinitionError::InvalidAlias(alias.clone()));
        }
    }
    Ok(aliases)
}
