//! Re-entrant parser for context-tree command lines.
//!
//! [`parse`] classifies a token vector against a [`Context`] tree built
//! with `cmdtree-core`. Options resolve through the context parent chain,
//! bare words descend into subcommands (loading lazy definitions on first
//! use), and positional tokens bind to the head context's argument
//! definitions. Callbacks may mutate the grammar while the parse is in
//! flight; the parser detects the mutation and re-classifies earlier
//! tokens against the new grammar, firing each callback at most once.
//!
//! Value precedence in the result is default < parsed < environment.
//! Environment lookups go through [`ParseOptions`] rather than the process
//! environment, so parses are reproducible in tests and in server-style
//! embeddings.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{Context, OptionParams, Value};
//! use cmdtree_parser::{ParseOptions, parse};
//!
//! let ctx = Context::new();
//! ctx.option("-n, --name <value>", OptionParams::default()).unwrap();
//!
//! let args = vec!["--name".to_string(), "demo".to_string()];
//! let result = parse(args, &ctx, &ParseOptions::default()).unwrap();
//! assert_eq!(result.argv.get("name"), Some(&Value::String("demo".into())));
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use cmdtree_core::{Command, Context, Value};

pub mod error;
mod machine;
mod token;

pub use error::{ParseError, ParseErrorKind};

/// Ambient inputs to a parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Environment variables consulted for `env`-backed options and
    /// arguments.
    pub env: HashMap<String, String>,
}

impl ParseOptions {
    /// Captures the current process environment.
    pub fn from_process_env() -> Self {
        Self {
            env: std::env::vars().collect(),
        }
    }

    /// Builds options from an explicit environment map.
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self { env }
    }
}

/// The outcome of a successful parse.
#[derive(Debug, Serialize)]
pub struct ParseResult {
    /// Typed values keyed by option/argument name (camelCase unless the
    /// head context disables it).
    pub argv: BTreeMap<String, Value>,
    /// Leftover positional tokens plus everything after `--`.
    #[serde(rename = "_")]
    pub args: Vec<Value>,
    /// Values for options no definition matched, keyed by the name as
    /// typed.
    pub unknown: BTreeMap<String, Value>,
    /// The context chain the parse ended on, most specific first.
    #[serde(skip)]
    pub contexts: Vec<Context>,
    /// The deepest command the line descended into, if any.
    #[serde(skip)]
    pub command: Option<Command>,
}

impl ParseResult {
    /// Looks up a parsed value by its result key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.argv.get(key)
    }
}

/// Parses a token vector against a context tree.
pub fn parse(
    args: Vec<String>,
    ctx: &Context,
    options: &ParseOptions,
) -> Result<ParseResult, ParseError> {
    machine::Machine::run(args, ctx, options)
}
