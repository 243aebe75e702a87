//! Parse-time errors.
//!
//! Every error carries the context chain that was active when it was
//! raised, most specific first, so callers can render help for the right
//! level of the command tree.

use cmdtree_core::{Context, DefinitionError, TransformError};
use thiserror::Error;

/// A failed parse, with the context chain at the point of failure.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Active contexts, most specific first.
    pub contexts: Vec<Context>,
}

impl ParseError {
    /// Builds an error from a root-to-head context stack.
    pub(crate) fn new(kind: ParseErrorKind, stack: &[Context]) -> Self {
        Self {
            kind,
            contexts: stack.iter().rev().cloned().collect(),
        }
    }
}

/// What went wrong during a parse.
#[derive(Debug, Error)]
pub enum ParseErrorKind {
    /// Required positional arguments were never bound. Reported before any
    /// option errors, with the full list of missing names.
    #[error("missing required argument(s): {}", names.join(", "))]
    MissingRequiredArgument { names: Vec<String> },
    /// Required options were never supplied, by flag or environment.
    #[error("missing required option(s): {}", names.join(", "))]
    MissingRequiredOption { names: Vec<String> },
    /// A value failed datatype coercion or validation.
    #[error("invalid value for {name}: {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: TransformError,
    },
    /// An option declared with a `<value>` hint got no value.
    #[error("option {name} requires a value")]
    MissingOptionValue { name: String },
    /// A lazily loaded definition turned out to be broken.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    /// A user callback rejected the parse.
    #[error("callback for {name} failed: {message}")]
    Callback { name: String, message: String },
}
