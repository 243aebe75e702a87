//! Construction-time and coercion errors.
//!
//! Malformed format strings, unknown datatypes, and broken extension paths
//! are programmer errors in the grammar definition, not user input errors.
//! They surface synchronously as [`DefinitionError`] when the grammar is
//! built, never during parsing. Value coercion failures are user input
//! errors and surface as [`TransformError`] from `transform()` calls.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a grammar definition.
///
/// These always indicate a broken CLI definition (or a broken definition
/// file) and are not recoverable at parse time.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// An option format string did not match the option grammar.
    #[error("invalid option format: {0:?}")]
    InvalidOptionFormat(String),
    /// An alias was neither a `-x` short form nor a `--long` form.
    #[error("invalid alias: {0:?}")]
    InvalidAlias(String),
    /// An argument descriptor was malformed.
    #[error("invalid argument definition: {0}")]
    InvalidArgument(String),
    /// A command name string did not match the command name grammar.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    /// An extension path could not be resolved (strict mode only).
    #[error("invalid extension: {0}")]
    InvalidExtension(String),
    /// An option or argument referenced a datatype that was never registered.
    #[error("unknown datatype: {0:?}")]
    UnknownType(String),
    /// A lazy definition file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    /// A definition file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A definition file could not be deserialized.
    #[error("failed to parse {path}: {message}")]
    BadDescriptor { path: PathBuf, message: String },
}

/// Errors raised while coercing a raw string into a typed [`Value`].
///
/// These represent bad user input and are surfaced by the parser together
/// with the partial context chain.
///
/// [`Value`]: crate::Value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The raw string is not valid for the datatype.
    #[error("expected {expected}, got {raw:?}")]
    Invalid { expected: &'static str, raw: String },
    /// A numeric value fell below the declared minimum.
    #[error("value {value} must not be less than {min}")]
    BelowMinimum { value: f64, min: f64 },
    /// A numeric value rose above the declared maximum.
    #[error("value {value} must not be greater than {max}")]
    AboveMaximum { value: f64, max: f64 },
    /// The raw string failed the declared validation pattern.
    #[error("value {raw:?} does not match the expected pattern")]
    PatternMismatch { raw: String },
    /// A user callback rejected the value.
    #[error("{0}")]
    Rejected(String),
}
