//! The token stream the parser classifies.
//!
//! Input strings start life as [`Token::Raw`] and are classified in place.
//! When a callback mutates the grammar mid-parse, already-classified
//! `Unknown` and `Argument` tokens revert to `Raw` and are classified
//! again; `Option`, `Command`, `Extension`, and `Extra` tokens are final.

use std::rc::Rc;

use cmdtree_core::{Command, OptionSpec, Value};

#[derive(Debug, Clone)]
pub enum Token {
    /// Not yet classified.
    Raw(String),
    /// A resolved option occurrence.
    Option {
        spec: Rc<OptionSpec>,
        value: Value,
        negated: bool,
        /// Prevents the callback from refiring across re-classification.
        callback_fired: bool,
        /// Set when the callback asked to run again after classification.
        deferred: bool,
        /// The raw token as typed, e.g. `--level=3`.
        raw: String,
        /// A separate value token consumed from the stream, kept so
        /// re-classification can splice it back.
        value_raw: Option<String>,
    },
    /// An option-shaped token no definition matched.
    Unknown {
        name: String,
        negated: bool,
        /// Inline `=value`, if any.
        inline: Option<String>,
        /// A value token consumed from the stream, if any.
        value_raw: Option<String>,
        raw: String,
    },
    /// A matched subcommand; the stack descended into its context.
    Command { command: Command, raw: String },
    /// A matched extension-exported command.
    Extension { command: Command, raw: String },
    /// A positional token, bound to argument definitions after
    /// classification settles.
    Argument { raw: String },
    /// Everything after `--` (or after a passthrough extension), verbatim.
    Extra { tokens: Vec<String> },
}
