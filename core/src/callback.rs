//! User callbacks fired as options and arguments are parsed.
//!
//! A callback observes the coerced value and the context it resolved
//! against, and may mutate the grammar (registering new options, commands,
//! or arguments) while parsing is still in flight. The parser detects such
//! mutations through the context revision counter and re-classifies earlier
//! tokens, so a callback can change how the rest of the line — or the part
//! already consumed — is interpreted.

use std::rc::Rc;

use crate::context::Context;
use crate::error::TransformError;
use crate::value::Value;

/// Data handed to an option or argument callback.
#[derive(Debug, Clone)]
pub struct CallbackData {
    /// The context the option/argument resolved against (the head of the
    /// context stack at classification time). Mutating it bumps its
    /// revision and triggers re-classification of earlier tokens.
    pub ctx: Context,
    /// Canonical option/argument name.
    pub name: String,
    /// The coerced value.
    pub value: Value,
    /// Whether the option was supplied in its `--no-` form.
    pub negated: bool,
    /// `true` when this is the deferred re-invocation requested by
    /// [`CallbackOutcome::Defer`].
    pub deferred: bool,
}

/// What the parser should do with the value after a callback returns.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// Keep the coerced value unchanged.
    Keep,
    /// Substitute a different value.
    Replace(Value),
    /// Re-invoke this callback once classification of the remaining tokens
    /// has finished, so it can observe the fully parsed line. The second
    /// invocation sees `deferred == true` and its outcome is final.
    Defer,
}

type CallbackFn = dyn Fn(&mut CallbackData) -> Result<CallbackOutcome, TransformError>;

/// Shared handle to a parse-time callback.
///
/// Cloning the handle shares the underlying function; deep-cloned context
/// trees therefore reuse callbacks while keeping their grammar state
/// independent.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    /// Wraps a callback function.
    pub fn new(
        f: impl Fn(&mut CallbackData) -> Result<CallbackOutcome, TransformError> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    /// Invokes the callback.
    pub fn invoke(&self, data: &mut CallbackData) -> Result<CallbackOutcome, TransformError> {
        (self.0)(data)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Callback(..)")
    }
}
