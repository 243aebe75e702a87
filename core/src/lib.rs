//! Grammar model for context-tree command lines.
//!
//! A command line is described as a tree of [`Context`] nodes. Each node
//! declares options (from `getopt`-style format strings), positional
//! arguments (bracket syntax), subcommands, and filesystem extensions. The
//! tree is mutable at any time, including from callbacks fired while a
//! parse is in flight; every mutation bumps a revision counter that the
//! companion parser crate watches.
//!
//! Grammars can be built programmatically or loaded from JSON/YAML
//! descriptors, and subtrees can be kept on disk until first use.

pub mod argument;
pub mod callback;
pub mod collections;
pub mod command;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod extension;
pub mod help;
pub mod option;
pub mod types;
pub mod value;

pub use argument::{ArgumentParams, ArgumentSpec};
pub use callback::{Callback, CallbackData, CallbackOutcome};
pub use collections::{
    CommandMap, CommandsInput, ExtensionMap, ExtensionsInput, OptionGroup, OptionMap,
};
pub use command::{Action, Command, CommandParams};
pub use context::{Context, ExtensionHit};
pub use descriptor::{CommandDescriptor, HelpText, SubcommandDescriptor};
pub use error::{DefinitionError, TransformError};
pub use extension::Extension;
pub use help::HelpModel;
pub use option::{OptionParams, OptionSpec};
pub use types::{TypeDef, register_type, resolve_type};
pub use value::Value;

/// Converts a kebab- or snake-case name to camelCase.
///
/// Result keys use this form by default, so `--dry-run` lands in `argv`
/// as `dryRun`.
///
/// # Examples
///
/// ```
/// assert_eq!(cmdtree_core::camel_case("dry-run"), "dryRun");
/// assert_eq!(cmdtree_core::camel_case("no_color"), "noColor");
/// assert_eq!(cmdtree_core::camel_case("v"), "v");
/// ```
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' || ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("force"), "force");
        assert_eq!(camel_case("dry-run"), "dryRun");
        assert_eq!(camel_case("a-b-c"), "aBC");
        assert_eq!(camel_case("-leading"), "leading");
        assert_eq!(camel_case(""), "");
    }
}
