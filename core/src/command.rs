//! Named command nodes in a context tree.
//!
//! A command owns its own [`Context`] (composition rather than
//! inheritance), so descending into a command during parsing simply pushes
//! that context onto the stack. Commands may be fully defined up front, or
//! backed by a descriptor file that is read the first time the parser
//! reaches them.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::argument::ArgumentParams;
use crate::context::Context;
use crate::descriptor::CommandDescriptor;
use crate::error::DefinitionError;

static COMMAND_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[@!]?[A-Za-z0-9][A-Za-z0-9:._-]*$").expect("static regex must compile")
});

/// What a matched command ultimately does.
///
/// The parser never runs actions; it reports the matched command chain and
/// the embedding application dispatches. Spawn actions are the contract
/// handed to the process-spawn collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Named handler dispatched by the embedding application.
    Named(String),
    /// Spawn an external executable, passing the remaining tokens through
    /// verbatim.
    Spawn { executable: PathBuf },
    /// Placeholder for a failed extension resolution; reports the captured
    /// error instead of aborting unrelated commands.
    Stub { message: String },
}

/// Optional settings accepted alongside a command name string.
#[derive(Debug, Default)]
pub struct CommandParams {
    pub action: Option<Action>,
    /// Extra aliases beyond those in the name string (`!`/`@` prefix hides).
    pub aliases: Vec<String>,
    pub desc: Option<String>,
    pub title: Option<String>,
    pub hidden: bool,
}

#[derive(Debug)]
struct CommandShared {
    /// Aliases other than the canonical name; value is `true` when visible.
    aliases: HashMap<String, bool>,
    action: Option<Action>,
    hidden: bool,
    definition_path: Option<PathBuf>,
    loaded: Cell<bool>,
}

/// A named, possibly aliased command node.
///
/// Cloning a `Command` clones handles, not state: every clone shares the
/// same context and load flag, so a command reached through different
/// aliases is still loaded exactly once.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{Command, CommandParams};
///
/// let cmd = Command::new("ls, list <path>", CommandParams::default()).unwrap();
/// assert_eq!(cmd.name(), "ls");
/// assert!(cmd.aliases().contains_key("list"));
/// assert_eq!(cmd.context().arguments().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    context: Context,
    shared: Rc<CommandShared>,
}

impl Command {
    /// Creates a fully-defined command from a name string.
    ///
    /// The name grammar: comma-separated aliases, first unprefixed token is
    /// the canonical name, `@`/`!` prefixes mark hidden aliases, and
    /// trailing `<arg>`/`[arg]` tokens declare inline positional arguments.
    pub fn new(name: &str, params: CommandParams) -> Result<Self, DefinitionError> {
        let parsed = parse_name(name)?;
        let context = Context::named(&parsed.canonical);
        if let Some(title) = &params.title {
            context.set_title(title);
        }
        if let Some(desc) = &params.desc {
            context.set_desc(desc);
        }
        for arg in &parsed.args {
            context.argument(arg.as_str(), ArgumentParams::default())?;
        }

        let mut aliases = parsed.aliases;
        for alias in &params.aliases {
            let (visible, body) = split_alias_prefix(alias);
            if !COMMAND_TOKEN_RE.is_match(body) || body.starts_with(['@', '!']) {
                return Err(DefinitionError::InvalidAlias(alias.clone()));
            }
            aliases.insert(body.to_string(), visible);
        }

        Ok(Self {
            context,
            shared: Rc::new(CommandShared {
                aliases,
                action: params.action,
                hidden: params.hidden,
                definition_path: None,
                loaded: Cell::new(true),
            }),
        })
    }

    /// Creates a command whose definition lives in a descriptor file.
    ///
    /// The file is not touched until [`load`](Command::load) runs.
    pub fn from_file(name: &str, path: impl Into<PathBuf>) -> Result<Self, DefinitionError> {
        let cmd = Self::new(name, CommandParams::default())?;
        let shared = Rc::new(CommandShared {
            aliases: cmd.shared.aliases.clone(),
            action: None,
            hidden: false,
            definition_path: Some(path.into()),
            loaded: Cell::new(false),
        });
        Ok(Self {
            context: cmd.context,
            shared,
        })
    }

    /// Creates a command from an in-memory descriptor.
    ///
    /// `base_dir` anchors any relative `file` references inside the
    /// descriptor.
    pub fn from_descriptor(
        name: &str,
        descriptor: &CommandDescriptor,
        base_dir: Option<&Path>,
    ) -> Result<Self, DefinitionError> {
        let mut cmd = Self::new(name, CommandParams::default())?;
        cmd.context.apply_descriptor(descriptor, base_dir)?;

        let mut aliases = cmd.shared.aliases.clone();
        for alias in &descriptor.aliases {
            let (visible, body) = split_alias_prefix(alias);
            aliases.insert(body.to_string(), visible);
        }
        let action = descriptor.action.clone().map(Action::Named);
        cmd.shared = Rc::new(CommandShared {
            aliases,
            action,
            hidden: descriptor.hidden,
            definition_path: None,
            loaded: Cell::new(true),
        });
        Ok(cmd)
    }

    /// Creates a command wrapping an action directly (used for extension
    /// exports).
    pub(crate) fn with_action(name: &str, action: Action) -> Result<Self, DefinitionError> {
        Self::new(
            name,
            CommandParams {
                action: Some(action),
                ..Default::default()
            },
        )
    }

    /// Canonical command name.
    pub fn name(&self) -> String {
        self.context.name().unwrap_or_default()
    }

    /// The command's own grammar context.
    pub fn context(&self) -> Context {
        self.context.clone()
    }

    /// Aliases other than the canonical name, keyed by name with a
    /// visibility flag.
    pub fn aliases(&self) -> &HashMap<String, bool> {
        &self.shared.aliases
    }

    pub fn action(&self) -> Option<&Action> {
        self.shared.action.as_ref()
    }

    pub fn hidden(&self) -> bool {
        self.shared.hidden
    }

    /// Whether the backing definition has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.shared.loaded.get()
    }

    /// Loads the backing descriptor file, exactly once.
    ///
    /// Idempotent: the `loaded` flag flips before the file is read, so a
    /// command reached through several aliases (all sharing this handle)
    /// never re-applies its definition.
    pub fn load(&self) -> Result<(), DefinitionError> {
        if self.shared.loaded.get() {
            return Ok(());
        }
        self.shared.loaded.set(true);

        if let Some(path) = &self.shared.definition_path {
            debug!(command = %self.name(), path = %path.display(), "loading command definition");
            let descriptor = CommandDescriptor::from_file(path)?;
            self.context
                .apply_descriptor(&descriptor, path.parent())?;
        }
        Ok(())
    }

    /// Deep-clones this command into an independent node (shared callbacks,
    /// private grammar state).
    pub(crate) fn deep_clone(&self) -> Self {
        Self {
            context: self.context.deep_clone(),
            shared: Rc::new(CommandShared {
                aliases: self.shared.aliases.clone(),
                action: self.shared.action.clone(),
                hidden: self.shared.hidden,
                definition_path: self.shared.definition_path.clone(),
                loaded: Cell::new(self.shared.loaded.get()),
            }),
        }
    }
}

struct ParsedName {
    canonical: String,
    aliases: HashMap<String, bool>,
    args: Vec<String>,
}

fn split_alias_prefix(alias: &str) -> (bool, &str) {
    match alias.strip_prefix(['@', '!']) {
        Some(rest) => (false, rest),
        None => (true, alias),
    }
}

fn parse_name(name: &str) -> Result<ParsedName, DefinitionError> {
    let mut canonical: Option<String> = None;
    let mut aliases = HashMap::new();
    let mut args = Vec::new();

    for segment in name.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let mut tokens = segment.split_whitespace();
        let head = tokens
            .next()
            .ok_or_else(|| DefinitionError::InvalidCommand(format!("empty command in {name:?}")))?;

        if !COMMAND_TOKEN_RE.is_match(head) {
            return Err(DefinitionError::InvalidCommand(format!(
                "bad command token {head:?} in {name:?}"
            )));
        }

        let hidden = head.starts_with(['@', '!']);
        let stripped = head.trim_start_matches(['@', '!']);

        if canonical.is_none() && !hidden {
            canonical = Some(stripped.to_string());
        } else {
            aliases.insert(stripped.to_string(), !hidden);
        }

        // Trailing <arg>/[arg] tokens declare inline positional arguments.
        for token in tokens {
            if token.starts_with('<') || token.starts_with('[') {
                args.push(token.to_string());
            } else {
                return Err(DefinitionError::InvalidCommand(format!(
                    "unexpected token {token:?} in {name:?}"
                )));
            }
        }
    }

    let canonical = canonical.ok_or_else(|| {
        DefinitionError::InvalidCommand(format!("{name:?} has no visible command name"))
    })?;

    Ok(ParsedName {
        canonical,
        aliases,
        args,
    })
}
