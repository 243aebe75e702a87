//! Grouped collections backing a context's enumerable grammar.
//!
//! Lookup during parsing goes through the context's alias indexes; these
//! collections preserve declaration order and grouping for help output and
//! re-registration semantics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::command::Command;
use crate::descriptor::SubcommandDescriptor;
use crate::error::DefinitionError;
use crate::extension::Extension;
use crate::option::OptionSpec;

/// Commands keyed by canonical name.
pub type CommandMap = BTreeMap<String, Command>;

/// Extensions keyed by name.
pub type ExtensionMap = BTreeMap<String, Extension>;

/// Options grouped for help output, in declaration order.
///
/// Re-registering an option whose canonical name already appears anywhere
/// in the map supersedes the earlier definition: the old entry is removed
/// and the new one appended to its target group, so both lookup and help
/// reflect only the latest definition.
#[derive(Debug, Clone, Default)]
pub struct OptionMap {
    groups: Vec<OptionGroup>,
}

/// One named help group of options.
#[derive(Debug, Clone)]
pub struct OptionGroup {
    pub name: String,
    pub options: Vec<Rc<OptionSpec>>,
}

impl OptionMap {
    /// The group unlabelled options land in.
    pub const DEFAULT_GROUP: &'static str = "Options";

    /// Inserts an option into a group, superseding any earlier option with
    /// the same canonical name.
    pub fn insert(&mut self, group: Option<&str>, spec: Rc<OptionSpec>) {
        self.remove(&spec.name);

        let group = group.unwrap_or(Self::DEFAULT_GROUP);
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(g) => g.options.push(spec),
            None => self.groups.push(OptionGroup {
                name: group.to_string(),
                options: vec![spec],
            }),
        }
    }

    fn remove(&mut self, name: &str) {
        for group in &mut self.groups {
            group.options.retain(|opt| opt.name != name);
        }
        self.groups.retain(|group| !group.options.is_empty());
    }

    pub fn groups(&self) -> &[OptionGroup] {
        &self.groups
    }

    /// All options across groups, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<OptionSpec>> {
        self.groups.iter().flat_map(|group| group.options.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.options.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Accepted inputs when registering commands on a context.
#[derive(Debug)]
pub enum CommandsInput {
    /// A directory of `.json`/`.yaml`/`.yml` descriptor files, one lazy
    /// command per file keyed by its stem.
    Dir(PathBuf),
    /// An in-memory subcommand descriptor.
    Descriptor(SubcommandDescriptor),
    /// A single prebuilt command.
    Instance(Command),
    /// Several prebuilt commands.
    Collection(Vec<Command>),
}

impl From<SubcommandDescriptor> for CommandsInput {
    fn from(descriptor: SubcommandDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<PathBuf> for CommandsInput {
    fn from(path: PathBuf) -> Self {
        Self::Dir(path)
    }
}

impl From<&Path> for CommandsInput {
    fn from(path: &Path) -> Self {
        Self::Dir(path.to_path_buf())
    }
}

impl From<Command> for CommandsInput {
    fn from(command: Command) -> Self {
        Self::Instance(command)
    }
}

impl From<Vec<Command>> for CommandsInput {
    fn from(commands: Vec<Command>) -> Self {
        Self::Collection(commands)
    }
}

/// Accepted inputs when registering extensions on a context.
#[derive(Debug)]
pub enum ExtensionsInput {
    /// A filesystem path resolved permissively.
    Path(PathBuf),
    /// A single resolved extension.
    Instance(Extension),
    /// Several resolved extensions.
    Collection(Vec<Extension>),
}

impl From<PathBuf> for ExtensionsInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ExtensionsInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Extension> for ExtensionsInput {
    fn from(extension: Extension) -> Self {
        Self::Instance(extension)
    }
}

impl From<Vec<Extension>> for ExtensionsInput {
    fn from(extensions: Vec<Extension>) -> Self {
        Self::Collection(extensions)
    }
}

/// Scans a directory for descriptor files and wraps each as a lazy command
/// named after the file stem.
pub(crate) fn commands_from_dir(dir: &Path) -> Result<Vec<Command>, DefinitionError> {
    if !dir.is_dir() {
        return Err(DefinitionError::FileNotFound(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| DefinitionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut commands = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DefinitionError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_descriptor = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json") | Some("yaml") | Some("yml")
        );
        if !is_descriptor {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        commands.push(Command::from_file(stem, &path)?);
    }

    // Deterministic registration order regardless of readdir order.
    commands.sort_by_key(|cmd| cmd.name());
    Ok(commands)
}
