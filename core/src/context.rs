//! The mutable grammar node a parse resolves against.
//!
//! A [`Context`] holds the options, positional arguments, subcommands, and
//! extensions visible at one level of a command tree. Contexts form a tree
//! through weak parent links; option lookup walks up the chain, so a
//! subcommand sees its ancestors' options, while commands and arguments
//! bind only at the level they were declared.
//!
//! `Context` is a cheap-clone handle (`Rc<RefCell<_>>`): clones share
//! state, and every mutation bumps a revision counter that the parser
//! watches to re-classify tokens mid-parse. Use
//! [`deep_clone`](Context::deep_clone) to fork an independent tree that
//! shares only the callbacks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::argument::{ArgumentParams, ArgumentSpec};
use crate::collections::{
    CommandMap, CommandsInput, ExtensionMap, ExtensionsInput, OptionMap, commands_from_dir,
};
use crate::command::{Command, CommandParams};
use crate::descriptor::{ArgumentDescriptor, CommandDescriptor, HelpText};
use crate::error::DefinitionError;
use crate::extension::Extension;
use crate::option::{OptionParams, OptionSpec};
use crate::value::Value;

/// Per-context parse configuration, inherited bottom-up: the most specific
/// context that sets a knob wins.
#[derive(Debug, Clone, Default)]
struct ContextConfig {
    camel_case: Option<bool>,
    treat_unknown_options_as_arguments: Option<bool>,
    default_command: Option<String>,
}

/// A command resolved through an extension's exports.
#[derive(Debug, Clone)]
pub struct ExtensionHit {
    pub command: Command,
    /// When set, classification stops at this command and the remaining
    /// tokens pass through to the spawned executable verbatim.
    pub passthrough: bool,
}

#[derive(Debug)]
struct ContextInner {
    name: Option<String>,
    title: Option<String>,
    desc: Option<String>,
    parent: Weak<RefCell<ContextInner>>,
    /// Bumped on every mutation; the parser compares revisions across the
    /// context stack to detect grammar changes made by callbacks.
    rev: u64,
    config: ContextConfig,
    help: HelpText,
    options: OptionMap,
    long_index: HashMap<String, Rc<OptionSpec>>,
    short_index: HashMap<String, Rc<OptionSpec>>,
    arguments: Vec<Rc<ArgumentSpec>>,
    commands: CommandMap,
    /// Canonical names plus every alias, hidden ones included.
    command_index: HashMap<String, Command>,
    extensions: ExtensionMap,
    extension_index: HashMap<String, ExtensionHit>,
}

/// Shared handle to one node of a command grammar tree.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{ArgumentParams, Context, OptionParams};
///
/// let ctx = Context::new();
/// ctx.option("-v, --verbose", OptionParams::default()).unwrap();
/// ctx.argument("<input>", ArgumentParams::default()).unwrap();
///
/// assert!(ctx.find_long("verbose").is_some());
/// assert_eq!(ctx.arguments().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Context(Rc<RefCell<ContextInner>>);

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an anonymous root context.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(ContextInner {
            name: None,
            title: None,
            desc: None,
            parent: Weak::new(),
            rev: 0,
            config: ContextConfig::default(),
            help: HelpText::default(),
            options: OptionMap::default(),
            long_index: HashMap::new(),
            short_index: HashMap::new(),
            arguments: Vec::new(),
            commands: CommandMap::new(),
            command_index: HashMap::new(),
            extensions: ExtensionMap::new(),
            extension_index: HashMap::new(),
        })))
    }

    /// Creates a named context (the node backing a command).
    pub fn named(name: &str) -> Self {
        let ctx = Self::new();
        ctx.0.borrow_mut().name = Some(name.to_string());
        ctx
    }

    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    pub fn title(&self) -> Option<String> {
        self.0.borrow().title.clone()
    }

    pub fn desc(&self) -> Option<String> {
        self.0.borrow().desc.clone()
    }

    pub fn set_title(&self, title: &str) {
        let mut inner = self.0.borrow_mut();
        inner.title = Some(title.to_string());
        inner.rev += 1;
    }

    pub fn set_desc(&self, desc: &str) {
        let mut inner = self.0.borrow_mut();
        inner.desc = Some(desc.to_string());
        inner.rev += 1;
    }

    pub fn set_help(&self, help: HelpText) {
        let mut inner = self.0.borrow_mut();
        inner.help = help;
        inner.rev += 1;
    }

    pub fn help_text(&self) -> HelpText {
        self.0.borrow().help.clone()
    }

    pub fn parent(&self) -> Option<Context> {
        self.0.borrow().parent.upgrade().map(Context)
    }

    /// Current revision; bumped on every mutation.
    pub fn rev(&self) -> u64 {
        self.0.borrow().rev
    }

    fn set_parent(&self, parent: &Context) {
        let mut inner = self.0.borrow_mut();
        inner.parent = Rc::downgrade(&parent.0);
    }

    // Config knobs, inherited bottom-up.

    pub fn camel_case(&self) -> bool {
        self.inherited(|config| config.camel_case).unwrap_or(true)
    }

    pub fn set_camel_case(&self, enabled: bool) {
        let mut inner = self.0.borrow_mut();
        inner.config.camel_case = Some(enabled);
        inner.rev += 1;
    }

    pub fn treat_unknown_options_as_arguments(&self) -> bool {
        self.inherited(|config| config.treat_unknown_options_as_arguments)
            .unwrap_or(false)
    }

    pub fn set_treat_unknown_options_as_arguments(&self, enabled: bool) {
        let mut inner = self.0.borrow_mut();
        inner.config.treat_unknown_options_as_arguments = Some(enabled);
        inner.rev += 1;
    }

    /// Command name descended into when the line names no command.
    pub fn default_command(&self) -> Option<String> {
        self.0.borrow().config.default_command.clone()
    }

    pub fn set_default_command(&self, name: &str) {
        let mut inner = self.0.borrow_mut();
        inner.config.default_command = Some(name.to_string());
        inner.rev += 1;
    }

    fn inherited<T>(&self, pick: impl Fn(&ContextConfig) -> Option<T>) -> Option<T> {
        let mut cursor = Some(self.clone());
        while let Some(ctx) = cursor {
            if let Some(value) = pick(&ctx.0.borrow().config) {
                return Some(value);
            }
            cursor = ctx.parent();
        }
        None
    }

    // Registration. Every method bumps the revision so an in-flight parse
    // notices the grammar changed.

    /// Registers an option from a format string.
    pub fn option(
        &self,
        format: &str,
        params: OptionParams,
    ) -> Result<Rc<OptionSpec>, DefinitionError> {
        self.option_group(None, format, params)
    }

    /// Registers an option under a named help group.
    ///
    /// Re-registering a name supersedes the earlier definition in both the
    /// lookup indexes and the enumerable groups.
    pub fn option_group(
        &self,
        group: Option<&str>,
        format: &str,
        params: OptionParams,
    ) -> Result<Rc<OptionSpec>, DefinitionError> {
        let spec = Rc::new(OptionSpec::new(format, params)?);

        let mut inner = self.0.borrow_mut();
        let old = inner
            .options
            .iter()
            .find(|existing| existing.name == spec.name)
            .cloned();
        if let Some(old) = old {
            unindex_option(&mut inner, &old);
        }
        index_option(&mut inner, &spec);
        inner.options.insert(group, spec.clone());
        inner.rev += 1;
        Ok(spec)
    }

    /// Registers a positional argument.
    pub fn argument(
        &self,
        name: &str,
        params: ArgumentParams,
    ) -> Result<Rc<ArgumentSpec>, DefinitionError> {
        let spec = Rc::new(ArgumentSpec::new(name, params)?);
        let mut inner = self.0.borrow_mut();
        inner.arguments.push(spec.clone());
        inner.rev += 1;
        Ok(spec)
    }

    /// Creates and registers a subcommand.
    pub fn command(&self, name: &str, params: CommandParams) -> Result<Command, DefinitionError> {
        let cmd = Command::new(name, params)?;
        self.register_command(cmd.clone());
        Ok(cmd)
    }

    /// Creates and registers a lazily loaded subcommand backed by a
    /// descriptor file.
    pub fn command_from_file(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Command, DefinitionError> {
        let cmd = Command::from_file(name, path.as_ref())?;
        self.register_command(cmd.clone());
        Ok(cmd)
    }

    /// Registers commands from a directory, a prebuilt instance, or a
    /// collection.
    pub fn commands(&self, input: impl Into<CommandsInput>) -> Result<(), DefinitionError> {
        match input.into() {
            CommandsInput::Dir(dir) => {
                for cmd in commands_from_dir(&dir)? {
                    self.register_command(cmd);
                }
            }
            CommandsInput::Descriptor(sub) => {
                let cmd = match &sub.file {
                    Some(file) => Command::from_file(&sub.name, file.clone())?,
                    None => Command::from_descriptor(&sub.name, &sub.spec, None)?,
                };
                self.register_command(cmd);
            }
            CommandsInput::Instance(cmd) => self.register_command(cmd),
            CommandsInput::Collection(cmds) => {
                for cmd in cmds {
                    self.register_command(cmd);
                }
            }
        }
        Ok(())
    }

    /// Registers a prebuilt command, superseding any earlier command with
    /// the same canonical name.
    pub fn register_command(&self, cmd: Command) {
        cmd.context().set_parent(self);
        debug!(command = %cmd.name(), context = ?self.name(), "registering command");

        let mut inner = self.0.borrow_mut();
        inner.command_index.insert(cmd.name(), cmd.clone());
        for alias in cmd.aliases().keys() {
            inner.command_index.insert(alias.clone(), cmd.clone());
        }
        inner.commands.insert(cmd.name(), cmd);
        inner.rev += 1;
    }

    /// Registers extensions from a path, a resolved instance, or a
    /// collection. Paths resolve permissively: failures become stub
    /// commands rather than definition errors.
    pub fn extensions(&self, input: impl Into<ExtensionsInput>) -> Result<(), DefinitionError> {
        match input.into() {
            ExtensionsInput::Path(path) => {
                let ext = Extension::new(None, path)?;
                self.register_extension(ext);
            }
            ExtensionsInput::Instance(ext) => self.register_extension(ext),
            ExtensionsInput::Collection(exts) => {
                for ext in exts {
                    self.register_extension(ext);
                }
            }
        }
        Ok(())
    }

    /// Registers a resolved extension and indexes its exported commands.
    pub fn register_extension(&self, ext: Extension) {
        for cmd in ext.commands() {
            cmd.context().set_parent(self);
        }

        let mut inner = self.0.borrow_mut();
        for cmd in ext.commands() {
            let hit = ExtensionHit {
                command: cmd.clone(),
                passthrough: ext.passthrough(),
            };
            for alias in cmd.aliases().keys() {
                inner.extension_index.insert(alias.clone(), hit.clone());
            }
            inner.extension_index.insert(cmd.name(), hit);
        }
        inner.extensions.insert(ext.name().to_string(), ext);
        inner.rev += 1;
    }

    // Lookup.

    /// Resolves a long option name, walking up the parent chain.
    pub fn find_long(&self, name: &str) -> Option<Rc<OptionSpec>> {
        let mut cursor = Some(self.clone());
        while let Some(ctx) = cursor {
            if let Some(spec) = ctx.0.borrow().long_index.get(name) {
                return Some(spec.clone());
            }
            cursor = ctx.parent();
        }
        None
    }

    /// Resolves a short option letter, walking up the parent chain.
    pub fn find_short(&self, name: &str) -> Option<Rc<OptionSpec>> {
        let mut cursor = Some(self.clone());
        while let Some(ctx) = cursor {
            if let Some(spec) = ctx.0.borrow().short_index.get(name) {
                return Some(spec.clone());
            }
            cursor = ctx.parent();
        }
        None
    }

    /// Resolves a command name or alias in this context only.
    pub fn find_command(&self, name: &str) -> Option<Command> {
        self.0.borrow().command_index.get(name).cloned()
    }

    /// Resolves an extension-exported command in this context only.
    pub fn find_extension_command(&self, name: &str) -> Option<ExtensionHit> {
        self.0.borrow().extension_index.get(name).cloned()
    }

    // Enumeration, for defaults seeding and help generation.

    pub fn options(&self) -> OptionMap {
        self.0.borrow().options.clone()
    }

    pub fn arguments(&self) -> Vec<Rc<ArgumentSpec>> {
        self.0.borrow().arguments.clone()
    }

    pub fn command_entries(&self) -> Vec<Command> {
        self.0.borrow().commands.values().cloned().collect()
    }

    pub fn extension_entries(&self) -> Vec<Extension> {
        self.0.borrow().extensions.values().cloned().collect()
    }

    /// Applies a declarative descriptor to this context.
    ///
    /// `base_dir` anchors relative `file` and extension paths.
    pub fn apply_descriptor(
        &self,
        descriptor: &CommandDescriptor,
        base_dir: Option<&Path>,
    ) -> Result<(), DefinitionError> {
        {
            let mut inner = self.0.borrow_mut();
            if let Some(title) = &descriptor.title {
                inner.title = Some(title.clone());
            }
            if let Some(desc) = &descriptor.desc {
                inner.desc = Some(desc.clone());
            }
            if let Some(v) = descriptor.camel_case {
                inner.config.camel_case = Some(v);
            }
            if let Some(v) = descriptor.treat_unknown_options_as_arguments {
                inner.config.treat_unknown_options_as_arguments = Some(v);
            }
            if let Some(name) = &descriptor.default_command {
                inner.config.default_command = Some(name.clone());
            }
            if let Some(help) = &descriptor.help {
                inner.help = help.clone();
            }
            inner.rev += 1;
        }

        for opt in &descriptor.options {
            let params = OptionParams {
                aliases: opt.aliases.clone(),
                datatype: opt.datatype.clone(),
                default: opt.default.as_ref().map(Value::from_json),
                desc: opt.desc.clone(),
                env: opt.env.clone(),
                hidden: opt.hidden,
                min: opt.min,
                max: opt.max,
                multiple: opt.multiple,
                required: opt.required,
                ..Default::default()
            };
            self.option_group(opt.group.as_deref(), &opt.format, params)?;
        }

        for arg in &descriptor.args {
            match arg {
                ArgumentDescriptor::Name(name) => {
                    self.argument(name, ArgumentParams::default())?;
                }
                ArgumentDescriptor::Spec(spec) => {
                    let params = ArgumentParams {
                        datatype: spec.datatype.clone(),
                        desc: spec.desc.clone(),
                        env: spec.env.clone(),
                        hidden: spec.hidden,
                        min: spec.min,
                        max: spec.max,
                        multiple: spec.multiple,
                        required: spec.required,
                        ..Default::default()
                    };
                    self.argument(&spec.name, params)?;
                }
            }
        }

        for sub in &descriptor.commands {
            let cmd = match &sub.file {
                Some(file) => Command::from_file(&sub.name, resolve_path(file, base_dir))?,
                None => Command::from_descriptor(&sub.name, &sub.spec, base_dir)?,
            };
            self.register_command(cmd);
        }

        for ext in &descriptor.extensions {
            let path = resolve_path(&ext.path, base_dir);
            let ext = Extension::new(ext.name.as_deref(), path)?;
            self.register_extension(ext);
        }

        Ok(())
    }

    /// Forks an independent copy of this context subtree.
    ///
    /// Option and argument definitions (and their callbacks) are shared;
    /// the mutable structure — indexes, subcommand trees, config — is
    /// copied, so mutations on either side never leak to the other.
    pub fn deep_clone(&self) -> Context {
        let (clone, commands, extensions) = {
            let inner = self.0.borrow();
            let clone = Context(Rc::new(RefCell::new(ContextInner {
                name: inner.name.clone(),
                title: inner.title.clone(),
                desc: inner.desc.clone(),
                parent: Weak::new(),
                rev: inner.rev,
                config: inner.config.clone(),
                help: inner.help.clone(),
                options: inner.options.clone(),
                long_index: inner.long_index.clone(),
                short_index: inner.short_index.clone(),
                arguments: inner.arguments.clone(),
                commands: CommandMap::new(),
                command_index: HashMap::new(),
                extensions: ExtensionMap::new(),
                extension_index: HashMap::new(),
            })));
            let commands: Vec<Command> = inner.commands.values().map(Command::deep_clone).collect();
            let extensions: Vec<Extension> = inner
                .extensions
                .values()
                .map(Extension::deep_clone)
                .collect();
            (clone, commands, extensions)
        };

        for cmd in commands {
            clone.register_command(cmd);
        }
        for ext in extensions {
            clone.register_extension(ext);
        }
        clone
    }
}

fn index_option(inner: &mut ContextInner, spec: &Rc<OptionSpec>) {
    if let Some(long) = &spec.long {
        inner.long_index.insert(long.clone(), spec.clone());
    }
    if let Some(short) = &spec.short {
        inner.short_index.insert(short.clone(), spec.clone());
    }
    // Hidden aliases resolve during parsing too; visibility only affects
    // help output.
    for alias in spec.aliases.long.keys() {
        inner.long_index.insert(alias.clone(), spec.clone());
    }
    for alias in spec.aliases.short.keys() {
        inner.short_index.insert(alias.clone(), spec.clone());
    }
}

fn unindex_option(inner: &mut ContextInner, spec: &Rc<OptionSpec>) {
    if let Some(long) = &spec.long {
        inner.long_index.remove(long);
    }
    if let Some(short) = &spec.short {
        inner.short_index.remove(short);
    }
    for alias in spec.aliases.long.keys() {
        inner.long_index.remove(alias);
    }
    for alias in spec.aliases.short.keys() {
        inner.short_index.remove(alias);
    }
}

fn resolve_path(path: &Path, base_dir: Option<&Path>) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        match base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }
}
