//! External command packages resolved from the filesystem.
//!
//! An extension points at a path and contributes commands without the host
//! grammar knowing their definitions up front. Three shapes are recognized:
//!
//! - an executable file exports a single spawn command under the extension
//!   name, with the remaining command-line tokens passed through verbatim
//! - a directory carrying a `cmdtree.json` / `cmdtree.yaml` manifest with a
//!   `commands` map exports one lazily loaded command per entry
//! - a manifest with only a `main` entry wraps that script as a single
//!   spawn command
//!
//! Resolution is permissive by default: a path that fails to resolve
//! becomes a stub command that reports the failure when reached, so one
//! broken extension cannot take down an otherwise healthy grammar. The
//! [`strict`](Extension::strict) constructor turns the same failures into
//! [`DefinitionError`]s.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::command::{Action, Command};
use crate::descriptor::{ExtensionExport, ExtensionManifest, MANIFEST_NAMES, load_descriptor};
use crate::error::DefinitionError;

/// A resolved extension and the commands it exports.
#[derive(Debug, Clone)]
pub struct Extension {
    name: String,
    path: PathBuf,
    exports: Vec<Command>,
    /// Set when the export is a plain executable: the parser stops
    /// classifying and hands the remaining tokens through untouched.
    passthrough: bool,
}

impl Extension {
    /// Resolves an extension permissively.
    ///
    /// Any resolution failure is captured as a stub command carrying the
    /// failure message.
    pub fn new(name: Option<&str>, path: impl Into<PathBuf>) -> Result<Self, DefinitionError> {
        Self::resolve(name, path.into(), false)
    }

    /// Resolves an extension, failing the grammar definition on any
    /// resolution problem.
    pub fn strict(name: Option<&str>, path: impl Into<PathBuf>) -> Result<Self, DefinitionError> {
        Self::resolve(name, path.into(), true)
    }

    fn resolve(name: Option<&str>, path: PathBuf, strict: bool) -> Result<Self, DefinitionError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    DefinitionError::InvalidExtension(format!(
                        "cannot derive a name from {}",
                        path.display()
                    ))
                })?,
        };

        match Self::resolve_exports(&name, &path) {
            Ok((exports, passthrough)) => {
                debug!(extension = %name, path = %path.display(), exports = exports.len(), "resolved extension");
                Ok(Self {
                    name,
                    path,
                    exports,
                    passthrough,
                })
            }
            Err(err) if strict => Err(err),
            Err(err) => {
                debug!(extension = %name, path = %path.display(), error = %err, "stubbing broken extension");
                let stub = Command::with_action(
                    &name,
                    Action::Stub {
                        message: err.to_string(),
                    },
                )?;
                Ok(Self {
                    name,
                    path,
                    exports: vec![stub],
                    passthrough: false,
                })
            }
        }
    }

    fn resolve_exports(name: &str, path: &Path) -> Result<(Vec<Command>, bool), DefinitionError> {
        if !path.exists() {
            return Err(DefinitionError::FileNotFound(path.to_path_buf()));
        }

        if path.is_file() {
            if !is_executable(path) {
                return Err(DefinitionError::InvalidExtension(format!(
                    "{} is not executable",
                    path.display()
                )));
            }
            let spawn = Command::with_action(
                name,
                Action::Spawn {
                    executable: path.to_path_buf(),
                },
            )?;
            return Ok((vec![spawn], true));
        }

        let manifest_path = MANIFEST_NAMES
            .iter()
            .map(|candidate| path.join(candidate))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                DefinitionError::InvalidExtension(format!(
                    "{} has no extension manifest",
                    path.display()
                ))
            })?;
        let manifest: ExtensionManifest = load_descriptor(&manifest_path)?;

        if !manifest.commands.is_empty() {
            let mut exports = Vec::with_capacity(manifest.commands.len());
            for (export_name, export) in &manifest.commands {
                let command = match export {
                    ExtensionExport::File(file) => {
                        Command::from_file(export_name, path.join(file))?
                    }
                    ExtensionExport::Inline(descriptor) => {
                        Command::from_descriptor(export_name, descriptor, Some(path))?
                    }
                };
                exports.push(command);
            }
            return Ok((exports, false));
        }

        if let Some(main) = &manifest.main {
            let spawn = Command::with_action(
                name,
                Action::Spawn {
                    executable: path.join(main),
                },
            )?;
            return Ok((vec![spawn], true));
        }

        Err(DefinitionError::InvalidExtension(format!(
            "{} declares neither commands nor a main entry",
            manifest_path.display()
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The commands this extension contributes.
    pub fn commands(&self) -> &[Command] {
        &self.exports
    }

    /// Whether matching this extension ends classification, passing the
    /// remaining tokens to the spawned executable verbatim.
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }

    pub(crate) fn deep_clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            path: self.path.clone(),
            exports: self.exports.iter().map(Command::deep_clone).collect(),
            passthrough: self.passthrough,
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_path_becomes_stub() {
        let ext = Extension::new(Some("ghost"), "/no/such/extension").unwrap();
        assert_eq!(ext.name(), "ghost");
        assert_eq!(ext.commands().len(), 1);
        assert!(matches!(
            ext.commands()[0].action(),
            Some(Action::Stub { .. })
        ));
    }

    #[test]
    fn test_missing_path_fails_in_strict_mode() {
        let err = Extension::strict(Some("ghost"), "/no/such/extension").unwrap_err();
        assert!(matches!(err, DefinitionError::FileNotFound(_)));
    }

    #[test]
    fn test_manifest_directory_exports_lazy_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cmdtree.json"),
            r#"{
                "name": "tools",
                "commands": {
                    "fmt": "fmt.json",
                    "lint": { "desc": "inline lint" }
                }
            }"#,
        )
        .unwrap();

        let ext = Extension::strict(None, dir.path()).unwrap();
        assert_eq!(ext.commands().len(), 2);
        assert!(!ext.passthrough());

        let fmt = ext
            .commands()
            .iter()
            .find(|cmd| cmd.name() == "fmt")
            .unwrap();
        // File exports stay unloaded until the parser descends into them.
        assert!(!fmt.is_loaded());

        let lint = ext
            .commands()
            .iter()
            .find(|cmd| cmd.name() == "lint")
            .unwrap();
        assert!(lint.is_loaded());
    }

    #[test]
    fn test_manifest_main_wraps_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cmdtree.yaml"),
            "name: deploy\nmain: bin/run.sh\n",
        )
        .unwrap();

        let ext = Extension::strict(Some("deploy"), dir.path()).unwrap();
        assert!(ext.passthrough());
        assert!(matches!(
            ext.commands()[0].action(),
            Some(Action::Spawn { executable }) if executable.ends_with("bin/run.sh")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_file_exports_spawn_command() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("greet");
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let ext = Extension::strict(None, &script).unwrap();
        assert_eq!(ext.name(), "greet");
        assert!(ext.passthrough());
        assert!(matches!(
            ext.commands()[0].action(),
            Some(Action::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_plain_file_is_not_an_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();

        let err = Extension::strict(None, &file).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidExtension(_)));

        let stubbed = Extension::new(None, &file).unwrap();
        assert!(matches!(
            stubbed.commands()[0].action(),
            Some(Action::Stub { .. })
        ));
    }
}
