//! Declarative grammar descriptors.
//!
//! A context tree can be defined declaratively in JSON or YAML and applied
//! to a [`Context`](crate::Context). Descriptors are also the backing store
//! for lazily loaded commands: a command registered with a `file` reference
//! keeps its definition on disk until the parser first descends into it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// Help screen framing text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpText {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// Declarative definition of a command (or a whole root context).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandDescriptor {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub hidden: bool,
    /// Extra aliases beyond those in the name string (`!` prefix hides).
    pub aliases: Vec<String>,
    /// Named action dispatched by the embedding application.
    pub action: Option<String>,
    pub default_command: Option<String>,
    pub camel_case: Option<bool>,
    pub treat_unknown_options_as_arguments: Option<bool>,
    pub help: Option<HelpText>,
    pub options: Vec<OptionDescriptor>,
    pub args: Vec<ArgumentDescriptor>,
    pub commands: Vec<SubcommandDescriptor>,
    pub extensions: Vec<ExtensionDescriptor>,
}

impl CommandDescriptor {
    /// Loads a descriptor from a JSON or YAML file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, DefinitionError> {
        load_descriptor(path)
    }
}

/// Declarative option definition: a format string plus parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionDescriptor {
    pub format: String,
    pub desc: Option<String>,
    #[serde(rename = "type")]
    pub datatype: Option<String>,
    pub default: Option<serde_json::Value>,
    pub env: Option<String>,
    pub hidden: bool,
    pub multiple: bool,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub aliases: Vec<String>,
    /// Help group the option is listed under.
    pub group: Option<String>,
}

/// Declarative argument definition: a bare bracketed name or a full object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentDescriptor {
    Name(String),
    Spec(ArgumentObjectDescriptor),
}

/// Object form of an argument descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArgumentObjectDescriptor {
    pub name: String,
    pub desc: Option<String>,
    #[serde(rename = "type")]
    pub datatype: Option<String>,
    pub env: Option<String>,
    pub hidden: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub multiple: Option<bool>,
    pub required: Option<bool>,
}

/// A subcommand entry: inline definition, or a `file` reference for lazy
/// loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubcommandDescriptor {
    /// Command name string (may carry aliases and inline arguments).
    pub name: String,
    /// Definition file resolved relative to the declaring descriptor.
    pub file: Option<PathBuf>,
    #[serde(flatten)]
    pub spec: CommandDescriptor,
}

/// An extension entry inside a command descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    pub name: Option<String>,
    pub path: PathBuf,
}

/// Manifest describing an extension package directory.
///
/// A directory becomes a multi-command extension by carrying a
/// `cmdtree.json` / `cmdtree.yaml` manifest whose `commands` map declares
/// one export per entry. A manifest with only a `main` entry wraps a plain
/// script instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtensionManifest {
    pub name: Option<String>,
    pub main: Option<PathBuf>,
    pub commands: BTreeMap<String, ExtensionExport>,
}

/// One export declared by an extension manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionExport {
    /// Path to a descriptor file, relative to the manifest.
    File(PathBuf),
    /// Inline command tree.
    Inline(CommandDescriptor),
}

/// Manifest file names probed inside an extension directory, in order.
pub const MANIFEST_NAMES: [&str; 3] = ["cmdtree.json", "cmdtree.yaml", "cmdtree.yml"];

pub(crate) fn load_descriptor<T: DeserializeOwned>(path: &Path) -> Result<T, DefinitionError> {
    if !path.exists() {
        return Err(DefinitionError::FileNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|err| DefinitionError::BadDescriptor {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    } else {
        serde_json::from_str(&text).map_err(|err| DefinitionError::BadDescriptor {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserializes_from_yaml() {
        let text = "\
title: demo tool
options:
  - format: \"-v, --verbose\"
    desc: chatty output
  - format: \"--level <n>\"
    type: int
    default: 2
args:
  - \"<input>\"
  - name: output
    required: false
commands:
  - name: \"ls, list\"
    desc: list things
";
        let desc: CommandDescriptor = serde_yaml::from_str(text).unwrap();
        assert_eq!(desc.title.as_deref(), Some("demo tool"));
        assert_eq!(desc.options.len(), 2);
        assert_eq!(desc.options[1].datatype.as_deref(), Some("int"));
        assert_eq!(desc.options[1].default, Some(serde_json::json!(2)));
        assert!(matches!(&desc.args[0], ArgumentDescriptor::Name(n) if n == "<input>"));
        assert!(matches!(&desc.args[1], ArgumentDescriptor::Spec(s) if s.name == "output"));
        assert_eq!(desc.commands[0].name, "ls, list");
    }

    #[test]
    fn test_manifest_export_forms() {
        let text = r#"{
            "name": "tools",
            "commands": {
                "fmt": "fmt.json",
                "lint": { "desc": "inline lint command" }
            }
        }"#;
        let manifest: ExtensionManifest = serde_json::from_str(text).unwrap();
        assert!(matches!(
            manifest.commands.get("fmt"),
            Some(ExtensionExport::File(_))
        ));
        assert!(matches!(
            manifest.commands.get("lint"),
            Some(ExtensionExport::Inline(_))
        ));
    }

    #[test]
    fn test_missing_descriptor_file() {
        let err = CommandDescriptor::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, DefinitionError::FileNotFound(_)));
    }
}
