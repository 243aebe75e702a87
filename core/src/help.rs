//! Serializable help model derived from a context.
//!
//! The model is plain data so embedders can render it however they like
//! (text, JSON, man pages). Hidden options, arguments, commands, and
//! aliases are filtered out here; inherited options are folded in with the
//! most specific definition winning.

use std::collections::HashSet;

use serde::Serialize;

use crate::context::Context;

/// Help for one grammar node, ready to render or serialize.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub commands: Vec<CommandHelp>,
    pub arguments: Vec<ArgumentHelp>,
    pub option_groups: Vec<OptionGroupHelp>,
}

#[derive(Debug, Serialize)]
pub struct CommandHelp {
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArgumentHelp {
    /// Rendered bracket form, e.g. `<input>` or `[files...]`.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct OptionGroupHelp {
    pub name: String,
    pub options: Vec<OptionHelp>,
}

#[derive(Debug, Serialize)]
pub struct OptionHelp {
    /// Rendered format, e.g. `-o, --output <file>`.
    pub label: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub required: bool,
}

impl HelpModel {
    /// Builds the help model for a context, folding in inherited options.
    pub fn for_context(ctx: &Context) -> Self {
        let help = ctx.help_text();

        let mut commands: Vec<CommandHelp> = Vec::new();
        for cmd in ctx.command_entries() {
            if cmd.hidden() {
                continue;
            }
            commands.push(command_help(&cmd));
        }
        for ext in ctx.extension_entries() {
            for cmd in ext.commands() {
                if cmd.hidden() {
                    continue;
                }
                commands.push(command_help(cmd));
            }
        }
        commands.sort_by(|a, b| a.name.cmp(&b.name));

        let arguments = ctx
            .arguments()
            .iter()
            .filter(|arg| !arg.hidden)
            .map(|arg| {
                let mut label = arg.name.clone();
                if arg.multiple {
                    label.push_str("...");
                }
                let label = if arg.required {
                    format!("<{label}>")
                } else {
                    format!("[{label}]")
                };
                ArgumentHelp {
                    label,
                    desc: arg.desc.clone(),
                    required: arg.required,
                }
            })
            .collect();

        // Walk self toward the root; the first definition seen for a name
        // is the most specific one, so ancestors never shadow it.
        let mut seen: HashSet<String> = HashSet::new();
        let mut option_groups: Vec<OptionGroupHelp> = Vec::new();
        let mut cursor = Some(ctx.clone());
        while let Some(scope) = cursor {
            for group in scope.options().groups() {
                for opt in &group.options {
                    if opt.hidden || !seen.insert(opt.name.clone()) {
                        continue;
                    }
                    let mut aliases: Vec<String> = opt
                        .aliases
                        .short
                        .iter()
                        .filter(|(_, visible)| **visible)
                        .map(|(name, _)| format!("-{name}"))
                        .collect();
                    aliases.extend(
                        opt.aliases
                            .long
                            .iter()
                            .filter(|(_, visible)| **visible)
                            .map(|(name, _)| format!("--{name}")),
                    );
                    aliases.sort();

                    let entry = OptionHelp {
                        label: opt.format_label(),
                        aliases,
                        desc: opt.desc.clone(),
                        required: opt.required,
                    };
                    match option_groups.iter_mut().find(|g| g.name == group.name) {
                        Some(g) => g.options.push(entry),
                        None => option_groups.push(OptionGroupHelp {
                            name: group.name.clone(),
                            options: vec![entry],
                        }),
                    }
                }
            }
            cursor = scope.parent();
        }

        Self {
            name: ctx.name(),
            title: ctx.title(),
            header: help.header,
            footer: help.footer,
            commands,
            arguments,
            option_groups,
        }
    }
}

impl Context {
    /// Builds the serializable help model for this node.
    pub fn generate_help(&self) -> HelpModel {
        HelpModel::for_context(self)
    }
}

fn command_help(cmd: &crate::command::Command) -> CommandHelp {
    let mut aliases: Vec<String> = cmd
        .aliases()
        .iter()
        .filter(|(_, visible)| **visible)
        .map(|(name, _)| name.clone())
        .collect();
    aliases.sort();
    CommandHelp {
        name: cmd.name(),
        aliases,
        desc: cmd.context().desc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentParams;
    use crate::command::CommandParams;
    use crate::option::OptionParams;

    #[test]
    fn test_hidden_entries_filtered() {
        let ctx = Context::new();
        ctx.option(
            "--internal",
            OptionParams {
                hidden: true,
                ..Default::default()
            },
        )
        .unwrap();
        ctx.option(
            "--visible",
            OptionParams {
                aliases: vec!["!--secret".into(), "--shown".into()],
                ..Default::default()
            },
        )
        .unwrap();
        ctx.command("shown, !hush", CommandParams::default()).unwrap();

        let model = HelpModel::for_context(&ctx);
        assert_eq!(model.option_groups.len(), 1);
        let options = &model.option_groups[0].options;
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].aliases, ["--shown"]);
        assert_eq!(model.commands.len(), 1);
        assert!(model.commands[0].aliases.is_empty());
    }

    #[test]
    fn test_inherited_options_deduped_by_specificity() {
        let root = Context::new();
        root.option(
            "--level <n>",
            OptionParams {
                desc: Some("root level".into()),
                ..Default::default()
            },
        )
        .unwrap();
        root.option("--global", OptionParams::default()).unwrap();

        let cmd = root.command("sub", CommandParams::default()).unwrap();
        cmd.context()
            .option(
                "--level <n>",
                OptionParams {
                    desc: Some("sub level".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let model = HelpModel::for_context(&cmd.context());
        let all: Vec<_> = model
            .option_groups
            .iter()
            .flat_map(|g| g.options.iter())
            .collect();
        assert_eq!(all.len(), 2);
        let level = all.iter().find(|o| o.label.contains("level")).unwrap();
        assert_eq!(level.desc.as_deref(), Some("sub level"));
    }

    #[test]
    fn test_argument_labels() {
        let ctx = Context::new();
        ctx.argument("<input>", ArgumentParams::default()).unwrap();
        ctx.argument("[files...]", ArgumentParams::default()).unwrap();

        let model = HelpModel::for_context(&ctx);
        let labels: Vec<_> = model.arguments.iter().map(|a| a.label.clone()).collect();
        assert_eq!(labels, ["<input>", "[files...]"]);
    }
}
