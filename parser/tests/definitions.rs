//! Parsing against grammars loaded lazily from descriptor files and
//! extension directories.

use std::fs;

use cmdtree_core::{Action, Context, Extension, Value};
use cmdtree_parser::{ParseErrorKind, ParseOptions, parse};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_lazy_command_loads_on_first_descent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ls.json");
    fs::write(
        &path,
        r#"{
            "desc": "list entries",
            "options": [{"format": "-l, --long"}],
            "args": ["[path]"]
        }"#,
    )
    .unwrap();

    let ctx = Context::new();
    let cmd = ctx.command_from_file("ls, list", &path).unwrap();
    assert!(!cmd.is_loaded());

    let result = parse(args(&["list", "-l", "/tmp"]), &ctx, &ParseOptions::default()).unwrap();
    assert!(cmd.is_loaded());
    assert_eq!(result.get("long"), Some(&Value::Bool(true)));
    assert_eq!(result.get("path"), Some(&Value::String("/tmp".into())));
    assert_eq!(cmd.context().options().len(), 1);

    // Reaching the command through another alias must not re-apply the
    // definition.
    parse(args(&["ls", "-l"]), &ctx, &ParseOptions::default()).unwrap();
    assert_eq!(cmd.context().options().len(), 1);
    assert_eq!(cmd.context().arguments().len(), 1);
}

#[test]
fn test_lazy_command_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy.yaml");
    fs::write(
        &path,
        "options:\n  - format: \"--env <name>\"\n    required: true\n",
    )
    .unwrap();

    let ctx = Context::new();
    ctx.command_from_file("deploy", &path).unwrap();

    let result = parse(
        args(&["deploy", "--env", "prod"]),
        &ctx,
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(result.get("env"), Some(&Value::String("prod".into())));

    let err = parse(args(&["deploy"]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::MissingRequiredOption { .. }
    ));
}

#[test]
fn test_commands_registered_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("build.json"),
        r#"{"options": [{"format": "--release"}]}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("deploy.yaml"),
        "options:\n  - format: \"--env <name>\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let ctx = Context::new();
    ctx.commands(dir.path()).unwrap();

    let result = parse(
        args(&["build", "--release"]),
        &ctx,
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(result.get("release"), Some(&Value::Bool(true)));
    assert_eq!(result.contexts[0].name().as_deref(), Some("build"));

    // Only the descended command gets loaded; its sibling stays lazy.
    let deploy = ctx.find_command("deploy").unwrap();
    assert!(!deploy.is_loaded());
}

#[test]
fn test_broken_definition_surfaces_at_descent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{not json").unwrap();

    let ctx = Context::new();
    ctx.command_from_file("bad", &path).unwrap();

    let err = parse(args(&["bad"]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::Definition(_)));
}

#[test]
fn test_nested_lazy_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("outer.json"),
        r#"{"commands": [{"name": "inner", "file": "inner.json"}]}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("inner.json"),
        r#"{"options": [{"format": "--deep"}]}"#,
    )
    .unwrap();

    let ctx = Context::new();
    ctx.command_from_file("outer", dir.path().join("outer.json"))
        .unwrap();

    let result = parse(
        args(&["outer", "inner", "--deep"]),
        &ctx,
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(result.get("deep"), Some(&Value::Bool(true)));
    assert_eq!(result.contexts[0].name().as_deref(), Some("inner"));
    assert_eq!(result.contexts[1].name().as_deref(), Some("outer"));
}

#[test]
fn test_extension_manifest_commands_parse() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("cmdtree.json"),
        r#"{
            "name": "tools",
            "commands": {
                "fmt": {"options": [{"format": "--check"}]}
            }
        }"#,
    )
    .unwrap();

    let ctx = Context::new();
    ctx.extensions(dir.path()).unwrap();

    let result = parse(args(&["fmt", "--check"]), &ctx, &ParseOptions::default()).unwrap();
    assert_eq!(result.get("check"), Some(&Value::Bool(true)));
    assert_eq!(result.contexts[0].name().as_deref(), Some("fmt"));
}

#[cfg(unix)]
#[test]
fn test_executable_extension_passes_tokens_through() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("greet");
    fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let ctx = Context::new();
    ctx.extensions(script.as_path()).unwrap();

    // Everything after the extension name goes to the executable verbatim,
    // including option-shaped tokens.
    let result = parse(
        args(&["greet", "hello", "--weird"]),
        &ctx,
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(
        result.args,
        vec![Value::String("hello".into()), Value::String("--weird".into())]
    );
    assert!(result.unknown.is_empty());
    assert!(matches!(
        result.command.as_ref().and_then(|c| c.action()),
        Some(Action::Spawn { .. })
    ));
}

#[test]
fn test_broken_extension_resolves_to_stub() {
    let ctx = Context::new();
    let ext = Extension::new(Some("ghost"), "/no/such/path").unwrap();
    ctx.extensions(ext).unwrap();

    let result = parse(args(&["ghost"]), &ctx, &ParseOptions::default()).unwrap();
    assert!(matches!(
        result.command.as_ref().and_then(|c| c.action()),
        Some(Action::Stub { .. })
    ));
}
