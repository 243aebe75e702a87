//! End-to-end parsing behavior against programmatically built grammars.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use cmdtree_core::{
    ArgumentParams, Callback, CallbackOutcome, CommandParams, Context, OptionParams, Value,
};
use cmdtree_parser::{ParseErrorKind, ParseOptions, parse};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn parse_ok(ctx: &Context, list: &[&str]) -> cmdtree_parser::ParseResult {
    parse(args(list), ctx, &ParseOptions::default()).expect("parse should succeed")
}

#[test]
fn test_defaults_seeded_and_idempotent() {
    let ctx = Context::new();
    ctx.option(
        "--level <n>",
        OptionParams {
            datatype: Some("int".into()),
            default: Some(Value::Int(2)),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.option("-f, --force", OptionParams::default()).unwrap();
    ctx.option(
        "-v",
        OptionParams {
            datatype: Some("count".into()),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.option(
        "--tag <t>",
        OptionParams {
            multiple: true,
            ..Default::default()
        },
    )
    .unwrap();

    for _ in 0..2 {
        let result = parse_ok(&ctx, &[]);
        assert_eq!(result.get("level"), Some(&Value::Int(2)));
        assert_eq!(result.get("force"), Some(&Value::Bool(false)));
        assert_eq!(result.get("v"), Some(&Value::Count(0)));
        assert_eq!(result.get("tag"), Some(&Value::Array(vec![])));
        assert!(result.args.is_empty());
        assert!(result.unknown.is_empty());
    }
}

#[test]
fn test_unknown_option_consumes_value() {
    let ctx = Context::new();
    let result = parse_ok(&ctx, &["--foo", "bar"]);
    assert_eq!(result.unknown.get("foo"), Some(&Value::String("bar".into())));
    assert_eq!(result.get("foo"), Some(&Value::String("bar".into())));
    assert!(result.args.is_empty());
}

#[test]
fn test_unknown_negated_option_consumes_nothing() {
    let ctx = Context::new();
    let result = parse_ok(&ctx, &["--no-cache", "word"]);
    assert_eq!(result.unknown.get("cache"), Some(&Value::Bool(false)));
    assert_eq!(result.args, vec![Value::String("word".into())]);
}

#[test]
fn test_unknown_flag_without_value() {
    let ctx = Context::new();
    let result = parse_ok(&ctx, &["--dry-run"]);
    assert_eq!(result.unknown.get("dry-run"), Some(&Value::Bool(true)));
    assert_eq!(result.get("dryRun"), Some(&Value::Bool(true)));
}

#[test]
fn test_grouped_short_flags_split() {
    let ctx = Context::new();
    ctx.option("-a", OptionParams::default()).unwrap();
    ctx.option("-b", OptionParams::default()).unwrap();
    ctx.option("-c", OptionParams::default()).unwrap();

    let result = parse_ok(&ctx, &["-abc"]);
    assert_eq!(result.get("a"), Some(&Value::Bool(true)));
    assert_eq!(result.get("b"), Some(&Value::Bool(true)));
    assert_eq!(result.get("c"), Some(&Value::Bool(true)));
}

#[test]
fn test_grouped_short_flags_last_takes_equals_value() {
    let ctx = Context::new();
    ctx.option("-a", OptionParams::default()).unwrap();
    ctx.option("-b", OptionParams::default()).unwrap();
    ctx.option(
        "-c <n>",
        OptionParams {
            datatype: Some("int".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["-abc=5"]);
    assert_eq!(result.get("a"), Some(&Value::Bool(true)));
    assert_eq!(result.get("b"), Some(&Value::Bool(true)));
    assert_eq!(result.get("c"), Some(&Value::Int(5)));
}

#[test]
fn test_short_option_inline_value() {
    let ctx = Context::new();
    ctx.option(
        "-n <num>",
        OptionParams {
            datatype: Some("int".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["-n5"]);
    assert_eq!(result.get("n"), Some(&Value::Int(5)));
    let result = parse_ok(&ctx, &["-n=7"]);
    assert_eq!(result.get("n"), Some(&Value::Int(7)));
    let result = parse_ok(&ctx, &["-n", "9"]);
    assert_eq!(result.get("n"), Some(&Value::Int(9)));
}

#[test]
fn test_negated_boolean_option() {
    let ctx = Context::new();
    ctx.option("--no-color", OptionParams::default()).unwrap();

    let result = parse_ok(&ctx, &[]);
    assert_eq!(result.get("color"), Some(&Value::Bool(true)));

    let result = parse_ok(&ctx, &["--no-color"]);
    assert_eq!(result.get("color"), Some(&Value::Bool(false)));

    let result = parse_ok(&ctx, &["--color"]);
    assert_eq!(result.get("color"), Some(&Value::Bool(true)));
}

#[test]
fn test_command_descent_binds_argument() {
    let ctx = Context::new();
    ctx.command("foo <bar>", CommandParams::default()).unwrap();

    let result = parse_ok(&ctx, &["foo", "baz"]);
    assert_eq!(result.get("bar"), Some(&Value::String("baz".into())));
    assert!(result.args.is_empty());
    assert_eq!(result.contexts[0].name().as_deref(), Some("foo"));
    assert_eq!(result.command.as_ref().map(|c| c.name()), Some("foo".into()));
}

#[test]
fn test_missing_required_argument_reports_command_context() {
    let ctx = Context::new();
    ctx.command("foo <bar>", CommandParams::default()).unwrap();

    let err = parse(args(&["foo"]), &ctx, &ParseOptions::default()).unwrap_err();
    match &err.kind {
        ParseErrorKind::MissingRequiredArgument { names } => {
            assert_eq!(names, &["bar".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.contexts[0].name().as_deref(), Some("foo"));
}

#[test]
fn test_callback_mutation_triggers_reclassification_once() {
    let ctx = Context::new();
    let fired = Rc::new(Cell::new(0u32));
    let fired_in_callback = fired.clone();

    ctx.option(
        "--type <t>",
        OptionParams {
            callback: Some(Callback::new(move |data| {
                fired_in_callback.set(fired_in_callback.get() + 1);
                data.ctx
                    .option("--platform <p>", OptionParams::default())
                    .map_err(|err| cmdtree_core::TransformError::Rejected(err.to_string()))?;
                Ok(CallbackOutcome::Keep)
            })),
            ..Default::default()
        },
    )
    .unwrap();

    // --platform appears before the option that defines it.
    let result = parse_ok(&ctx, &["--platform", "linux", "--type", "os"]);
    assert_eq!(result.get("platform"), Some(&Value::String("linux".into())));
    assert_eq!(result.get("type"), Some(&Value::String("os".into())));
    assert!(result.unknown.is_empty());
    assert_eq!(fired.get(), 1);
}

#[test]
fn test_callback_replace_swaps_value() {
    let ctx = Context::new();
    ctx.option(
        "--name <n>",
        OptionParams {
            callback: Some(Callback::new(|data| {
                let upper = data.value.as_str().unwrap_or_default().to_uppercase();
                Ok(CallbackOutcome::Replace(Value::String(upper)))
            })),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["--name", "ada"]);
    assert_eq!(result.get("name"), Some(&Value::String("ADA".into())));
}

#[test]
fn test_callback_defer_runs_after_classification() {
    let ctx = Context::new();
    let calls = Rc::new(Cell::new(0u32));
    let calls_in_callback = calls.clone();

    ctx.option(
        "--first",
        OptionParams {
            callback: Some(Callback::new(move |data| {
                calls_in_callback.set(calls_in_callback.get() + 1);
                if data.deferred {
                    Ok(CallbackOutcome::Replace(Value::String("late".into())))
                } else {
                    Ok(CallbackOutcome::Defer)
                }
            })),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["--first"]);
    assert_eq!(result.get("first"), Some(&Value::String("late".into())));
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_callback_rejection_fails_parse() {
    let ctx = Context::new();
    ctx.option(
        "--guard <v>",
        OptionParams {
            callback: Some(Callback::new(|_| {
                Err(cmdtree_core::TransformError::Rejected("not today".into()))
            })),
            ..Default::default()
        },
    )
    .unwrap();

    let err = parse(args(&["--guard", "x"]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::Callback { .. }));
}

#[test]
fn test_double_dash_stops_classification() {
    let ctx = Context::new();
    ctx.option("-b", OptionParams::default()).unwrap();

    let result = parse_ok(&ctx, &["a", "--", "--b", "c"]);
    assert_eq!(
        result.args,
        vec![
            Value::String("a".into()),
            Value::String("--b".into()),
            Value::String("c".into()),
        ]
    );
    assert_eq!(result.get("b"), Some(&Value::Bool(false)));
}

#[test]
fn test_multiple_option_accumulates_in_order() {
    let ctx = Context::new();
    ctx.option(
        "--tag <t>",
        OptionParams {
            multiple: true,
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["--tag", "a", "--tag=b"]);
    assert_eq!(
        result.get("tag"),
        Some(&Value::Array(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ]))
    );
}

#[test]
fn test_count_flag_accumulates() {
    let ctx = Context::new();
    ctx.option(
        "-v",
        OptionParams {
            datatype: Some("count".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["-vvv"]);
    assert_eq!(result.get("v"), Some(&Value::Count(3)));
}

#[test]
fn test_env_overrides_parsed_value() {
    let ctx = Context::new();
    ctx.option(
        "--port <n>",
        OptionParams {
            datatype: Some("int".into()),
            default: Some(Value::Int(80)),
            env: Some("APP_PORT".into()),
            ..Default::default()
        },
    )
    .unwrap();

    // Default applies with no input and no env.
    let result = parse_ok(&ctx, &[]);
    assert_eq!(result.get("port"), Some(&Value::Int(80)));

    let mut env = HashMap::new();
    env.insert("APP_PORT".to_string(), "8443".to_string());
    let options = ParseOptions::with_env(env);

    // Env beats both the default and the parsed value.
    let result = parse(args(&[]), &ctx, &options).unwrap();
    assert_eq!(result.get("port"), Some(&Value::Int(8443)));
    let result = parse(args(&["--port", "3000"]), &ctx, &options).unwrap();
    assert_eq!(result.get("port"), Some(&Value::Int(8443)));
}

#[test]
fn test_env_satisfies_required_option() {
    let ctx = Context::new();
    ctx.option(
        "--token <t>",
        OptionParams {
            required: true,
            env: Some("APP_TOKEN".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let err = parse(args(&[]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::MissingRequiredOption { .. }
    ));

    let mut env = HashMap::new();
    env.insert("APP_TOKEN".to_string(), "sekrit".to_string());
    let result = parse(args(&[]), &ctx, &ParseOptions::with_env(env)).unwrap();
    assert_eq!(result.get("token"), Some(&Value::String("sekrit".into())));
}

#[test]
fn test_argument_env_overrides_parsed_positional() {
    let ctx = Context::new();
    ctx.argument(
        "<target>",
        ArgumentParams {
            env: Some("APP_TARGET".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let mut env = HashMap::new();
    env.insert("APP_TARGET".to_string(), "from-env".to_string());
    let options = ParseOptions::with_env(env);

    // Env beats a bound positional, same as it beats a parsed option.
    let result = parse(args(&["from-cli"]), &ctx, &options).unwrap();
    assert_eq!(result.get("target"), Some(&Value::String("from-env".into())));

    // And still satisfies the requirement with no positional at all.
    let mut env = HashMap::new();
    env.insert("APP_TARGET".to_string(), "from-env".to_string());
    let result = parse(args(&[]), &ctx, &ParseOptions::with_env(env)).unwrap();
    assert_eq!(result.get("target"), Some(&Value::String("from-env".into())));
}

#[test]
fn test_missing_required_options_reported_together() {
    let ctx = Context::new();
    ctx.option(
        "--alpha <a>",
        OptionParams {
            required: true,
            ..Default::default()
        },
    )
    .unwrap();
    ctx.option(
        "--beta <b>",
        OptionParams {
            required: true,
            ..Default::default()
        },
    )
    .unwrap();

    let err = parse(args(&[]), &ctx, &ParseOptions::default()).unwrap_err();
    match &err.kind {
        ParseErrorKind::MissingRequiredOption { names } => {
            assert_eq!(names, &["alpha".to_string(), "beta".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_option_value_at_end_of_line() {
    let ctx = Context::new();
    ctx.option("--type <t>", OptionParams::default()).unwrap();

    let err = parse(args(&["--type"]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::MissingOptionValue { ref name } if name == "type"
    ));
}

#[test]
fn test_invalid_value_carries_transform_error() {
    let ctx = Context::new();
    ctx.option(
        "--jobs <n>",
        OptionParams {
            datatype: Some("int".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let err = parse(args(&["--jobs", "lots"]), &ctx, &ParseOptions::default()).unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::InvalidValue { ref name, .. } if name == "jobs"
    ));
}

#[test]
fn test_parent_options_visible_after_descent() {
    let root = Context::new();
    root.option("-v, --verbose", OptionParams::default()).unwrap();
    root.command("sub", CommandParams::default()).unwrap();

    let result = parse_ok(&root, &["sub", "-v"]);
    assert_eq!(result.get("verbose"), Some(&Value::Bool(true)));
    assert_eq!(result.contexts[0].name().as_deref(), Some("sub"));
}

#[test]
fn test_optional_value_not_consumed_when_next_is_command() {
    let ctx = Context::new();
    ctx.option("--detail [level]", OptionParams::default()).unwrap();
    ctx.command("status", CommandParams::default()).unwrap();

    let result = parse_ok(&ctx, &["--detail", "status"]);
    assert_eq!(result.get("detail"), Some(&Value::Bool(true)));
    assert_eq!(result.contexts[0].name().as_deref(), Some("status"));
}

#[test]
fn test_treat_unknown_options_as_arguments() {
    let ctx = Context::new();
    ctx.set_treat_unknown_options_as_arguments(true);

    let result = parse_ok(&ctx, &["-x", "foo"]);
    assert_eq!(
        result.args,
        vec![Value::String("-x".into()), Value::String("foo".into())]
    );
    assert_eq!(result.unknown.get("x"), Some(&Value::String("foo".into())));
}

#[test]
fn test_leftovers_keep_token_order() {
    let ctx = Context::new();
    ctx.set_treat_unknown_options_as_arguments(true);

    // Unknowns, positionals, and `--` extras come back in the order the
    // tokens appeared, ready to forward verbatim.
    let result = parse_ok(&ctx, &["-x", "foo", "bar", "--", "z"]);
    assert_eq!(
        result.args,
        vec![
            Value::String("-x".into()),
            Value::String("foo".into()),
            Value::String("bar".into()),
            Value::String("z".into()),
        ]
    );
}

#[test]
fn test_negative_number_is_an_argument() {
    let ctx = Context::new();
    ctx.argument(
        "<delta>",
        ArgumentParams {
            datatype: Some("int".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let result = parse_ok(&ctx, &["-12"]);
    assert_eq!(result.get("delta"), Some(&Value::Int(-12)));
}

#[test]
fn test_multiple_argument_consumes_rest() {
    let ctx = Context::new();
    ctx.argument("<first>", ArgumentParams::default()).unwrap();
    ctx.argument("[rest...]", ArgumentParams::default()).unwrap();

    let result = parse_ok(&ctx, &["a", "b", "c"]);
    assert_eq!(result.get("first"), Some(&Value::String("a".into())));
    assert_eq!(
        result.get("rest"),
        Some(&Value::Array(vec![
            Value::String("b".into()),
            Value::String("c".into()),
        ]))
    );
    assert!(result.args.is_empty());
}

#[test]
fn test_leftover_positionals_land_in_args() {
    let ctx = Context::new();
    ctx.argument("[only]", ArgumentParams::default()).unwrap();

    let result = parse_ok(&ctx, &["bound", "spare"]);
    assert_eq!(result.get("only"), Some(&Value::String("bound".into())));
    assert_eq!(result.args, vec![Value::String("spare".into())]);
}

#[test]
fn test_default_command_descends_on_bare_line() {
    let ctx = Context::new();
    let serve = ctx.command("serve", CommandParams::default()).unwrap();
    serve
        .context()
        .option(
            "--port <n>",
            OptionParams {
                datatype: Some("int".into()),
                default: Some(Value::Int(8080)),
                ..Default::default()
            },
        )
        .unwrap();
    ctx.set_default_command("serve");

    let result = parse_ok(&ctx, &[]);
    assert_eq!(result.contexts[0].name().as_deref(), Some("serve"));
    assert_eq!(result.get("port"), Some(&Value::Int(8080)));

    // Options of the default command resolve even though it was never named.
    let result = parse_ok(&ctx, &["--port", "9000"]);
    assert_eq!(result.get("port"), Some(&Value::Int(9000)));
}

#[test]
fn test_camel_case_disabled_keeps_raw_keys() {
    let ctx = Context::new();
    ctx.set_camel_case(false);
    ctx.option("--dry-run", OptionParams::default()).unwrap();

    let result = parse_ok(&ctx, &["--dry-run"]);
    assert_eq!(result.get("dry-run"), Some(&Value::Bool(true)));
    assert!(result.get("dryRun").is_none());
}
