//! Driver binary for descriptor-defined grammars.
//!
//! Loads a JSON or YAML grammar descriptor, parses a target command line
//! against it, and prints the result as JSON. The driver's own command
//! line is parsed with the same library:
//!
//! ```text
//! cmdtree --grammar app.json [--env KEY=VALUE]... -- <target tokens>...
//! cmdtree --grammar app.json --help-model
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;

use cmdtree_core::{CommandDescriptor, Context, DefinitionError, OptionParams, Value};
use cmdtree_parser::{ParseOptions, parse};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let driver = driver_grammar().map_err(|err| err.to_string())?;
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let driver_result =
        parse(argv, &driver, &ParseOptions::default()).map_err(|err| err.to_string())?;

    let grammar_path = driver_result
        .get("grammar")
        .and_then(Value::as_str)
        .ok_or("missing --grammar <file>")?
        .to_string();
    let grammar_path = Path::new(&grammar_path);

    let descriptor =
        CommandDescriptor::from_file(grammar_path).map_err(|err| err.to_string())?;
    let target = Context::new();
    target
        .apply_descriptor(&descriptor, grammar_path.parent())
        .map_err(|err| err.to_string())?;

    if driver_result
        .get("helpModel")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        let model = target.generate_help();
        let rendered = serde_json::to_string_pretty(&model).map_err(|err| err.to_string())?;
        println!("{rendered}");
        return Ok(());
    }

    let mut env: HashMap<String, String> = std::env::vars().collect();
    if let Some(Value::Array(pairs)) = driver_result.get("env") {
        for pair in pairs {
            let Some(text) = pair.as_str() else { continue };
            match text.split_once('=') {
                Some((key, value)) => {
                    env.insert(key.to_string(), value.to_string());
                }
                None => return Err(format!("--env expects KEY=VALUE, got {text:?}")),
            }
        }
    }

    // Target tokens come after `--` on the driver's own line.
    let tokens: Vec<String> = driver_result
        .args
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    match parse(tokens, &target, &ParseOptions::with_env(env)) {
        Ok(outcome) => {
            let rendered =
                serde_json::to_string_pretty(&outcome).map_err(|err| err.to_string())?;
            println!("{rendered}");
            Ok(())
        }
        Err(err) => {
            let scope = err
                .contexts
                .first()
                .and_then(|ctx| ctx.name())
                .map(|name| format!(" (in {name})"))
                .unwrap_or_default();
            Err(format!("{err}{scope}"))
        }
    }
}

fn driver_grammar() -> Result<Context, DefinitionError> {
    let ctx = Context::new();
    ctx.set_title("cmdtree");
    ctx.option(
        "-g, --grammar <file>",
        OptionParams {
            required: true,
            desc: Some("grammar descriptor file (JSON or YAML)".into()),
            ..Default::default()
        },
    )?;
    ctx.option(
        "-e, --env <pair>",
        OptionParams {
            multiple: true,
            desc: Some("extra KEY=VALUE consulted by env-backed definitions".into()),
            ..Default::default()
        },
    )?;
    ctx.option(
        "--help-model",
        OptionParams {
            desc: Some("print the grammar's help model instead of parsing".into()),
            ..Default::default()
        },
    )?;
    Ok(ctx)
}
