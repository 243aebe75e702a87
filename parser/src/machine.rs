//! Token classification and result assembly.
//!
//! Classification runs left to right over the token stream, resolving each
//! raw token against the context stack. Because callbacks may mutate the
//! grammar mid-parse, the whole pass restarts from the first token whenever
//! the stack depth or any context revision changes; already-final tokens
//! (`Option`, `Command`, `Extension`, `Extra`) are skipped in O(1), while
//! `Unknown` and `Argument` tokens are re-examined against the new grammar.
//! The restart loop terminates: callbacks fire at most once per token and
//! every other transition strictly reduces the unclassified remainder.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;

use cmdtree_core::{
    ArgumentSpec, CallbackData, CallbackOutcome, Command, Context, OptionSpec, Value, camel_case,
};
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind};
use crate::token::Token;
use crate::{ParseOptions, ParseResult};

pub(crate) struct Machine<'a> {
    tokens: Vec<Token>,
    /// Root first, most specific last. Never empty.
    stack: Vec<Context>,
    options: &'a ParseOptions,
}

impl<'a> Machine<'a> {
    pub(crate) fn run(
        args: Vec<String>,
        ctx: &Context,
        options: &'a ParseOptions,
    ) -> Result<ParseResult, ParseError> {
        let mut machine = Machine {
            tokens: args.into_iter().map(Token::Raw).collect(),
            stack: vec![ctx.clone()],
            options,
        };
        machine.classify()?;
        machine.finish()
    }

    fn head(&self) -> Context {
        self.stack[self.stack.len() - 1].clone()
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, &self.stack)
    }

    /// Stack depth plus the summed revisions of the head's parent chain.
    /// Any grammar mutation visible to lookup changes this.
    fn signature(&self) -> (usize, u64) {
        let mut revs = 0u64;
        let mut cursor = Some(self.head());
        while let Some(ctx) = cursor {
            revs = revs.wrapping_add(ctx.rev());
            cursor = ctx.parent();
        }
        (self.stack.len(), revs)
    }

    fn classify(&mut self) -> Result<(), ParseError> {
        'outer: loop {
            let sig = self.signature();
            let mut i = 0;
            while i < self.tokens.len() {
                i = self.classify_at(i)?;
                if self.signature() != sig {
                    debug!(token = i, "grammar changed, restarting classification");
                    continue 'outer;
                }
            }
            self.run_deferred()?;
            if self.signature() != sig {
                continue 'outer;
            }
            if self.apply_default_command()? {
                continue 'outer;
            }
            return Ok(());
        }
    }

    fn classify_at(&mut self, i: usize) -> Result<usize, ParseError> {
        // Un-consume before re-classifying: an unknown that swallowed a
        // value token gives it back, in case it now resolves as a flag.
        if matches!(self.tokens[i], Token::Unknown { .. })
            && let Token::Unknown { raw, value_raw, .. } =
                std::mem::replace(&mut self.tokens[i], Token::Raw(String::new()))
        {
            self.tokens[i] = Token::Raw(raw);
            if let Some(v) = value_raw {
                self.tokens.insert(i + 1, Token::Raw(v));
            }
        }

        let raw = match &self.tokens[i] {
            Token::Raw(s) => s.clone(),
            Token::Argument { raw } => raw.clone(),
            _ => return Ok(i + 1),
        };

        if raw == "--" {
            let rest: Vec<String> = self
                .tokens
                .split_off(i + 1)
                .into_iter()
                .filter_map(raw_text)
                .collect();
            self.tokens[i] = Token::Extra { tokens: rest };
            return Ok(i + 1);
        }

        if let Some(body) = raw.strip_prefix("--") {
            let body = body.to_string();
            return self.classify_long(i, &raw, &body);
        }
        if raw.len() > 1 && raw.starts_with('-') {
            let body = raw[1..].to_string();
            return self.classify_short(i, &raw, &body);
        }

        self.classify_bare(i, raw)
    }

    fn classify_long(&mut self, i: usize, raw: &str, body: &str) -> Result<usize, ParseError> {
        let (name_part, inline) = match body.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (body.to_string(), None),
        };

        let head = self.head();
        if let Some(spec) = head.find_long(&name_part) {
            return self.resolve_option(i, spec, false, inline, raw);
        }
        if let Some(stripped) = name_part.strip_prefix("no-")
            && let Some(spec) = head.find_long(stripped)
            && spec.datatype == "bool"
        {
            return self.resolve_option(i, spec, true, inline, raw);
        }

        self.resolve_unknown(i, name_part, inline, raw, true)
    }

    fn classify_short(&mut self, i: usize, raw: &str, body: &str) -> Result<usize, ParseError> {
        let (letters, eq_value) = match body.split_once('=') {
            Some((letters, value)) => (letters.to_string(), Some(value.to_string())),
            None => (body.to_string(), None),
        };
        let Some(first) = letters.chars().next() else {
            self.tokens[i] = Token::Argument {
                raw: raw.to_string(),
            };
            return Ok(i + 1);
        };

        let head = self.head();
        let first_spec = head.find_short(&first.to_string());

        if letters.chars().count() == 1 {
            return match first_spec {
                Some(spec) => self.resolve_option(i, spec, false, eq_value, raw),
                None if looks_numeric(body) => {
                    self.tokens[i] = Token::Argument {
                        raw: raw.to_string(),
                    };
                    Ok(i + 1)
                }
                None => self.resolve_unknown(i, letters, eq_value, raw, false),
            };
        }

        match first_spec {
            // `-ofile` is `-o file` when -o takes a value.
            Some(spec) if !spec.is_flag => {
                let rest: String = letters.chars().skip(1).collect();
                let inline = match eq_value {
                    Some(value) => format!("{rest}={value}"),
                    None => rest,
                };
                self.resolve_option(i, spec, false, Some(inline), raw)
            }
            // `-abc` is `-a -b -c` when -a is a flag; split in place and
            // classify each piece on its own.
            Some(_) => {
                let count = letters.chars().count();
                let mut replacement = Vec::with_capacity(count);
                for (idx, ch) in letters.chars().enumerate() {
                    let mut piece = format!("-{ch}");
                    if idx == count - 1
                        && let Some(value) = &eq_value
                    {
                        piece.push('=');
                        piece.push_str(value);
                    }
                    replacement.push(Token::Raw(piece));
                }
                self.tokens.splice(i..=i, replacement);
                Ok(i)
            }
            None if looks_numeric(body) => {
                self.tokens[i] = Token::Argument {
                    raw: raw.to_string(),
                };
                Ok(i + 1)
            }
            None => self.resolve_unknown(i, letters, eq_value, raw, false),
        }
    }

    fn classify_bare(&mut self, i: usize, raw: String) -> Result<usize, ParseError> {
        let head = self.head();

        if let Some(cmd) = head.find_command(&raw) {
            self.descend(&cmd)?;
            self.tokens[i] = Token::Command { command: cmd, raw };
            return Ok(i + 1);
        }

        if let Some(hit) = head.find_extension_command(&raw) {
            self.descend(&hit.command)?;
            self.tokens[i] = Token::Extension {
                command: hit.command,
                raw,
            };
            if hit.passthrough {
                // The spawned executable gets the remaining tokens verbatim.
                let rest: Vec<String> = self
                    .tokens
                    .split_off(i + 1)
                    .into_iter()
                    .filter_map(raw_text)
                    .collect();
                if !rest.is_empty() {
                    self.tokens.push(Token::Extra { tokens: rest });
                }
            }
            return Ok(i + 1);
        }

        self.tokens[i] = Token::Argument { raw };
        Ok(i + 1)
    }

    fn descend(&mut self, cmd: &Command) -> Result<(), ParseError> {
        self.stack.push(cmd.context());
        cmd.load()
            .map_err(|err| self.err(ParseErrorKind::Definition(err)))?;
        debug!(command = %cmd.name(), depth = self.stack.len(), "descended into command");
        Ok(())
    }

    fn resolve_option(
        &mut self,
        i: usize,
        spec: Rc<OptionSpec>,
        negated: bool,
        inline: Option<String>,
        raw: &str,
    ) -> Result<usize, ParseError> {
        let mut value_raw = None;
        let value = if let Some(inline) = &inline {
            spec.transform(inline, negated).map_err(|source| {
                self.err(ParseErrorKind::InvalidValue {
                    name: spec.name.clone(),
                    source,
                })
            })?
        } else if spec.is_flag {
            if spec.datatype == "count" {
                Value::Count(1)
            } else {
                Value::Bool(!negated)
            }
        } else if let Some(consumed) = self.consumable_at(i + 1) {
            self.tokens.remove(i + 1);
            let value = spec.transform(&consumed, negated).map_err(|source| {
                self.err(ParseErrorKind::InvalidValue {
                    name: spec.name.clone(),
                    source,
                })
            })?;
            value_raw = Some(consumed);
            value
        } else if spec.value_required {
            return Err(self.err(ParseErrorKind::MissingOptionValue {
                name: spec.name.clone(),
            }));
        } else {
            Value::Bool(true)
        };

        self.tokens[i] = Token::Option {
            spec,
            value,
            negated,
            callback_fired: false,
            deferred: false,
            raw: raw.to_string(),
            value_raw,
        };
        self.fire_callback(i, false)?;
        Ok(i + 1)
    }

    fn resolve_unknown(
        &mut self,
        i: usize,
        name_part: String,
        inline: Option<String>,
        raw: &str,
        allow_negation: bool,
    ) -> Result<usize, ParseError> {
        let (name, negated) = match name_part.strip_prefix("no-") {
            Some(stripped) if allow_negation => (stripped.to_string(), true),
            _ => (name_part, false),
        };

        let mut value_raw = None;
        if !negated
            && inline.is_none()
            && let Some(consumed) = self.consumable_at(i + 1)
        {
            self.tokens.remove(i + 1);
            value_raw = Some(consumed);
        }

        self.tokens[i] = Token::Unknown {
            name,
            negated,
            inline,
            value_raw,
            raw: raw.to_string(),
        };
        Ok(i + 1)
    }

    /// The token at `j`, when it is an unclassified value candidate: not a
    /// known option, command, or the `--` sentinel.
    fn consumable_at(&self, j: usize) -> Option<String> {
        let raw = match self.tokens.get(j)? {
            Token::Raw(s) => s.clone(),
            Token::Argument { raw } => raw.clone(),
            _ => return None,
        };
        if self.resolves(&raw) {
            return None;
        }
        Some(raw)
    }

    /// Whether a raw token resolves against the current grammar.
    fn resolves(&self, raw: &str) -> bool {
        if raw == "--" {
            return true;
        }
        let head = self.head();
        if let Some(body) = raw.strip_prefix("--") {
            let name = match body.split_once('=') {
                Some((name, _)) => name,
                None => body,
            };
            if head.find_long(name).is_some() {
                return true;
            }
            return name
                .strip_prefix("no-")
                .is_some_and(|stripped| head.find_long(stripped).is_some());
        }
        if let Some(body) = raw.strip_prefix('-') {
            return body
                .chars()
                .next()
                .is_some_and(|first| head.find_short(&first.to_string()).is_some());
        }
        head.find_command(raw).is_some() || head.find_extension_command(raw).is_some()
    }

    fn fire_callback(&mut self, i: usize, deferred: bool) -> Result<(), ParseError> {
        let (callback, name, value, negated) = match &self.tokens[i] {
            Token::Option {
                spec,
                value,
                negated,
                callback_fired,
                ..
            } => {
                if !deferred && *callback_fired {
                    return Ok(());
                }
                (
                    spec.callback.clone(),
                    spec.name.clone(),
                    value.clone(),
                    *negated,
                )
            }
            _ => return Ok(()),
        };

        let outcome = match callback {
            Some(callback) => {
                let mut data = CallbackData {
                    ctx: self.head(),
                    name: name.clone(),
                    value,
                    negated,
                    deferred,
                };
                callback.invoke(&mut data).map_err(|err| {
                    self.err(ParseErrorKind::Callback {
                        name: name.clone(),
                        message: err.to_string(),
                    })
                })?
            }
            None => CallbackOutcome::Keep,
        };

        if let Token::Option {
            value,
            callback_fired,
            deferred: pending,
            ..
        } = &mut self.tokens[i]
        {
            *callback_fired = true;
            match outcome {
                CallbackOutcome::Keep => *pending = false,
                CallbackOutcome::Replace(new) => {
                    *value = new;
                    *pending = false;
                }
                // A second Defer from the deferred invocation is final.
                CallbackOutcome::Defer => *pending = !deferred,
            }
        }
        Ok(())
    }

    /// Re-invokes callbacks that asked to observe the fully classified
    /// line. Each runs at most once more.
    fn run_deferred(&mut self) -> Result<(), ParseError> {
        for i in 0..self.tokens.len() {
            if matches!(&self.tokens[i], Token::Option { deferred: true, .. }) {
                self.fire_callback(i, true)?;
            }
        }
        Ok(())
    }

    /// Descends into the configured default command when the line named no
    /// command at all.
    fn apply_default_command(&mut self) -> Result<bool, ParseError> {
        let matched = self
            .tokens
            .iter()
            .any(|t| matches!(t, Token::Command { .. } | Token::Extension { .. }));
        if matched {
            return Ok(false);
        }
        let head = self.head();
        let Some(name) = head.default_command() else {
            return Ok(false);
        };
        let Some(cmd) = head.find_command(&name) else {
            return Ok(false);
        };
        // Guard against default-command cycles.
        if self.stack.iter().any(|ctx| *ctx == cmd.context()) {
            return Ok(false);
        }
        debug!(command = %cmd.name(), "descending into default command");
        self.descend(&cmd)?;
        Ok(true)
    }

    /// Seeds defaults, folds in parsed tokens, binds positional arguments,
    /// applies environment overrides, and validates requirements.
    ///
    /// Precedence is default < parsed < environment.
    fn finish(self) -> Result<ParseResult, ParseError> {
        let head = self.head();
        let camel = head.camel_case();
        let treat_unknown = head.treat_unknown_options_as_arguments();
        let key = |name: &str| {
            if camel {
                camel_case(name)
            } else {
                name.to_string()
            }
        };

        let mut argv: BTreeMap<String, Value> = BTreeMap::new();
        let mut env_overrides: Vec<(String, Value)> = Vec::new();
        let mut supplied: HashSet<String> = HashSet::new();

        // Defaults root-to-head, so the most specific definition wins.
        for ctx in &self.stack {
            for opt in ctx.options().iter() {
                let default = opt.effective_default();
                if !default.is_null() {
                    argv.insert(key(&opt.name), default);
                }
                if let Some(env_name) = &opt.env
                    && let Some(raw_value) = self.options.env.get(env_name)
                {
                    let value = opt.transform(raw_value, false).map_err(|source| {
                        self.err(ParseErrorKind::InvalidValue {
                            name: opt.name.clone(),
                            source,
                        })
                    })?;
                    env_overrides.push((key(&opt.name), value));
                    supplied.insert(opt.name.clone());
                }
            }
        }

        let mut positionals: VecDeque<String> = VecDeque::new();
        // Leftover candidates in original token order; positionals consumed
        // by argument binding are dropped from the front later.
        let mut leftovers: Vec<Leftover> = Vec::new();
        let mut unknown: BTreeMap<String, Value> = BTreeMap::new();
        let mut command: Option<Command> = None;

        for token in &self.tokens {
            match token {
                Token::Option { spec, value, .. } => {
                    supplied.insert(spec.name.clone());
                    let k = key(&spec.name);
                    if spec.multiple {
                        match argv.get_mut(&k) {
                            Some(Value::Array(items)) => items.push(value.clone()),
                            _ => {
                                argv.insert(k, Value::Array(vec![value.clone()]));
                            }
                        }
                    } else if spec.datatype == "count" {
                        let next = match argv.get(&k) {
                            Some(Value::Count(n)) => n + 1,
                            _ => 1,
                        };
                        argv.insert(k, Value::Count(next));
                    } else {
                        argv.insert(k, value.clone());
                    }
                }
                Token::Unknown {
                    name,
                    negated,
                    inline,
                    value_raw,
                    raw,
                } => {
                    let value = if *negated {
                        Value::Bool(false)
                    } else if let Some(v) = inline {
                        Value::String(v.clone())
                    } else if let Some(v) = value_raw {
                        Value::String(v.clone())
                    } else {
                        Value::Bool(true)
                    };
                    argv.insert(key(name), value.clone());
                    unknown.insert(name.clone(), value);
                    if treat_unknown {
                        leftovers.push(Leftover::Verbatim(raw.clone()));
                        if let Some(v) = value_raw {
                            leftovers.push(Leftover::Verbatim(v.clone()));
                        }
                    }
                }
                Token::Argument { raw } | Token::Raw(raw) => {
                    positionals.push_back(raw.clone());
                    leftovers.push(Leftover::Positional(raw.clone()));
                }
                Token::Extra { tokens } => {
                    leftovers.extend(tokens.iter().map(|t| Leftover::Verbatim(t.clone())));
                }
                Token::Command { command: cmd, .. } | Token::Extension { command: cmd, .. } => {
                    command = Some(cmd.clone());
                }
            }
        }

        // Positional binding happens against the head context only. Env
        // values are collected alongside options so they land in the same
        // final override pass and beat a bound positional.
        let bindable = positionals.len();
        let mut missing_args: Vec<String> = Vec::new();
        for spec in &head.arguments() {
            let mut env_value = None;
            if let Some(env_name) = &spec.env
                && let Some(raw_value) = self.options.env.get(env_name)
            {
                env_value = Some(spec.transform(raw_value).map_err(|source| {
                    self.err(ParseErrorKind::InvalidValue {
                        name: spec.name.clone(),
                        source,
                    })
                })?);
            }

            if spec.multiple {
                let mut items = Vec::new();
                while let Some(raw_value) = positionals.pop_front() {
                    items.push(self.bind_argument(spec, &raw_value)?);
                }
                if items.is_empty() && env_value.is_none() && spec.required {
                    missing_args.push(spec.name.clone());
                }
                argv.insert(key(&spec.name), Value::Array(items));
            } else if let Some(raw_value) = positionals.pop_front() {
                let value = self.bind_argument(spec, &raw_value)?;
                argv.insert(key(&spec.name), value);
            } else if env_value.is_none() && spec.required {
                missing_args.push(spec.name.clone());
            }

            if let Some(value) = env_value {
                env_overrides.push((key(&spec.name), value));
            }
        }
        if !missing_args.is_empty() {
            return Err(self.err(ParseErrorKind::MissingRequiredArgument {
                names: missing_args,
            }));
        }

        for (k, value) in env_overrides {
            argv.insert(k, value);
        }

        let mut missing_options: Vec<String> = Vec::new();
        for ctx in &self.stack {
            for opt in ctx.options().iter() {
                if opt.required
                    && !supplied.contains(&opt.name)
                    && !missing_options.contains(&opt.name)
                {
                    missing_options.push(opt.name.clone());
                }
            }
        }
        if !missing_options.is_empty() {
            return Err(self.err(ParseErrorKind::MissingRequiredOption {
                names: missing_options,
            }));
        }

        // Leftovers keep their original token order; drop the positionals
        // argument binding consumed (always a prefix, in order).
        let mut consumed = bindable - positionals.len();
        let mut args: Vec<Value> = Vec::new();
        for entry in leftovers {
            match entry {
                Leftover::Positional(_) if consumed > 0 => consumed -= 1,
                Leftover::Positional(raw) | Leftover::Verbatim(raw) => {
                    args.push(Value::String(raw));
                }
            }
        }

        Ok(ParseResult {
            argv,
            args,
            unknown,
            contexts: self.stack.iter().rev().cloned().collect(),
            command,
        })
    }

    fn bind_argument(&self, spec: &Rc<ArgumentSpec>, raw: &str) -> Result<Value, ParseError> {
        let value = spec.transform(raw).map_err(|source| {
            self.err(ParseErrorKind::InvalidValue {
                name: spec.name.clone(),
                source,
            })
        })?;

        let Some(callback) = spec.callback.clone() else {
            return Ok(value);
        };
        let mut data = CallbackData {
            ctx: self.head(),
            name: spec.name.clone(),
            value: value.clone(),
            negated: false,
            deferred: false,
        };
        match callback.invoke(&mut data).map_err(|err| {
            self.err(ParseErrorKind::Callback {
                name: spec.name.clone(),
                message: err.to_string(),
            })
        })? {
            CallbackOutcome::Replace(new) => Ok(new),
            _ => Ok(value),
        }
    }
}

/// A token eligible for the leftover list, kept in original order.
enum Leftover {
    /// A positional candidate; dropped if argument binding consumed it.
    Positional(String),
    /// Forwarded verbatim (`--` extras, unknown raws).
    Verbatim(String),
}

fn raw_text(token: Token) -> Option<String> {
    match token {
        Token::Raw(s) => Some(s),
        Token::Argument { raw } => Some(raw),
        Token::Unknown { raw, .. } => Some(raw),
        _ => None,
    }
}

fn looks_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}
