//! Control-mode input parsing.
//!
//! Commands look like calls (`setBreakpoint("app.js", 3)`), with bare verbs
//! (`next`, `bt`) as the no-argument form. Input whose leading word is not a
//! verb at all is *not* an error; the console forwards it to the target as an
//! expression.

use super::{Command, CommandError, CommandResult};
use crate::session::{BreakpointTarget, PauseOnExceptions};
use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::Rich;
use chumsky::prelude::{choice, end, just, none_of};
use chumsky::text::{self, whitespace};
use chumsky::{IterParser, Parser, extra};

pub const RUN_COMMAND: &str = "run";
pub const RUN_COMMAND_SHORT: &str = "r";
pub const RESTART_COMMAND: &str = "restart";
pub const KILL_COMMAND: &str = "kill";
pub const CONTINUE_COMMAND: &str = "cont";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const NEXT_COMMAND: &str = "next";
pub const NEXT_COMMAND_SHORT: &str = "n";
pub const STEP_COMMAND: &str = "step";
pub const STEP_COMMAND_SHORT: &str = "s";
pub const OUT_COMMAND: &str = "out";
pub const OUT_COMMAND_SHORT: &str = "o";
pub const PAUSE_COMMAND: &str = "pause";
pub const BACKTRACE_COMMAND: &str = "backtrace";
pub const BACKTRACE_COMMAND_SHORT: &str = "bt";
pub const LIST_COMMAND: &str = "list";
pub const SET_BREAKPOINT_COMMAND: &str = "setBreakpoint";
pub const SET_BREAKPOINT_COMMAND_SHORT: &str = "sb";
pub const CLEAR_BREAKPOINT_COMMAND: &str = "clearBreakpoint";
pub const CLEAR_BREAKPOINT_COMMAND_SHORT: &str = "cb";
pub const BREAKPOINTS_COMMAND: &str = "breakpoints";
pub const BREAK_ON_EXCEPTION_COMMAND: &str = "breakOnException";
pub const BREAK_ON_UNCAUGHT_COMMAND: &str = "breakOnUncaught";
pub const BREAK_ON_NONE_COMMAND: &str = "breakOnNone";
pub const WATCH_COMMAND: &str = "watch";
pub const UNWATCH_COMMAND: &str = "unwatch";
pub const WATCHERS_COMMAND: &str = "watchers";
pub const EXEC_COMMAND: &str = "exec";
pub const REPL_COMMAND: &str = "repl";
pub const SCRIPTS_COMMAND: &str = "scripts";
pub const VERSION_COMMAND: &str = "version";
pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";

/// `(long, short, summary)` for every verb; shared by the help text and the
/// completer.
pub const VERBS: &[(&str, Option<&str>, &str)] = &[
    (RUN_COMMAND, Some(RUN_COMMAND_SHORT), "run the target if it is not running"),
    (RESTART_COMMAND, None, "kill and relaunch the target"),
    (KILL_COMMAND, None, "kill the target, keep the session"),
    (CONTINUE_COMMAND, Some(CONTINUE_COMMAND_SHORT), "resume execution"),
    (NEXT_COMMAND, Some(NEXT_COMMAND_SHORT), "step to the next line"),
    (STEP_COMMAND, Some(STEP_COMMAND_SHORT), "step into a call"),
    (OUT_COMMAND, Some(OUT_COMMAND_SHORT), "step out of the current function"),
    (PAUSE_COMMAND, None, "pause a running target"),
    (BACKTRACE_COMMAND, Some(BACKTRACE_COMMAND_SHORT), "print the current backtrace"),
    (LIST_COMMAND, None, "list source around the current line, list(n) widens"),
    (SET_BREAKPOINT_COMMAND, Some(SET_BREAKPOINT_COMMAND_SHORT), "set a breakpoint: (), (line), (\"file\", line), (\"fn()\")"),
    (CLEAR_BREAKPOINT_COMMAND, Some(CLEAR_BREAKPOINT_COMMAND_SHORT), "clear a breakpoint: (\"file\", line)"),
    (BREAKPOINTS_COMMAND, None, "list known breakpoints"),
    (BREAK_ON_EXCEPTION_COMMAND, None, "pause on every thrown exception"),
    (BREAK_ON_UNCAUGHT_COMMAND, None, "pause on uncaught exceptions only"),
    (BREAK_ON_NONE_COMMAND, None, "never pause on exceptions"),
    (WATCH_COMMAND, None, "watch an expression: (\"expr\")"),
    (UNWATCH_COMMAND, None, "drop a watcher by expression or index"),
    (WATCHERS_COMMAND, None, "evaluate and print every watcher"),
    (EXEC_COMMAND, None, "evaluate an expression in the target"),
    (REPL_COMMAND, None, "enter the evaluation repl, ctrl-c leaves"),
    (SCRIPTS_COMMAND, None, "list loaded scripts, scripts(true) adds internals"),
    (VERSION_COMMAND, None, "print the target runtime versions"),
    (HELP_COMMAND, Some(HELP_COMMAND_SHORT), "this overview"),
];

/// The word the dispatch decision looks at: leading identifier characters.
pub fn leading_word(line: &str) -> &str {
    let line = line.trim_start();
    let end = line
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(line.len());
    &line[..end]
}

pub fn is_known_verb(word: &str) -> bool {
    VERBS
        .iter()
        .any(|(long, short, _)| *long == word || *short == Some(word))
}

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(i64),
    Bool(bool),
}

fn string_literal<'a>() -> impl Parser<'a, &'a str, Arg, Err<'a>> + Clone {
    let single = just('\'')
        .ignore_then(none_of('\'').repeated().collect::<String>())
        .then_ignore(just('\''));
    let double = just('"')
        .ignore_then(none_of('"').repeated().collect::<String>())
        .then_ignore(just('"'));
    single.or(double).map(Arg::Str).labelled("string literal")
}

fn number_literal<'a>() -> impl Parser<'a, &'a str, Arg, Err<'a>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Arg::Num)
        .labelled("number")
}

fn bool_literal<'a>() -> impl Parser<'a, &'a str, Arg, Err<'a>> + Clone {
    just("true")
        .to(Arg::Bool(true))
        .or(just("false").to(Arg::Bool(false)))
        .labelled("boolean")
}

fn call_args<'a>() -> impl Parser<'a, &'a str, Vec<Arg>, Err<'a>> {
    let arg = choice((string_literal(), number_literal(), bool_literal())).padded();
    arg.separated_by(just(','))
        .collect::<Vec<_>>()
        .delimited_by(just('('), just(')'))
        .labelled("argument list")
}

fn invocation<'a>() -> impl Parser<'a, &'a str, (String, Option<Vec<Arg>>), Err<'a>> {
    text::ascii::ident()
        .padded()
        .then(call_args().or_not())
        .then_ignore(whitespace())
        .then_ignore(end())
        .map(|(verb, args): (&str, _)| (verb.to_string(), args))
}

impl Command {
    pub fn parse(input: &str) -> CommandResult<Command> {
        // bare `exec <anything>` is rewritten to exec("<anything>")
        let trimmed = input.trim();
        if let Some(raw) = trimmed.strip_prefix("exec ") {
            return Ok(Command::Exec(raw.trim().to_string()));
        }

        let (verb, args) = invocation()
            .parse(input)
            .into_result()
            .map_err(|errors| CommandError::Parsing(Self::render_errors(input, errors)))?;

        assemble(&verb, args).map_err(CommandError::Parsing)
    }

    pub fn render_errors(src: &str, errors: Vec<Rich<char>>) -> String {
        let mut reports = vec![];
        for e in errors {
            let mut buf = vec![];
            _ = Report::build(ReportKind::Error, ("<command>", e.span().into_range()))
                .with_message(format!("{}", e.reason()))
                .with_help("try \"help\" command")
                .with_label(
                    Label::new(("<command>", e.span().into_range()))
                        .with_message(format!(
                            "unexpected token {}",
                            e.found()
                                .map(|t| t.to_string())
                                .unwrap_or("EOL".to_string())
                        ))
                        .with_color(Color::Red),
                )
                .finish()
                .write_for_stdout(("<command>", Source::from(src)), &mut buf);
            reports.push(String::from_utf8_lossy(&buf).to_string());
        }
        reports.join("\n")
    }
}

fn assemble(verb: &str, args: Option<Vec<Arg>>) -> Result<Command, String> {
    let args = args.unwrap_or_default();

    let plain = |cmd: Command, args: &[Arg]| {
        if args.is_empty() {
            Ok(cmd)
        } else {
            Err(format!("`{verb}` takes no arguments"))
        }
    };

    match verb {
        v if v == RUN_COMMAND || v == RUN_COMMAND_SHORT => plain(Command::Run, &args),
        RESTART_COMMAND => plain(Command::Restart, &args),
        KILL_COMMAND => plain(Command::Kill, &args),
        v if v == CONTINUE_COMMAND || v == CONTINUE_COMMAND_SHORT => {
            plain(Command::Continue, &args)
        }
        v if v == NEXT_COMMAND || v == NEXT_COMMAND_SHORT => plain(Command::Next, &args),
        v if v == STEP_COMMAND || v == STEP_COMMAND_SHORT => plain(Command::StepIn, &args),
        v if v == OUT_COMMAND || v == OUT_COMMAND_SHORT => plain(Command::StepOut, &args),
        PAUSE_COMMAND => plain(Command::Pause, &args),
        v if v == BACKTRACE_COMMAND || v == BACKTRACE_COMMAND_SHORT => {
            plain(Command::Backtrace, &args)
        }
        LIST_COMMAND => match args.as_slice() {
            [] => Ok(Command::List(None)),
            [Arg::Num(delta)] => Ok(Command::List(Some((*delta).max(0) as u64))),
            _ => Err("list takes at most one number".to_string()),
        },
        v if v == SET_BREAKPOINT_COMMAND || v == SET_BREAKPOINT_COMMAND_SHORT => {
            match args.as_slice() {
                [] => Ok(Command::SetBreakpoint(BreakpointTarget::CurrentLocation)),
                [Arg::Num(line)] => Ok(Command::SetBreakpoint(BreakpointTarget::Line(*line))),
                [Arg::Str(name)] => Ok(Command::SetBreakpoint(BreakpointTarget::Named {
                    name: name.clone(),
                    line: None,
                    condition: None,
                })),
                [Arg::Str(name), Arg::Num(line)] => {
                    Ok(Command::SetBreakpoint(BreakpointTarget::Named {
                        name: name.clone(),
                        line: Some(*line),
                        condition: None,
                    }))
                }
                [Arg::Str(name), Arg::Num(line), Arg::Str(condition)] => {
                    Ok(Command::SetBreakpoint(BreakpointTarget::Named {
                        name: name.clone(),
                        line: Some(*line),
                        condition: Some(condition.clone()),
                    }))
                }
                _ => Err("usage: setBreakpoint(), setBreakpoint(line), setBreakpoint(\"file\", line[, \"condition\"])".to_string()),
            }
        }
        v if v == CLEAR_BREAKPOINT_COMMAND || v == CLEAR_BREAKPOINT_COMMAND_SHORT => {
            match args.as_slice() {
                [Arg::Str(url), Arg::Num(line)] if *line > 0 => Ok(Command::ClearBreakpoint {
                    url: url.clone(),
                    line: *line as u64,
                }),
                _ => Err("usage: clearBreakpoint(\"file\", line)".to_string()),
            }
        }
        BREAKPOINTS_COMMAND => plain(Command::Breakpoints, &args),
        BREAK_ON_EXCEPTION_COMMAND => plain(Command::BreakOn(PauseOnExceptions::All), &args),
        BREAK_ON_UNCAUGHT_COMMAND => plain(Command::BreakOn(PauseOnExceptions::Uncaught), &args),
        BREAK_ON_NONE_COMMAND => plain(Command::BreakOn(PauseOnExceptions::None), &args),
        WATCH_COMMAND => match args.as_slice() {
            [Arg::Str(expr)] => Ok(Command::Watch(expr.clone())),
            _ => Err("usage: watch(\"expression\")".to_string()),
        },
        UNWATCH_COMMAND => match args.as_slice() {
            [Arg::Str(expr)] => Ok(Command::Unwatch(expr.clone())),
            [Arg::Num(index)] => Ok(Command::Unwatch(index.to_string())),
            _ => Err("usage: unwatch(\"expression\") or unwatch(index)".to_string()),
        },
        WATCHERS_COMMAND => plain(Command::Watchers, &args),
        EXEC_COMMAND => match args.as_slice() {
            [Arg::Str(expr)] => Ok(Command::Exec(expr.clone())),
            [] => Err("usage: exec(\"expression\") or exec expression".to_string()),
            _ => Err("exec takes one string".to_string()),
        },
        REPL_COMMAND => plain(Command::Repl, &args),
        SCRIPTS_COMMAND => match args.as_slice() {
            [] => Ok(Command::Scripts {
                include_native: false,
            }),
            [Arg::Bool(include_native)] => Ok(Command::Scripts {
                include_native: *include_native,
            }),
            _ => Err("usage: scripts or scripts(true)".to_string()),
        },
        VERSION_COMMAND => plain(Command::Version, &args),
        v if v == HELP_COMMAND || v == HELP_COMMAND_SHORT => plain(Command::Help, &args),
        unknown => Err(format!("unknown command `{unknown}`, try \"help\"")),
    }
}
