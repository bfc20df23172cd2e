//! An interface to the debugger session.
//!
//! Contains the commands the control REPL understands. A command is a
//! request to the session that defines an action and its input arguments;
//! parsing lives in [`parser`], execution in the console loop.

pub mod parser;

use crate::session::error::Error;
use crate::session::{BreakpointTarget, PauseOnExceptions};

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("malformed command")]
    Parsing(String),
    #[error(transparent)]
    Handle(#[from] Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// External commands that can be processed by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run,
    Restart,
    Kill,
    Continue,
    Next,
    StepIn,
    StepOut,
    Pause,
    Backtrace,
    List(Option<u64>),
    SetBreakpoint(BreakpointTarget),
    ClearBreakpoint { url: String, line: u64 },
    Breakpoints,
    BreakOn(PauseOnExceptions),
    Watch(String),
    Unwatch(String),
    Watchers,
    Exec(String),
    Repl,
    Scripts { include_native: bool },
    Version,
    Help,
    /// Control-mode fallback: plain expression forwarded to the target.
    Eval(String),
}
