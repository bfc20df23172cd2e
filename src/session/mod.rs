//! Debugger session state.
//!
//! Owns the single user-visible source of truth: the script registry, the
//! breakpoint registry, watch expressions, the current backtrace and the
//! paused flag. Everything mutates from the console loop, which feeds it
//! protocol events and user commands one at a time.

pub mod breakpoint;
pub mod error;
pub mod process;
pub mod script;
pub mod watch;

use crate::protocol::client::ProtocolClient;
use crate::protocol::{
    BreakpointResolvedParams, CallFrame, EvaluateResponse, Location, PausedParams,
    ScriptParsedParams,
};
use crate::session::breakpoint::{Breakpoint, BreakpointRegistry};
use crate::session::error::Error;
use crate::session::script::ScriptRegistry;
use crate::session::watch::WatchList;
use crate::weak_error;
use serde_json::Value;
use strum_macros::{Display, EnumString};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString)]
pub enum PauseOnExceptions {
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "uncaught")]
    Uncaught,
    #[strum(serialize = "all")]
    All,
}

/// What the console prints when the target stops.
#[derive(Debug, PartialEq)]
pub struct PauseView {
    pub break_kind: String,
    pub url: String,
    pub line: u64,
}

/// The three accepted `setBreakpoint` argument shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointTarget {
    CurrentLocation,
    Line(i64),
    Named {
        name: String,
        line: Option<i64>,
        condition: Option<String>,
    },
}

#[derive(Debug, PartialEq)]
pub enum SetBreakpointOutcome {
    Set { url: Option<String>, line: u64 },
    PendingUrl { name: String },
    ByFunction(String),
    Ambiguous(String),
    NonPositiveLine,
}

#[derive(Debug, PartialEq)]
pub enum ClearBreakpointOutcome {
    Cleared,
    NotFound { url: String, line: u64 },
}

/// Everything the session learned from one protocol event that the console
/// may want to render.
#[derive(Debug, PartialEq)]
pub enum SessionUpdate {
    Paused(PauseView),
    Resumed,
    Silent,
}

pub struct Session {
    pub client: ProtocolClient,
    scripts: ScriptRegistry,
    breakpoints: BreakpointRegistry,
    pub watchers: WatchList,
    backtrace: Vec<CallFrame>,
    selected_frame: usize,
    paused: bool,
    pause_on_exceptions: PauseOnExceptions,
    pub last_command: Option<String>,
}

impl Session {
    pub fn new(client: ProtocolClient) -> Self {
        Self {
            client,
            scripts: ScriptRegistry::default(),
            breakpoints: BreakpointRegistry::default(),
            watchers: WatchList::default(),
            backtrace: vec![],
            selected_frame: 0,
            paused: false,
            pause_on_exceptions: PauseOnExceptions::None,
            last_command: None,
        }
    }

    // ---------------------------------- event translation ----------------------------------

    pub fn handle_event(&mut self, method: &str, params: Value) -> SessionUpdate {
        match method {
            "Debugger.scriptParsed" => {
                if let Some(params) =
                    weak_error!(serde_json::from_value::<ScriptParsedParams>(params))
                {
                    self.scripts.insert(params);
                }
                SessionUpdate::Silent
            }
            "Debugger.paused" => {
                match weak_error!(serde_json::from_value::<PausedParams>(params)) {
                    Some(params) => SessionUpdate::Paused(self.handle_paused(params)),
                    None => SessionUpdate::Silent,
                }
            }
            "Debugger.resumed" => {
                self.backtrace.clear();
                self.selected_frame = 0;
                self.paused = false;
                SessionUpdate::Resumed
            }
            "Debugger.breakpointResolved" => {
                if let Some(params) =
                    weak_error!(serde_json::from_value::<BreakpointResolvedParams>(params))
                {
                    let url = self.scripts.url_of(&params.location.script_id);
                    self.breakpoints
                        .resolve(&params.breakpoint_id, &params.location, url);
                }
                SessionUpdate::Silent
            }
            _ => SessionUpdate::Silent,
        }
    }

    fn handle_paused(&mut self, params: PausedParams) -> PauseView {
        self.backtrace = params.call_frames;
        self.selected_frame = 0;
        self.paused = true;

        let break_kind = if params.reason == "other" {
            "break".to_string()
        } else {
            params.reason
        };

        let (url, line) = match self.backtrace.first() {
            Some(top) => (
                self.display_url(&top.location.script_id),
                top.location.line_number + 1,
            ),
            None => ("<unknown>".to_string(), 0),
        };

        PauseView {
            break_kind,
            url,
            line,
        }
    }

    /// The transport died: frames are meaningless now, scripts survive until
    /// an explicit restart rebuilds the world.
    pub fn handle_closed(&mut self) {
        self.backtrace.clear();
        self.selected_frame = 0;
        self.paused = false;
    }

    /// Forget per-process state before a respawn. Breakpoints stay; they are
    /// re-issued by url on the next ready connection.
    pub fn prepare_restart(&mut self) {
        self.handle_closed();
        self.scripts.clear();
    }

    /// Runs after every successful (re)connect: restore the cached exception
    /// mode, then re-issue breakpoints that know their script url.
    pub fn on_ready(&mut self) -> Result<(), Error> {
        if self.pause_on_exceptions != PauseOnExceptions::None {
            self.client
                .debugger()
                .set_pause_on_exceptions(&self.pause_on_exceptions.to_string())?;
        }

        for (url, line_number) in self.breakpoints.take_reissue_set() {
            let response =
                self.client
                    .debugger()
                    .set_breakpoint_by_url(Some(&url), None, line_number, None)?;
            self.breakpoints.upsert(Breakpoint::unresolved(
                response.breakpoint_id,
                url,
                line_number,
            ));
        }
        Ok(())
    }

    // ---------------------------------- state access ----------------------------------

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.backtrace
    }

    pub fn selected_frame_index(&self) -> usize {
        self.selected_frame
    }

    pub fn selected(&self) -> Result<&CallFrame, Error> {
        if !self.paused {
            return Err(Error::NotPaused);
        }
        self.backtrace
            .get(self.selected_frame)
            .ok_or(Error::NotPaused)
    }

    pub fn select_frame(&mut self, number: usize) -> Result<&CallFrame, Error> {
        if !self.paused {
            return Err(Error::NotPaused);
        }
        if number >= self.backtrace.len() {
            return Err(Error::FrameNotFound(number));
        }
        self.selected_frame = number;
        Ok(&self.backtrace[number])
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    pub fn pause_on_exceptions(&self) -> PauseOnExceptions {
        self.pause_on_exceptions
    }

    pub fn display_url(&self, script_id: &str) -> String {
        match self.scripts.url_of(script_id) {
            Some(url) => script::relative_url(url),
            None => format!("<unknown script {script_id}>"),
        }
    }

    // ---------------------------------- operations ----------------------------------

    /// Evaluate in the selected frame when paused, globally otherwise.
    pub fn evaluate(&self, expression: &str) -> Result<EvaluateResponse, Error> {
        match self.selected() {
            Ok(frame) => self
                .client
                .debugger()
                .evaluate_on_call_frame(&frame.call_frame_id, expression),
            Err(Error::NotPaused) => self.client.runtime().evaluate(expression),
            Err(e) => Err(e),
        }
    }

    /// Evaluate every watch expression in the current context. Failures stay
    /// per-expression; the caller renders them as placeholders.
    pub fn eval_watchers(&self) -> Vec<(String, Result<EvaluateResponse, Error>)> {
        self.watchers
            .iter()
            .map(|expr| (expr.to_string(), self.evaluate(expr)))
            .collect()
    }

    pub fn set_pause_on_exceptions(&mut self, state: PauseOnExceptions) -> Result<(), Error> {
        self.client
            .debugger()
            .set_pause_on_exceptions(&state.to_string())?;
        self.pause_on_exceptions = state;
        Ok(())
    }

    pub fn set_breakpoint(
        &mut self,
        target: BreakpointTarget,
    ) -> Result<SetBreakpointOutcome, Error> {
        match target {
            BreakpointTarget::CurrentLocation => {
                let location = self.selected()?.location.clone();
                self.set_breakpoint_at(&location, None)
            }
            BreakpointTarget::Line(line) => {
                if line <= 0 {
                    return Ok(SetBreakpointOutcome::NonPositiveLine);
                }
                let location = Location {
                    script_id: self.selected()?.location.script_id.clone(),
                    line_number: line as u64 - 1,
                    column_number: None,
                };
                self.set_breakpoint_at(&location, None)
            }
            BreakpointTarget::Named {
                name,
                line,
                condition,
            } => self.set_breakpoint_named(name, line, condition),
        }
    }

    fn set_breakpoint_at(
        &mut self,
        location: &Location,
        condition: Option<&str>,
    ) -> Result<SetBreakpointOutcome, Error> {
        let response = self.client.debugger().set_breakpoint(location, condition)?;
        let actual = response.actual_location.unwrap_or_else(|| location.clone());
        let url = self.scripts.url_of(&actual.script_id).map(ToOwned::to_owned);
        self.breakpoints.upsert(Breakpoint::from_location(
            response.breakpoint_id,
            &actual,
            url.as_deref(),
        ));
        Ok(SetBreakpointOutcome::Set {
            url: url.map(|u| script::relative_url(&u)),
            line: actual.line_number + 1,
        })
    }

    fn set_breakpoint_named(
        &mut self,
        name: String,
        line: Option<i64>,
        condition: Option<String>,
    ) -> Result<SetBreakpointOutcome, Error> {
        // "fn()" means a function reference: delegate to the command-line api
        if let Some(function) = name.strip_suffix("()") {
            let response = self.evaluate(&format!("debug({function})"))?;
            if response.thrown() {
                return Err(error::evaluation_error(
                    response.exception_details.and_then(|d| d.exception).as_ref()
                        .unwrap_or(&response.result),
                ));
            }
            return Ok(SetBreakpointOutcome::ByFunction(function.to_string()));
        }

        let line = line.unwrap_or(1);
        if line <= 0 {
            return Ok(SetBreakpointOutcome::NonPositiveLine);
        }
        let line_number = line as u64 - 1;

        let matches: Vec<_> = self
            .scripts
            .find_by_substring(&name)
            .into_iter()
            .map(|s| (s.script_id.clone(), s.url.clone()))
            .collect();

        match matches.as_slice() {
            [] => {
                // not parsed yet: register by anchored url regex and wait for
                // the target to resolve it
                let url_regex = format!("^(.*[\\/\\\\])?{}$", regex_escape(&name));
                let response = self.client.debugger().set_breakpoint_by_url(
                    None,
                    Some(&url_regex),
                    line_number,
                    condition.as_deref(),
                )?;
                self.breakpoints.upsert(Breakpoint::unresolved(
                    response.breakpoint_id,
                    name.clone(),
                    line_number,
                ));
                Ok(SetBreakpointOutcome::PendingUrl { name })
            }
            [(script_id, url)] => {
                let location = Location {
                    script_id: script_id.clone(),
                    line_number,
                    column_number: None,
                };
                let url = url.clone();
                let response = self
                    .client
                    .debugger()
                    .set_breakpoint(&location, condition.as_deref())?;
                let actual = response.actual_location.unwrap_or(location);
                self.breakpoints.upsert(Breakpoint::from_location(
                    response.breakpoint_id,
                    &actual,
                    Some(&url),
                ));
                Ok(SetBreakpointOutcome::Set {
                    url: Some(script::relative_url(&url)),
                    line: actual.line_number + 1,
                })
            }
            _ => Ok(SetBreakpointOutcome::Ambiguous(name)),
        }
    }

    pub fn clear_breakpoint(
        &mut self,
        url_part: &str,
        line: u64,
    ) -> Result<ClearBreakpointOutcome, Error> {
        let Some(id) = self
            .breakpoints
            .find_by_url_line(url_part, line)
            .map(|bp| bp.breakpoint_id.clone())
        else {
            return Ok(ClearBreakpointOutcome::NotFound {
                url: url_part.to_string(),
                line,
            });
        };

        self.client.debugger().remove_breakpoint(&id)?;
        self.breakpoints.remove(&id);
        Ok(ClearBreakpointOutcome::Cleared)
    }
}

fn regex_escape(raw: &str) -> String {
    raw.chars()
        .flat_map(|c| {
            let escape = matches!(
                c,
                '.' | '+' | '*' | '?' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
                    | '/'
            );
            escape
                .then_some('\\')
                .into_iter()
                .chain(std::iter::once(c))
        })
        .collect()
}
