//! The interactive console: a readline thread, the target's output pumps and
//! one single-consumer application loop that owns every piece of session
//! state.
//!
//! The readline thread only issues a `readline()` after the loop hands it a
//! prompt token, so rendering that must finish before the next prompt (the
//! on-pause view, reconnect progress) simply withholds the token.

pub mod editor;
pub mod file;
pub mod help;
pub mod hook;
pub mod print;
pub mod variable;

use crate::protocol::client::{ClientEvent, ProtocolClient};
use crate::session::Session;
use crate::session::error::Error;
use crate::session::process::{
    CONNECT_ATTEMPTS, CONNECT_BACKOFF_MS, LISTENING_HINT, TargetProcess, TargetSource,
};
use crate::session::{ClearBreakpointOutcome, SessionUpdate, SetBreakpointOutcome};
use crate::ui::command::parser::{is_known_verb, leading_word};
use crate::ui::command::{Command, CommandError};
use crate::ui::console::editor::{CommandCompleter, ConsoleEditor, create_editor};
use crate::ui::console::file::SourceView;
use crate::ui::console::hook::TerminalHook;
use crate::ui::console::print::ExternalPrinter;
use crate::ui::console::print::style::{ErrorView, ImportantView};
use crate::ui::{ReadlineMode, config};
use crate::weak_error;
use crossterm::style::{Color, Stylize};
use crossterm::tty::IsTty;
use rustyline::error::ReadlineError;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::exit;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, Once, mpsc};
use std::thread;
use std::time::Duration;

const CONTROL_PROMPT: &str = "debug> ";
const DEBUG_PROMPT: &str = "> ";

enum UserAction {
    /// New command from user received
    Cmd(String),
    /// Ctrl-C at the prompt
    Interrupt,
    /// Terminate application
    Terminate,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum PromptMode {
    Control,
    Debug,
}

enum AppEvent {
    User(UserAction),
    Client(ClientEvent),
}

pub struct AppBuilder {
    source: TargetSource,
}

impl AppBuilder {
    pub fn new(source: TargetSource) -> Self {
        Self { source }
    }

    pub fn build(self) -> anyhow::Result<TerminalApplication> {
        let editor = match config().readline {
            ReadlineMode::Disabled => None,
            ReadlineMode::Auto | ReadlineMode::Forced => Some(create_editor(CONTROL_PROMPT)?),
        };

        Ok(TerminalApplication {
            source: self.source,
            editor,
        })
    }
}

pub struct TerminalApplication {
    source: TargetSource,
    editor: Option<ConsoleEditor>,
}

impl TerminalApplication {
    pub fn run(mut self) -> anyhow::Result<()> {
        crate::log::init_from_env();

        let (app_tx, app_rx) = mpsc::channel::<AppEvent>();
        let (prompt_tx, prompt_rx) = mpsc::channel::<PromptMode>();

        // protocol events ride the same queue as user input, preserving
        // dispatch order
        let (client_tx, client_rx) = mpsc::channel::<ClientEvent>();
        {
            let app_tx = app_tx.clone();
            thread::spawn(move || {
                while let Ok(event) = client_rx.recv() {
                    if app_tx.send(AppEvent::Client(event)).is_err() {
                        return;
                    }
                }
            });
        }

        let (host, port) = match &self.source {
            TargetSource::Spawn { port, .. } => ("127.0.0.1".to_string(), *port),
            TargetSource::Remote { host, port } => (host.clone(), *port),
        };
        let client = ProtocolClient::new(host, port, client_tx);
        let session = Session::new(client);

        let printer = match self.editor.as_mut() {
            Some(editor) => ExternalPrinter::new(Box::new(editor.create_external_printer()?)),
            None => ExternalPrinter::plain(),
        };

        static CTRLC_ONCE: Once = Once::new();
        {
            // while the target runs, ctrl+c must not kill the debugger; with
            // a terminal rustyline reports it as a readline interrupt, but
            // forced readline mode without a tty never sees the keypress, so
            // the signal itself is forwarded as an interrupt
            let app_tx = app_tx.clone();
            let forward_interrupt = config().readline == ReadlineMode::Forced
                && !std::io::stdout().is_tty();
            CTRLC_ONCE.call_once(move || {
                ctrlc::set_handler(move || {
                    if forward_interrupt {
                        _ = app_tx.send(AppEvent::User(UserAction::Interrupt));
                    }
                })
                .expect("error setting Ctrl-C handler")
            });
        }

        let completer = self
            .editor
            .as_ref()
            .and_then(|editor| editor.helper().map(|helper| helper.completer.clone()));

        // readline thread: waits for a prompt token, reads one line, repeats
        {
            let app_tx = app_tx.clone();
            let editor = self.editor.take();
            thread::spawn(move || readline_loop(editor, prompt_rx, app_tx));
        }

        let source_view = Rc::new(SourceView::new());
        let hook = TerminalHook::new(printer.clone(), source_view.clone());

        let mut app_loop = AppLoop {
            session,
            source: self.source,
            target: None,
            app_rx,
            prompt_tx,
            printer,
            source_view,
            hook,
            completer,
            mode: PromptMode::Control,
            waiting_for_pause: false,
        };

        app_loop.start_target()?;
        app_loop.run()
    }
}

fn readline_loop(
    mut editor: Option<ConsoleEditor>,
    prompt_rx: Receiver<PromptMode>,
    app_tx: Sender<AppEvent>,
) {
    let mut control_history: Vec<String> = vec![];
    let mut debug_history: Vec<String> = vec![];
    let mut last_mode = PromptMode::Control;

    loop {
        let Ok(mode) = prompt_rx.recv() else { return };

        if mode != last_mode {
            if let Some(editor) = editor.as_mut() {
                // both modes keep their own history
                _ = editor.clear_history();
                let history = match mode {
                    PromptMode::Control => &control_history,
                    PromptMode::Debug => &debug_history,
                };
                for entry in history {
                    _ = editor.add_history_entry(entry);
                }
            }
            last_mode = mode;
        }

        let prompt = match mode {
            PromptMode::Control => CONTROL_PROMPT,
            PromptMode::Debug => DEBUG_PROMPT,
        };

        let line = match editor.as_mut() {
            Some(editor) => {
                if let Some(helper) = editor.helper_mut() {
                    helper.colored_prompt = if config().colors {
                        format!("{}", prompt.with(Color::DarkGreen))
                    } else {
                        prompt.to_string()
                    };
                }
                editor.readline(prompt)
            }
            None => plain_readline(prompt),
        };

        match line {
            Ok(input) => {
                let quitting = input == "q" || input == "quit";
                if quitting && mode == PromptMode::Control {
                    _ = app_tx.send(AppEvent::User(UserAction::Terminate));
                    return;
                }
                if quitting && mode == PromptMode::Debug {
                    _ = app_tx.send(AppEvent::User(UserAction::Interrupt));
                    continue;
                }

                if !input.trim().is_empty() {
                    if let Some(editor) = editor.as_mut() {
                        _ = editor.add_history_entry(&input);
                    }
                    match mode {
                        PromptMode::Control => control_history.push(input.clone()),
                        PromptMode::Debug => debug_history.push(input.clone()),
                    }
                }
                if app_tx.send(AppEvent::User(UserAction::Cmd(input))).is_err() {
                    return;
                }
            }
            Err(ReadlineError::Interrupted) => {
                _ = app_tx.send(AppEvent::User(UserAction::Interrupt));
            }
            Err(ReadlineError::Eof) => {
                _ = app_tx.send(AppEvent::User(UserAction::Terminate));
                return;
            }
            Err(err) => {
                eprintln!("{}", ErrorView::from(err));
                _ = app_tx.send(AppEvent::User(UserAction::Terminate));
                return;
            }
        }
    }
}

fn plain_readline(prompt: &str) -> Result<String, ReadlineError> {
    print!("{prompt}");
    _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => Err(ReadlineError::Eof),
        Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
        Err(e) => Err(ReadlineError::Io(e)),
    }
}

struct AppLoop {
    session: Session,
    source: TargetSource,
    target: Option<TargetProcess>,
    app_rx: Receiver<AppEvent>,
    prompt_tx: Sender<PromptMode>,
    printer: ExternalPrinter,
    source_view: Rc<SourceView>,
    hook: TerminalHook,
    completer: Option<Arc<Mutex<CommandCompleter>>>,
    mode: PromptMode,
    waiting_for_pause: bool,
}

impl AppLoop {
    /// Spawn (or attach to) the target and connect. In spawn mode the first
    /// prompt waits for the initial break.
    fn start_target(&mut self) -> anyhow::Result<()> {
        match self.source.clone() {
            TargetSource::Spawn { script, args, port } => {
                let mut target = TargetProcess::spawn(&script, &args, port)?;
                let listen_rx = spawn_output_pumps(&mut target, self.printer.clone());
                self.target = Some(target);
                _ = listen_rx.recv_timeout(Duration::from_secs(10));
                self.connect_with_retry();
                self.waiting_for_pause = true;
            }
            TargetSource::Remote { .. } => {
                self.connect_with_retry();
                self.release_prompt();
            }
        }
        _ = weak_error!(self.session.on_ready());
        Ok(())
    }

    fn connect_with_retry(&mut self) {
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.session.client.connect() {
                Ok(()) => return,
                Err(e) => {
                    log::debug!(target: "inspect", "connect attempt {attempt}: {e:#}");
                    print!(".");
                    _ = std::io::stdout().flush();
                    if attempt < CONNECT_ATTEMPTS {
                        thread::sleep(Duration::from_millis(CONNECT_BACKOFF_MS));
                    }
                }
            }
        }
        println!(" failed to connect, please retry");
        exit(1);
    }

    fn release_prompt(&self) {
        _ = self.prompt_tx.send(self.mode);
    }

    /// Refresh breakpoint-target completion from the live script registry.
    fn update_completer_hints(&self) {
        let Some(completer) = self.completer.as_ref() else {
            return;
        };
        let urls: Vec<String> = self
            .session
            .scripts()
            .iter()
            .filter(|script| !script.is_native)
            .map(|script| script.url.clone())
            .collect();
        completer.lock().unwrap().replace_script_hints(urls);
    }

    fn run(mut self) -> anyhow::Result<()> {
        loop {
            let Ok(event) = self.app_rx.recv() else {
                self.shutdown();
                return Ok(());
            };

            match event {
                AppEvent::Client(ClientEvent::Event { method, params }) => {
                    match self.session.handle_event(&method, params) {
                        SessionUpdate::Paused(view) => {
                            self.update_completer_hints();
                            self.hook.on_paused(&self.session, &view);
                            if self.waiting_for_pause {
                                self.waiting_for_pause = false;
                                self.release_prompt();
                            }
                        }
                        SessionUpdate::Resumed | SessionUpdate::Silent => {}
                    }
                }
                AppEvent::Client(ClientEvent::Closed) => {
                    self.session.handle_closed();
                    self.source_view.clear();
                    self.hook.on_connection_closed();
                    if self.waiting_for_pause {
                        self.waiting_for_pause = false;
                        self.release_prompt();
                    }
                }
                AppEvent::User(UserAction::Cmd(line)) => {
                    let resumed = match self.mode {
                        PromptMode::Control => self.dispatch_control_line(&line),
                        PromptMode::Debug => {
                            self.eval_and_print(&line);
                            false
                        }
                    };
                    if resumed {
                        self.waiting_for_pause = true;
                    } else {
                        self.release_prompt();
                    }
                }
                AppEvent::User(UserAction::Interrupt) => {
                    if self.mode == PromptMode::Debug {
                        self.mode = PromptMode::Control;
                    }
                    self.release_prompt();
                }
                AppEvent::User(UserAction::Terminate) => {
                    self.shutdown();
                    return Ok(());
                }
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(target) = self.target.as_mut() {
            target.kill();
        }
        self.session.client.reset();
    }

    /// Route one control-mode line. Returns true when the command resumed the
    /// target, in which case the prompt waits for the next pause.
    fn dispatch_control_line(&mut self, line: &str) -> bool {
        let line = line.trim().to_string();
        if line.is_empty() {
            let Some(last) = self.session.last_command.clone() else {
                return false;
            };
            return self.dispatch_control_line(&last);
        }
        self.session.last_command = Some(line.clone());

        let word = leading_word(&line);
        let command = if word.is_empty() || !is_known_verb(word) {
            Ok(Command::Eval(line.clone()))
        } else {
            Command::parse(&line)
        };

        match command {
            Ok(command) => match self.handle_command(command) {
                Ok(resumed) => resumed,
                Err(e) => {
                    self.handle_error(e);
                    false
                }
            },
            Err(CommandError::Parsing(report)) => {
                self.printer.println(report);
                false
            }
            Err(e) => {
                self.handle_error(e);
                false
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> Result<bool, CommandError> {
        match command {
            Command::Run => {
                if self.session.client.is_connected() {
                    self.printer.println("App is already running");
                } else {
                    self.restart_target()?;
                    return Ok(true);
                }
            }
            Command::Restart => {
                self.restart_target()?;
                return Ok(true);
            }
            Command::Kill => {
                if let Some(target) = self.target.as_mut() {
                    target.kill();
                }
                self.session.client.reset();
                self.session.handle_closed();
                self.source_view.clear();
            }
            Command::Continue => {
                self.session.selected()?;
                self.session.client.debugger().resume()?;
                return Ok(true);
            }
            Command::Next => {
                self.session.selected()?;
                self.session.client.debugger().step_over()?;
                return Ok(true);
            }
            Command::StepIn => {
                self.session.selected()?;
                self.session.client.debugger().step_into()?;
                return Ok(true);
            }
            Command::StepOut => {
                self.session.selected()?;
                self.session.client.debugger().step_out()?;
                return Ok(true);
            }
            Command::Pause => {
                self.session.client.debugger().pause()?;
            }
            Command::Backtrace => {
                self.hook.render_backtrace(&self.session)?;
            }
            Command::List(delta) => {
                self.hook.render_list(&self.session, delta.unwrap_or(5))?;
            }
            Command::SetBreakpoint(target) => {
                let outcome = self.session.set_breakpoint(target)?;
                self.report_set_breakpoint(outcome);
            }
            Command::ClearBreakpoint { url, line } => {
                let outcome = self.session.clear_breakpoint(&url, line)?;
                if let ClearBreakpointOutcome::NotFound { url, line } = outcome {
                    self.printer.println(ErrorView::from(format!(
                        "Could not find breakpoint at {url}:{line}"
                    )));
                }
            }
            Command::Breakpoints => {
                if self.session.breakpoints().is_empty() {
                    self.printer.println("No breakpoints yet");
                } else {
                    for (number, bp) in self.session.breakpoints().iter().enumerate() {
                        let place = match &bp.script_url {
                            Some(url) => format!(
                                "{}:{}",
                                crate::session::script::relative_url(url),
                                bp.line_number + 1
                            ),
                            None => bp.breakpoint_id.clone(),
                        };
                        self.printer.println(format!("#{number} {place}"));
                    }
                }
            }
            Command::BreakOn(state) => {
                self.session.set_pause_on_exceptions(state)?;
            }
            Command::Watch(expression) => self.session.watchers.add(expression),
            Command::Unwatch(expression) => {
                self.session.watchers.remove(&expression);
            }
            Command::Watchers => self.hook.render_watchers(&self.session, false),
            Command::Exec(expression) | Command::Eval(expression) => {
                self.eval_and_print(&expression);
            }
            Command::Repl => {
                self.printer
                    .println(ImportantView::from("Press Ctrl+C to leave debug repl"));
                self.mode = PromptMode::Debug;
            }
            Command::Scripts { include_native } => self.report_scripts(include_native),
            Command::Version => {
                let result = self.session.client.runtime().evaluate("process.versions")?;
                match variable::render_eval(result) {
                    Ok(rendered) => self.printer.println(rendered),
                    Err(e) => self.handle_error(CommandError::Handle(e)),
                }
            }
            Command::Help => self.printer.print(help::help_overview()),
        }
        Ok(false)
    }

    fn report_set_breakpoint(&self, outcome: SetBreakpointOutcome) {
        match outcome {
            SetBreakpointOutcome::Set { url, line } => {
                let url = url.unwrap_or_else(|| print::style::UNKNOWN_PLACEHOLDER.to_string());
                self.printer
                    .println(format!("Breakpoint set at {url}:{line}"));
            }
            SetBreakpointOutcome::PendingUrl { name } => {
                self.printer.println(ImportantView::from(format!(
                    "Warning: script '{name}' was not loaded yet."
                )));
            }
            SetBreakpointOutcome::ByFunction(_) => {}
            SetBreakpointOutcome::Ambiguous(name) => {
                self.printer
                    .println(ErrorView::from(format!("Script name is ambiguous: {name}")));
            }
            SetBreakpointOutcome::NonPositiveLine => {
                self.printer
                    .println(ErrorView::from("Line should be a positive value"));
            }
        }
    }

    fn report_scripts(&self, include_native: bool) {
        let mut scripts: Vec<_> = self.session.scripts().iter().collect();
        scripts.sort_by_key(|script| script.script_id.parse::<u64>().unwrap_or(u64::MAX));

        let current_script = self
            .session
            .selected()
            .ok()
            .map(|frame| frame.location.script_id.clone());

        for script in scripts {
            let is_current = current_script.as_deref() == Some(script.script_id.as_str());
            if script.is_native && !include_native && !is_current {
                continue;
            }
            let marker = if is_current { '*' } else { ' ' };
            self.printer.println(format!(
                "{marker} {}: {}",
                script.script_id,
                crate::session::script::relative_url(&script.url)
            ));
        }
    }

    fn eval_and_print(&self, expression: &str) {
        match self
            .session
            .evaluate(expression)
            .and_then(variable::render_eval)
        {
            Ok(rendered) => self.printer.println(rendered),
            Err(Error::Evaluation { stack, .. }) => {
                self.printer
                    .println(ErrorView::from(format!("Uncaught {stack}")));
            }
            Err(e) => self.handle_error(CommandError::Handle(e)),
        }
    }

    /// Kill, reset, respawn and reconnect; breakpoints are re-issued on the
    /// fresh connection, watchers and the exception mode live in the session
    /// and simply survive.
    fn restart_target(&mut self) -> Result<(), CommandError> {
        self.session.client.reset();
        self.session.prepare_restart();
        self.source_view.clear();

        if let TargetSource::Spawn { script, args, port } = self.source.clone() {
            let printer = self.printer.clone();
            let listen_rx = match self.target.as_mut() {
                Some(target) => {
                    target.respawn().map_err(CommandError::Handle)?;
                    spawn_output_pumps(target, printer)
                }
                None => {
                    let mut target = TargetProcess::spawn(&script, &args, port)
                        .map_err(CommandError::Handle)?;
                    let listen_rx = spawn_output_pumps(&mut target, printer);
                    self.target = Some(target);
                    listen_rx
                }
            };
            _ = listen_rx.recv_timeout(Duration::from_secs(10));
        }

        self.connect_with_retry();
        _ = weak_error!(self.session.on_ready());
        Ok(())
    }

    fn handle_error(&self, error: CommandError) {
        match error {
            CommandError::Parsing(report) => {
                self.printer.println(report);
            }
            CommandError::Handle(ref err) if err.is_fatal() => {
                self.printer.println(ErrorView::from("Shutdown debugger"));
                self.printer
                    .println(ErrorView::from(format!("Fatal error: {error:#}")));
                exit(1);
            }
            CommandError::Handle(_) => {
                self.printer
                    .println(ErrorView::from(format!("Error: {error:#}")));
            }
        }
    }
}

/// Start the stdout/stderr pump threads for a freshly spawned target. The
/// returned channel fires once when stderr shows the inspector listening
/// hint.
fn spawn_output_pumps(target: &mut TargetProcess, printer: ExternalPrinter) -> Receiver<()> {
    let (listen_tx, listen_rx) = mpsc::channel();
    let (stdout, stderr) = target.take_output();

    if let Some(stdout) = stdout {
        let printer = printer.clone();
        thread::spawn(move || pump_output(stdout, printer, None, false));
    }
    if let Some(stderr) = stderr {
        thread::spawn(move || pump_output(stderr, printer, Some(listen_tx), true));
    }
    listen_rx
}

fn pump_output(
    stream: impl Read + Send + 'static,
    printer: ExternalPrinter,
    mut listen_tx: Option<Sender<()>>,
    is_stderr: bool,
) {
    let mut stream = BufReader::new(stream);
    loop {
        let mut line = String::new();
        let size = stream.read_line(&mut line).unwrap_or(0);
        if size == 0 {
            return;
        }

        if let Some(tx) = listen_tx.as_ref() {
            if line.contains(LISTENING_HINT) {
                _ = tx.send(());
                listen_tx = None;
            }
        }

        // split on any break, drop empties, prefix each survivor
        for part in line.split(['\n', '\r']) {
            if part.is_empty() {
                continue;
            }
            if is_stderr {
                printer.println(ErrorView::from(format!("< {part}")));
            } else {
                printer.println(format!("< {part}"));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn offline_loop() -> AppLoop {
        let (client_tx, _client_rx) = mpsc::channel();
        let session = Session::new(ProtocolClient::new("127.0.0.1", 0, client_tx));
        let (_app_tx, app_rx) = mpsc::channel();
        let (prompt_tx, _prompt_rx) = mpsc::channel();
        let source_view = Rc::new(SourceView::new());
        let hook = TerminalHook::new(ExternalPrinter::plain(), source_view.clone());

        AppLoop {
            session,
            source: TargetSource::Remote {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            target: None,
            app_rx,
            prompt_tx,
            printer: ExternalPrinter::plain(),
            source_view,
            hook,
            completer: None,
            mode: PromptMode::Control,
            waiting_for_pause: false,
        }
    }

    #[test]
    fn test_empty_line_repeats_last_command() {
        let mut app = offline_loop();

        // nothing remembered yet: an empty line is a no-op
        assert!(!app.dispatch_control_line(""));
        assert_eq!(app.session.last_command, None);

        app.dispatch_control_line("exec 1 + 1");
        assert_eq!(app.session.last_command.as_deref(), Some("exec 1 + 1"));

        // the empty line re-runs the exec and keeps the remembered command
        app.dispatch_control_line("");
        assert_eq!(app.session.last_command.as_deref(), Some("exec 1 + 1"));
    }

    #[test]
    fn test_non_verb_input_falls_back_to_evaluation() {
        let mut app = offline_loop();

        // offline, the evaluation fails and prints, but the line is still
        // remembered and the prompt does not wait for a pause
        assert!(!app.dispatch_control_line("[\"hello\",\"world\"].join(\" \")"));
        assert_eq!(
            app.session.last_command.as_deref(),
            Some("[\"hello\",\"world\"].join(\" \")")
        );
    }

    #[test]
    fn test_resume_verbs_refuse_while_running() {
        let mut app = offline_loop();

        // not paused: cont/next/step/out surface an error instead of waiting
        for verb in ["cont", "next", "step", "out"] {
            assert!(!app.dispatch_control_line(verb), "verb `{verb}`");
        }
    }
}
