//! Rendering of session events: the break header, the watcher block, the
//! source snippet and the backtrace.

use crate::session::error::Error;
use crate::session::{PauseView, Session};
use crate::ui::console::file::SourceView;
use crate::ui::console::print::ExternalPrinter;
use crate::ui::console::print::style::{ErrorView, FilePathView, FunctionNameView, KeywordView};
use crate::ui::console::variable::render_eval;
use crossterm::style::Stylize;
use std::rc::Rc;

/// Context lines shown around the paused location.
const PAUSE_SNIPPET_DELTA: u64 = 2;

pub struct TerminalHook {
    printer: ExternalPrinter,
    source_view: Rc<SourceView>,
}

impl TerminalHook {
    pub fn new(printer: ExternalPrinter, source_view: Rc<SourceView>) -> Self {
        Self {
            printer,
            source_view,
        }
    }

    /// The full on-pause view: header, watchers, snippet. Runs to completion
    /// before the console hands out the next prompt.
    pub fn on_paused(&self, session: &Session, view: &PauseView) {
        self.printer.println(format!(
            "{} in {}:{}",
            KeywordView::from(&view.break_kind),
            FilePathView::from(&view.url),
            view.line
        ));

        if !session.watchers.is_empty() {
            self.render_watchers(session, true);
        }

        if let Err(e) = self.render_list(session, PAUSE_SNIPPET_DELTA) {
            self.printer
                .println(ErrorView::from(format!("Render source error: {e:#}")));
        }
    }

    pub fn on_connection_closed(&self) {
        self.printer
            .println(ErrorView::from("Target disconnected."));
    }

    pub fn render_watchers(&self, session: &Session, verbose: bool) {
        if verbose {
            self.printer.println("Watchers:");
        }
        for (index, (expression, result)) in session.eval_watchers().into_iter().enumerate() {
            let value = match result.and_then(render_eval) {
                Ok(value) => value,
                Err(Error::Evaluation { message, .. }) => format!("<{message}>"),
                Err(e) => format!("<{e}>"),
            };
            self.printer
                .println(format!("  {index}: {expression} = {value}"));
        }
        if verbose {
            self.printer.println("");
        }
    }

    pub fn render_list(&self, session: &Session, delta: u64) -> Result<(), Error> {
        let frame = session.selected()?;
        let location = frame.location.clone();

        self.source_view.ensure(&session.client, &location.script_id)?;
        let is_breakpoint =
            |line: u64| session.breakpoints().covers_line(&location.script_id, line);
        let snippet = self.source_view.render_window(
            &location.script_id,
            location.line_number,
            location.column_number,
            delta,
            &is_breakpoint,
        )?;
        self.printer.print(snippet);
        Ok(())
    }

    pub fn render_backtrace(&self, session: &Session) -> Result<(), Error> {
        session.selected()?;

        for (number, frame) in session.frames().iter().enumerate() {
            let function_name = if frame.function_name.is_empty() {
                "(anonymous)"
            } else {
                &frame.function_name
            };
            let place = format!(
                "{}:{}:{}",
                session.display_url(&frame.location.script_id),
                frame.location.line_number + 1,
                frame.location.column_number.unwrap_or(0) + 1,
            );

            let mut line = format!(
                "#{number} {} {}",
                FunctionNameView::from(function_name),
                FilePathView::from(place)
            );
            if number == session.selected_frame_index() && crate::ui::config().colors {
                line = line.bold().to_string();
            }
            self.printer.println(line);
        }
        Ok(())
    }
}
