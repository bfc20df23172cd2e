//! Remote script source rendering.
//!
//! Sources come over the wire once per script and are cached line-split; the
//! cache dies with the connection (script ids are per-process).

use crate::protocol::client::ProtocolClient;
use crate::session::error::Error;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
pub struct SourceView {
    cached_lines: RefCell<HashMap<String, Box<[String]>>>,
}

impl SourceView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the script source is cached, fetching it if needed.
    pub fn ensure(&self, client: &ProtocolClient, script_id: &str) -> Result<(), Error> {
        if self.cached_lines.borrow().contains_key(script_id) {
            return Ok(());
        }
        let source = client.debugger().get_script_source(script_id)?;
        self.store(script_id, &source);
        Ok(())
    }

    pub fn store(&self, script_id: &str, source: &str) {
        let lines: Vec<String> = source.lines().map(ToOwned::to_owned).collect();
        self.cached_lines
            .borrow_mut()
            .insert(script_id.to_string(), lines.into_boxed_slice());
    }

    pub fn clear(&self) {
        self.cached_lines.borrow_mut().clear();
    }

    /// Render ±`delta` display lines around the current (0-based) location.
    ///
    /// The current line is prefixed with `>`, lines holding a breakpoint with
    /// `*`; the current column gets the color marker when enabled.
    pub fn render_window(
        &self,
        script_id: &str,
        line_number: u64,
        column_number: Option<u64>,
        delta: u64,
        is_breakpoint: &dyn Fn(u64) -> bool,
    ) -> Result<String, Error> {
        let cache = self.cached_lines.borrow();
        let lines = cache
            .get(script_id)
            .ok_or_else(|| Error::UnknownScript(script_id.to_string()))?;

        let current = line_number + 1;
        let start = current.saturating_sub(delta).max(1);
        let end = (current + delta).min(lines.len() as u64);
        let width = end.to_string().len();

        let mut out = String::new();
        for display_line in start..=end.max(start) {
            let Some(text) = lines.get(display_line as usize - 1) else {
                break;
            };

            let is_current = display_line == current;
            let marker = if is_current {
                '>'
            } else if is_breakpoint(display_line - 1) {
                '*'
            } else {
                ' '
            };

            let text = if is_current {
                mark_source_column(text, column_number.unwrap_or(0) as usize)
            } else {
                text.clone()
            };

            out.push_str(&format!("{marker}{display_line:>width$} {text}\n"));
        }
        Ok(out)
    }
}

/// Colourize the token at the paused column so the caret position is visible
/// inside the line.
fn mark_source_column(text: &str, column: usize) -> String {
    if !crate::ui::config().colors || column >= text.len() || !text.is_char_boundary(column) {
        return text.to_string();
    }

    let (head, tail) = text.split_at(column);
    let token_len = tail
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric() && *c != '_')
        .map(|(i, _)| i)
        .unwrap_or(tail.len())
        .max(1);

    format!(
        "{head}\u{1b}[32m{}\u{1b}[39m{}",
        &tail[..token_len.min(tail.len())],
        &tail[token_len.min(tail.len())..]
    )
}

#[cfg(test)]
mod test {
    use super::*;

    const SOURCE: &str = "const x = 1;\nlet name = 'World';\nconsole.log(name);\nmore();\nlast();";

    fn view() -> SourceView {
        let view = SourceView::new();
        view.store("42", SOURCE);
        view
    }

    #[test]
    fn test_window_markers_and_clamping() {
        let view = view();
        let never = |_: u64| false;

        // current line 1 (0-based), delta 1 -> display lines 1..=3
        let out = view.render_window("42", 1, None, 1, &never).unwrap();
        assert_eq!(
            out,
            " 1 const x = 1;\n>2 let name = 'World';\n 3 console.log(name);\n"
        );

        // clamped at the top of the file
        let out = view.render_window("42", 0, None, 3, &never).unwrap();
        assert!(out.starts_with(">1 const x = 1;\n"));

        // clamped at the bottom
        let out = view.render_window("42", 4, None, 3, &never).unwrap();
        assert!(out.ends_with(">5 last();\n"));
    }

    #[test]
    fn test_breakpoint_marker() {
        let view = view();
        let on_line_two = |line: u64| line == 2;

        let out = view.render_window("42", 0, None, 2, &on_line_two).unwrap();
        assert!(out.contains("*3 console.log(name);"));
    }

    #[test]
    fn test_idempotent_rendering() {
        let view = view();
        let never = |_: u64| false;
        let first = view.render_window("42", 2, None, 2, &never).unwrap();
        let second = view.render_window("42", 2, None, 2, &never).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_script() {
        let view = view();
        assert!(matches!(
            view.render_window("7", 0, None, 2, &|_| false),
            Err(Error::UnknownScript(_))
        ));
    }
}
