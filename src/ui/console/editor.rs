use crate::ui::command::parser::{
    SET_BREAKPOINT_COMMAND, SET_BREAKPOINT_COMMAND_SHORT, VERBS,
};
use crossterm::style::Stylize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline::hint::HistoryHinter;
use rustyline::history::MemHistory;
use rustyline::line_buffer::LineBuffer;
use rustyline::validate::MatchingBracketValidator;
use rustyline::{Changeset, CompletionType, Config, Context, Editor};
use rustyline::{Helper, Hinter, Validator};
use std::borrow::Cow;
use std::borrow::Cow::{Borrowed, Owned};
use std::sync::{Arc, Mutex};
use trie_rs::{Trie, TrieBuilder};

pub type ConsoleEditor = Editor<RLHelper, MemHistory>;

struct CommandHint {
    short: Option<&'static str>,
    long: &'static str,
}

impl CommandHint {
    fn display_with_short(&self) -> String {
        match self.short {
            Some(short) if self.long.starts_with(short) => format!(
                "{}{}",
                short.bold().underlined(),
                &self.long[short.len()..]
            ),
            Some(short) => format!("{}|{}", self.long, short.bold().underlined()),
            None => self.long.to_string(),
        }
    }
}

pub struct CommandCompleter {
    commands: Vec<CommandHint>,
    script_hints: Trie<u8>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: VERBS
                .iter()
                .map(|(long, short, _)| CommandHint {
                    short: *short,
                    long: *long,
                })
                .collect(),
            script_hints: TrieBuilder::new().build(),
        }
    }

    /// Feed script file names from the live registry so breakpoint targets
    /// complete.
    pub fn replace_script_hints(&mut self, urls: impl IntoIterator<Item = String>) {
        let mut builder = TrieBuilder::new();
        for url in urls {
            let file_name = url.rsplit('/').next().unwrap_or(&url).to_owned();
            builder.push(file_name);
        }
        self.script_hints = builder.build();
    }
}

/// A breakpoint invocation with an open string argument: the part after the
/// quote completes against known script names.
fn breakpoint_script_prefix(line: &str) -> Option<&str> {
    let rest = [SET_BREAKPOINT_COMMAND, SET_BREAKPOINT_COMMAND_SHORT]
        .iter()
        .find_map(|verb| line.trim_start().strip_prefix(verb))?;
    let rest = rest.trim_start().strip_prefix('(')?;
    let rest = rest.trim_start();
    let quoted = rest.strip_prefix('"').or_else(|| rest.strip_prefix('\''))?;
    // a closed literal has nothing left to complete
    (!quoted.contains('"') && !quoted.contains('\'')).then_some(quoted)
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        if let Some(prefix) = breakpoint_script_prefix(line) {
            if !prefix.is_empty() {
                let variants = self.script_hints.predictive_search(prefix);
                if !variants.is_empty() {
                    let pos = line.len() - prefix.len();
                    let pairs = variants
                        .iter()
                        .map(|v| {
                            let name = std::str::from_utf8(v.as_slice())
                                .expect("invalid utf-8 string")
                                .to_string();
                            Pair {
                                display: name.clone(),
                                replacement: name,
                            }
                        })
                        .collect();
                    return Ok((pos, pairs));
                }
            }
            return Ok((0, vec![]));
        }

        let pairs = self
            .commands
            .iter()
            .filter(|cmd| cmd.long.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.display_with_short(),
                replacement: cmd.long.to_string(),
            })
            .collect();
        Ok((0, pairs))
    }
}

#[derive(Helper, Hinter, Validator)]
pub struct RLHelper {
    pub completer: Arc<Mutex<CommandCompleter>>,
    highlighter: MatchingBracketHighlighter,
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    pub colored_prompt: String,
}

impl Completer for RLHelper {
    type Candidate = <CommandCompleter as Completer>::Candidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        self.completer.lock().unwrap().complete(line, pos, ctx)
    }

    fn update(&self, line: &mut LineBuffer, start: usize, elected: &str, cl: &mut Changeset) {
        self.completer
            .lock()
            .unwrap()
            .update(line, start, elected, cl)
    }
}

impl Highlighter for RLHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Borrowed(&self.colored_prompt)
        } else {
            Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned("\x1b[1m".to_owned() + hint + "\x1b[m")
    }

    fn highlight_char(&self, line: &str, pos: usize, forced: rustyline::highlight::CmdKind) -> bool {
        self.highlighter.highlight_char(line, pos, forced)
    }
}

pub fn create_editor(prompt: &str) -> anyhow::Result<ConsoleEditor> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let h = RLHelper {
        completer: Arc::new(Mutex::new(CommandCompleter::new())),
        highlighter: MatchingBracketHighlighter::new(),
        hinter: HistoryHinter::new(),
        colored_prompt: prompt.to_string(),
        validator: MatchingBracketValidator::new(),
    };

    let mut editor = Editor::with_history(config, MemHistory::new())?;
    editor.set_helper(Some(h));
    Ok(editor)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_breakpoint_script_prefix() {
        assert_eq!(breakpoint_script_prefix("sb(\"bre"), Some("bre"));
        assert_eq!(breakpoint_script_prefix("setBreakpoint('oth"), Some("oth"));
        assert_eq!(breakpoint_script_prefix("sb(\"break.js\", 6)"), None);
        assert_eq!(breakpoint_script_prefix("watch('x"), None);
        assert_eq!(breakpoint_script_prefix("sb(3)"), None);
    }
}
