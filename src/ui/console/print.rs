use rustyline::ExternalPrinter as RLExternalPrinter;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// [ExternalPrinter] safely prints messages above the active prompt.
///
/// Clones share one underlying editor printer, so the output pump threads,
/// the event hook and the command loop interleave whole lines instead of
/// fighting over the terminal. Without an editor (plain stream mode) it
/// degrades to stdout writes.
#[derive(Clone)]
pub struct ExternalPrinter {
    printer: Option<Arc<Mutex<Box<dyn RLExternalPrinter>>>>,
}

unsafe impl Send for ExternalPrinter {}
unsafe impl Sync for ExternalPrinter {}

impl ExternalPrinter {
    pub fn new(p: Box<dyn RLExternalPrinter>) -> Self {
        Self {
            printer: Some(Arc::new(Mutex::new(p))),
        }
    }

    /// Printer for plain stream mode: every message goes straight to stdout.
    pub fn plain() -> Self {
        Self { printer: None }
    }

    pub fn print(&self, msg: impl Display) {
        let msg = msg.to_string();
        match &self.printer {
            None => {
                println!("{msg}")
            }
            Some(printer) => {
                printer
                    .lock()
                    .unwrap()
                    .print(msg)
                    .expect("external printer error");
            }
        }
    }

    pub fn println(&self, msg: impl Display) {
        let msg = format!("{msg}\n");
        self.print(msg)
    }
}

pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    pub const UNKNOWN_PLACEHOLDER: &str = "???";

    struct View<T: Display> {
        inner: Option<T>,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            let text = self
                .inner
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());

            if crate::ui::config().colors {
                f.write_fmt(format_args!("{}", text.with(self.color)))
            } else {
                f.write_str(&text)
            }
        }
    }

    /// Construct structure declaration to display data of the same type
    /// (file paths, break kinds, etc.). Styling resets to plain text when
    /// colors are disabled.
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: Some(value),
                        color: $color,
                    })
                }
            }

            impl<T: Display> From<Option<T>> for $name<T> {
                fn from(value: Option<T>) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(FilePathView, Color::Green);
    view_struct!(FunctionNameView, Color::Yellow);
    view_struct!(KeywordView, Color::Magenta);
    view_struct!(ErrorView, Color::DarkRed);
    view_struct!(ImportantView, Color::Magenta);
}
