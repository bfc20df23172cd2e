pub mod command;
pub mod console;

use crossterm::tty::IsTty;
use std::sync::OnceLock;

/// How the line editor behaves, driven by the environment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ReadlineMode {
    /// Terminal editing when stdin is a tty, plain stream mode otherwise.
    Auto,
    /// `NODE_NO_READLINE=1`: always plain stream mode.
    Disabled,
    /// `NODE_FORCE_READLINE=1`: terminal behaviour even without a tty.
    Forced,
}

/// Console configuration, resolved once from the environment.
#[derive(Debug)]
pub struct UiConfig {
    pub colors: bool,
    pub readline: ReadlineMode,
}

impl UiConfig {
    fn from_env() -> Self {
        let colors = std::env::var("NODE_DISABLE_COLORS")
            .map(|v| v != "1")
            .unwrap_or(true)
            && std::io::stdout().is_tty();

        let readline = if std::env::var("NODE_NO_READLINE")
            .map(|v| v == "1")
            .unwrap_or(false)
        {
            ReadlineMode::Disabled
        } else if std::env::var("NODE_FORCE_READLINE")
            .map(|v| v == "1")
            .unwrap_or(false)
        {
            ReadlineMode::Forced
        } else {
            ReadlineMode::Auto
        };

        Self { colors, readline }
    }
}

static CONFIG: OnceLock<UiConfig> = OnceLock::new();

/// Return console config, resolving it from the environment on first use.
pub fn config() -> &'static UiConfig {
    CONFIG.get_or_init(UiConfig::from_env)
}
