//! Colour and width of the output terminal.

use owo_colors::{OwoColorize, Style, colors::css};

/// Whether stdout is a terminal that renders colour.
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Terminal width in columns, if stdout is a terminal.
pub fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Whether the terminal is too narrow for the full listing (< 80 columns).
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 80)
}

/// Extension trait for colouring output; a no-op when colour is unsupported.
pub trait Colorize {
    /// Green, for completed actions and correct answers.
    fn success(&self) -> String;
    /// Amber, for high risk and unchanged drafts.
    fn warning(&self) -> String;
    /// Blue, for links.
    fn info(&self) -> String;
    /// Dimmed, for headings and secondary detail.
    fn dim(&self) -> String;
}

fn styled(text: &str, style: Style) -> String {
    if supports_color() {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

impl Colorize for str {
    fn success(&self) -> String {
        styled(self, Style::new().fg::<css::Green>())
    }

    fn warning(&self) -> String {
        styled(self, Style::new().fg::<css::Orange>())
    }

    fn info(&self) -> String {
        styled(self, Style::new().fg::<css::LightBlue>())
    }

    fn dim(&self) -> String {
        styled(self, Style::new().dimmed())
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}
