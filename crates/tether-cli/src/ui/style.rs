//! Message styling for CLI output.
//!
//! | Prefix   | Meaning     | Color  |
//! |----------|-------------|--------|
//! | `[ok]`   | Success     | Green  |
//! | `[err]`  | Error       | Red    |
//! | `[warn]` | Warning     | Yellow |
//! | `[info]` | Information | Blue   |
//! | `[hint]` | Suggestion  | Cyan   |
//! | `[skip]` | Nothing done| Dim    |

use owo_colors::OwoColorize;
use tether_core::EntityRef;

use super::color::ColorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    Hint,
    Skip,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

/// Styling interface shared by all command handlers.
///
/// ```ignore
/// use crate::ui::{ColorMode, MessageType, Style};
///
/// let style = Style::new(ColorMode::Never);
/// assert_eq!(style.message(MessageType::Ok, "Done"), "[ok] Done");
/// ```
#[derive(Debug, Clone)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors_enabled() {
            return format!("{} {}", prefix, text);
        }
        let colored_prefix = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
            MessageType::Skip => prefix.dimmed().to_string(),
        };
        format!("{} {}", colored_prefix, text)
    }

    /// Detail line under a message, indented past the prefix.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Error with optional cause and hint lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause) = cause {
            output.push_str(&format!("\n      Cause: {}", cause));
        }
        if let Some(hint) = hint {
            output.push_str(&format!("\n      Hint: {}", hint));
        }
        output
    }

    /// `+` items are green, `-` items red.
    pub fn list_item(&self, prefix: &str, text: &str) -> String {
        let styled_prefix = if self.colors_enabled() {
            match prefix {
                "+" => prefix.green().to_string(),
                "-" => prefix.red().to_string(),
                _ => prefix.to_string(),
            }
        } else {
            prefix.to_string()
        };
        format!("  {} {}", styled_prefix, text)
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    /// An entity reference such as `item#12`, in yellow.
    pub fn entity(&self, entity: EntityRef) -> String {
        let text = entity.to_string();
        if self.colors_enabled() {
            text.yellow().to_string()
        } else {
            text
        }
    }

    /// A connection type name, backquoted and cyan.
    pub fn connection(&self, name: &str) -> String {
        let text = format!("`{}`", name);
        if self.colors_enabled() {
            text.cyan().to_string()
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_prefix() {
        assert_eq!(MessageType::Ok.prefix(), "[ok]");
        assert_eq!(MessageType::Err.prefix(), "[err]");
        assert_eq!(MessageType::Skip.prefix(), "[skip]");
    }

    #[test]
    fn test_message_no_color() {
        let style = Style::new(ColorMode::Never);
        assert_eq!(style.message(MessageType::Ok, "Connected"), "[ok] Connected");
        assert_eq!(style.message(MessageType::Warn, "Careful"), "[warn] Careful");
        assert_eq!(style.message_detail("Dropped", "2"), "     Dropped: 2");
    }

    #[test]
    fn test_error_with_context() {
        let style = Style::new(ColorMode::Never);
        let output = style.error_with_context("Failed to open storage", Some("denied"), Some("Check permissions"));
        assert!(output.starts_with("[err] Failed to open storage"));
        assert!(output.contains("Cause: denied"));
        assert!(output.contains("Hint: Check permissions"));
    }

    #[test]
    fn test_entity_and_connection() {
        let style = Style::new(ColorMode::Never);
        assert_eq!(style.entity(EntityRef::term(30)), "term#30");
        assert_eq!(style.connection("see_also"), "`see_also`");
        assert_eq!(style.list_item("-", "item#4"), "  - item#4");
    }
}
