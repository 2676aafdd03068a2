//! # CLI UI Module
//!
//! Styling and formatting for tether CLI output.
//!
//! Output works without colors (`NO_COLOR`, `--color never`) and every
//! listing command has a `--json` form for scripts.
//!
//! - `color`: color mode detection and terminal width
//! - `style`: message types, prefixes and styling functions
//! - `format`: text helpers (truncation, counts, timestamps)
//! - `table`: comfy-table renderers for connection listings

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
