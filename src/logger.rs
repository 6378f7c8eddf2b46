//! Logging with colored, module-prefixed output.
//!
//! # Example
//!
//! ```ignore
//! log!("fetch"; "GET {} failed: {}", path, err);
//! ```
//!
//! Output goes to stdout as `[module] message`. Long messages are truncated
//! at a character boundary so one event never wraps into several lines.

use colored::{ColoredString, Colorize};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global switch set from `[log] quiet = true`.
static QUIET: AtomicBool = AtomicBool::new(false);

/// Longest message written after the prefix.
const MAX_MESSAGE_LEN: usize = 160;

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Silence or re-enable all `log!` output.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix.
#[inline]
pub fn log(module: &str, message: &str) {
    if is_quiet() {
        return;
    }
    let prefix = colorize_prefix(module, &module.to_ascii_lowercase());
    let message = truncate_str(message, MAX_MESSAGE_LEN);

    let mut stdout = stdout().lock();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "open" | "close" => prefix.bright_blue().bold(),
        "fetch" | "build" => prefix.bright_green().bold(),
        "script" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within max_len bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
