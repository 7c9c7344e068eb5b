//! Status message functions for terminal output.
//!
//! Colors follow the global override set by [`super::init_colors`].

use owo_colors::{OwoColorize, Stream::Stderr};

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!(
        "{} {}",
        "✓".if_supports_color(Stderr, |s| s.green()),
        message
    );
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".if_supports_color(Stderr, |s| s.blue()), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!(
        "{} {}",
        "⚠".if_supports_color(Stderr, |s| s.yellow()),
        message.if_supports_color(Stderr, |s| s.yellow())
    );
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        "✗".if_supports_color(Stderr, |s| s.red()),
        message.if_supports_color(Stderr, |s| s.red())
    );
}

/// Print a block of captured program output, indented and dimmed.
pub fn output_block(output: &str) {
    for line in output.lines() {
        eprintln!("  {}", line.if_supports_color(Stderr, |s| s.dimmed()));
    }
}
