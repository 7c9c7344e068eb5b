//! Command-line interface definition for kiln.
//!
//! # Command Structure
//!
//! - `kiln dev` - Serve the build artifact, rebuild on change, reload pages
//! - `kiln test` - Serve the test artifact once and exit with its result

mod commands;
mod overrides;
mod tests;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{BuildArgs, Command, DevArgs, ServeArgs, TestArgs, WatchArgs};
pub use overrides::ConfigOverrides;

/// kiln - a local dev server for WebAssembly builds
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "A local dev server for WebAssembly builds",
    long_about = "kiln serves a compiled WebAssembly artifact to the browser, rebuilds it\n\
                  when sources change and tells open pages to reload. Errors and console\n\
                  output from the page are reported back to the terminal."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the config file (defaults to ./kiln.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
