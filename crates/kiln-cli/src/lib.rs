//! kiln - a local dev server for WebAssembly builds.
//!
//! Serves a compiled module to the browser, rebuilds it when sources change
//! and pushes a reload to every open page. Pages report stack traces,
//! console output and test results back over a WebSocket.
//!
//! # Architecture
//!
//! - [`dev`] - Watcher, build coordinator, HTTP routes and event channel
//! - [`cli`] - Argument definitions and config overrides
//! - `commands` - `dev` and `test` entry points
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Operator-facing terminal output
//!
//! # Example
//!
//! ```rust
//! use kiln_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, ProtocolError, Result, ResultExt, WatchError};
